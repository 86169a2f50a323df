use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
pub struct Metrics {
  captured: AtomicUsize,
  accepted: AtomicUsize,
  rewritten: AtomicUsize,
  decode_dropped: AtomicUsize,
  forwarded: AtomicUsize,
  forward_failed: AtomicUsize,
}

macro_rules! metrics_counter {
  ($add:ident, $get:ident, $field:ident) => {
    pub fn $add(&self) {
      self.$field.fetch_add(1, Ordering::Relaxed);
    }

    pub fn $get(&self) -> usize {
      self.$field.load(Ordering::Relaxed)
    }
  };
}

impl Metrics {
  metrics_counter!(add_captured, captured, captured);
  metrics_counter!(add_accepted, accepted, accepted);
  metrics_counter!(add_rewritten, rewritten, rewritten);
  metrics_counter!(add_decode_dropped, decode_dropped, decode_dropped);
  metrics_counter!(add_forwarded, forwarded, forwarded);
  metrics_counter!(add_forward_failed, forward_failed, forward_failed);
}

impl std::fmt::Debug for Metrics {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::result::Result<(), std::fmt::Error> {
    write!(
      f,
      "Captured: {}, Accepted: {}, Rewritten: {}, Dropped: {}, Forwarded: {}, Failed: {}",
      self.captured(),
      self.accepted(),
      self.rewritten(),
      self.decode_dropped(),
      self.forwarded(),
      self.forward_failed()
    )
  }
}
