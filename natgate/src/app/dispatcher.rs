//! Hand-off between ingress handlers and egress connections.
use crate::prelude::*;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

pub type EgressSender = UnboundedSender<(Route, Bytes)>;
pub type EgressReceiver = UnboundedReceiver<(Route, Bytes)>;

pub struct Dispatcher {
  sender: EgressSender,
}

impl Dispatcher {
  pub fn channel() -> (Self, EgressReceiver) {
    let (sender, receiver) = unbounded_channel();
    (Dispatcher { sender }, receiver)
  }

  /// Queues a rewritten packet without waiting for it to be sent. Callable
  /// from the capture thread as well as from async tasks.
  pub fn submit(&self, route: Route, packet: Bytes) {
    if self.sender.send((route, packet)).is_err() {
      warn!("Egress task is gone, dropping packet for {}", route);
    }
  }
}

/// Spawns one forwarding task per queued packet until every sender is gone.
pub async fn run_egress(mut receiver: EgressReceiver, ctx: AppContextRef) {
  while let Some((route, packet)) = receiver.recv().await {
    let ctx = ctx.clone();
    tokio::spawn(async move {
      ctx.outbound_manager
        .forward(route, &packet, &ctx.metrics)
        .await;
    });
  }
  debug!("Egress queue closed");
}
