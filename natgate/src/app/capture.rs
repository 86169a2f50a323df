//! Live capture ingress on the internal-facing interface.
use crate::config::CaptureConfig;
use crate::nat::Translation;
use crate::prelude::*;
use anyhow::{anyhow, bail, Context};
use pnet::datalink::{self, Channel, DataLinkReceiver, NetworkInterface};
use pnet::util::MacAddr;
use std::io;

/// Framing of the frames a capture source delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
  Ethernet,
  /// tun and point-to-point devices hand over bare IP packets.
  RawIp,
}

impl LinkKind {
  pub fn of(interface: &NetworkInterface) -> Self {
    // Loopback reports a zero MAC but still frames with Ethernet headers.
    let has_link_header = match interface.mac {
      Some(mac) => mac != MacAddr::zero() || interface.is_loopback(),
      None => false,
    };
    if interface.is_point_to_point() || !has_link_header {
      LinkKind::RawIp
    } else {
      LinkKind::Ethernet
    }
  }

  pub fn decode(self, frame: &[u8]) -> Result<DecodedPacket, PacketError> {
    match self {
      LinkKind::Ethernet => DecodedPacket::from_ethernet(frame),
      LinkKind::RawIp => DecodedPacket::from_ipv4(frame),
    }
  }
}

impl std::fmt::Display for LinkKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::result::Result<(), std::fmt::Error> {
    let s = match self {
      LinkKind::Ethernet => "ethernet",
      LinkKind::RawIp => "raw ip",
    };
    write!(f, "{}", s)
  }
}

/// A never-ending sequence of link-layer frames.
pub trait FrameSource: Send {
  fn next_frame(&mut self) -> io::Result<&[u8]>;

  fn link_kind(&self) -> LinkKind {
    LinkKind::Ethernet
  }
}

pub struct LiveCapture {
  rx: Box<dyn DataLinkReceiver>,
  link: LinkKind,
}

impl LiveCapture {
  pub fn open(config: &CaptureConfig) -> Result<Self> {
    let interface = datalink::interfaces()
      .into_iter()
      .find(|iface| iface.name == config.interface.as_str())
      .ok_or_else(|| anyhow!("Interface {} not found", config.interface))?;
    let link = LinkKind::of(&interface);

    let channel_config = datalink::Config {
      read_buffer_size: config.snaplen,
      promiscuous: config.promiscuous,
      ..Default::default()
    };
    let channel = datalink::channel(&interface, channel_config)
      .with_context(|| format!("Error opening device {}", config.interface))?;

    match channel {
      Channel::Ethernet(_, rx) => Ok(LiveCapture { rx, link }),
      _ => bail!("Unsupported channel type on {}", config.interface),
    }
  }
}

impl FrameSource for LiveCapture {
  fn next_frame(&mut self) -> io::Result<&[u8]> {
    self.rx.next()
  }

  fn link_kind(&self) -> LinkKind {
    self.link
  }
}

fn is_transient(err: &io::Error) -> bool {
  matches!(
    err.kind(),
    io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
  )
}

/// Runs the capture loop on the calling thread. Only returns when the source
/// fails for good.
pub fn run_capture<S: FrameSource>(mut source: S, ctx: AppContextRef) -> Result<()> {
  let translation = ctx.config.translation(Ingress::Capture);
  let link = source.link_kind();
  info!("Capture ingress started on {} link, rewriting {}", link, translation);

  loop {
    let frame = match source.next_frame() {
      Ok(frame) => frame,
      Err(err) if is_transient(&err) => continue,
      Err(err) => return Err(err).context("Error reading captured frame"),
    };
    handle_frame(frame, link, &translation, &ctx);
  }
}

/// Rewrites one captured frame and queues it for egress. Frames that are not
/// IPv4/TCP are skipped without noise. Returns whether a packet was queued.
pub fn handle_frame(frame: &[u8], link: LinkKind, translation: &Translation, ctx: &AppContext) -> bool {
  ctx.metrics.add_captured();

  let packet = match link.decode(frame) {
    Ok(packet) => packet,
    Err(err) => {
      ctx.metrics.add_decode_dropped();
      trace!("Skipping captured frame: {}", err);
      return false;
    }
  };
  trace!("Captured {}", packet);

  ctx.metrics.add_rewritten();
  ctx.dispatcher.submit(translation.route, translation.apply(packet));
  true
}
