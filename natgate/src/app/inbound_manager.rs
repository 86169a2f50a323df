use crate::config::Config;
use crate::nat::Translation;
use crate::prelude::*;
use anyhow::Context;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::{TcpListener, TcpStream};

/// Bytes read from a connection per packet.
pub const READ_BUFFER_SIZE: usize = 1024;

/// Pause after a failed accept, e.g. when out of file descriptors.
pub const ACCEPT_BACKOFF: Duration = Duration::from_millis(500);

#[async_trait]
trait Acceptor: Send + Sync + 'static {
  type Stream: AsyncRead + Unpin + Send + 'static;

  async fn accept(&self) -> io::Result<(Self::Stream, SocketAddr)>;
}

#[async_trait]
impl Acceptor for TcpListener {
  type Stream = TcpStream;

  async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
    TcpListener::accept(self).await
  }
}

pub struct InboundManager {
  inbounds: Vec<(Ingress, SocketAddr)>,
}

impl InboundManager {
  pub fn new(config: &Config) -> Self {
    let inbounds = [Ingress::Host, Ingress::Server]
      .iter()
      .filter_map(|ingress| config.listen_addr(*ingress).map(|addr| (*ingress, addr)))
      .collect();
    InboundManager { inbounds }
  }

  /// Binds every listener before spawning any accept loop, so a bind failure
  /// aborts startup. Returns the bound addresses.
  pub async fn start(self, ctx: AppContextRef) -> Result<Vec<SocketAddr>> {
    let mut listeners = Vec::with_capacity(self.inbounds.len());
    for (ingress, addr) in self.inbounds {
      let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Error starting TCP server on {}", addr))?;
      info!("Gateway is listening on {} ({} ingress)", addr, ingress);
      listeners.push((ingress, listener));
    }

    let mut bound = Vec::with_capacity(listeners.len());
    for (ingress, listener) in listeners {
      bound.push(listener.local_addr()?);
      let ctx = ctx.clone();
      tokio::spawn(async move {
        handle_listener(listener, ingress, ctx).await;
      });
    }
    Ok(bound)
  }
}

async fn handle_listener<L: Acceptor>(listener: L, ingress: Ingress, ctx: AppContextRef) {
  let translation = ctx.config.translation(ingress);
  loop {
    let (stream, src_addr) = match listener.accept().await {
      Ok(accepted) => accepted,
      Err(err) => {
        error!("Error accepting connection on {} ingress: {}", ingress, err);
        tokio::time::sleep(ACCEPT_BACKOFF).await;
        continue;
      }
    };
    ctx.metrics.add_accepted();
    info!("Inbound {} accepted from {}", ingress, src_addr);

    let ctx = ctx.clone();
    tokio::spawn(async move {
      match handle_conn(stream, &translation, &ctx).await {
        Ok(_) => debug!("Inbound {} connection from {} closed", ingress, src_addr),
        Err(err) => error!("Error reading from {} connection {}: {}", ingress, src_addr, err),
      }
    });
  }
}

/// Treats every read as one IPv4 packet, rewrites it and queues it for
/// egress. Ends quietly at end of stream or on the first read that is not
/// IPv4/TCP; read errors are returned.
pub async fn handle_conn<S>(mut stream: S, translation: &Translation, ctx: &AppContext) -> Result<()>
where
  S: AsyncRead + Unpin,
{
  let mut buffer = [0u8; READ_BUFFER_SIZE];
  loop {
    let n = stream.read(&mut buffer).await?;
    if n == 0 {
      return Ok(());
    }

    let packet = match DecodedPacket::from_ipv4(&buffer[..n]) {
      Ok(packet) => packet,
      Err(err) => {
        ctx.metrics.add_decode_dropped();
        debug!("Closing connection after undecodable data: {}", err);
        return Ok(());
      }
    };
    trace!("Received {}", packet);

    ctx.metrics.add_rewritten();
    ctx.dispatcher.submit(translation.route, translation.apply(packet));
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::common::test_packets::*;
  use std::collections::VecDeque;
  use std::net::Ipv4Addr;
  use std::pin::Pin;
  use std::sync::Mutex;
  use std::task::{Context as TaskContext, Poll};
  use tokio::io::{duplex, AsyncWriteExt, DuplexStream, ReadBuf};
  use tokio::time::{timeout, Instant};

  const GATEWAY: Ipv4Addr = Ipv4Addr::new(10, 10, 10, 1);
  const EXTERNAL: Ipv4Addr = Ipv4Addr::new(100, 87, 50, 2);
  const SERVER: Ipv4Addr = Ipv4Addr::new(100, 87, 50, 1);

  fn context() -> (AppContextRef, crate::app::dispatcher::EgressReceiver) {
    let mut config = Config::default();
    config.inbounds.host = "127.0.0.1:0".parse().unwrap();
    config.inbounds.server = "127.0.0.1:0".parse().unwrap();
    let (ctx, egress) = AppContext::new(&config);
    (Arc::new(ctx), egress)
  }

  /// Hands out scripted accept results, then never accepts again.
  struct Scripted {
    script: Mutex<VecDeque<io::Result<DuplexStream>>>,
  }

  #[async_trait]
  impl Acceptor for Scripted {
    type Stream = DuplexStream;

    async fn accept(&self) -> io::Result<(DuplexStream, SocketAddr)> {
      let next = self.script.lock().unwrap().pop_front();
      match next {
        Some(result) => result.map(|stream| (stream, ([127, 0, 0, 1], 40000).into())),
        None => std::future::pending().await,
      }
    }
  }

  #[tokio::test]
  async fn host_packets_go_to_server() {
    let (ctx, mut egress) = context();
    let (mut client, conn) = duplex(4096);
    let translation = ctx.config.translation(Ingress::Host);

    let ctx1 = ctx.clone();
    let handler = tokio::spawn(async move { handle_conn(conn, &translation, &ctx1).await });

    client
      .write_all(&ipv4_tcp(GATEWAY, SERVER, b"hello"))
      .await
      .unwrap();
    let (route, bytes) = egress.recv().await.unwrap();
    assert_eq!(route, Route::Server);
    let packet = DecodedPacket::from_ipv4(&bytes).unwrap();
    assert_eq!(packet.source(), EXTERNAL);
    assert_eq!(packet.destination(), SERVER);

    drop(client);
    handler.await.unwrap().unwrap();
    assert_eq!(ctx.metrics.rewritten(), 1);
  }

  #[tokio::test]
  async fn server_packets_go_to_host() {
    let (ctx, mut egress) = context();
    let (mut client, conn) = duplex(4096);
    let translation = ctx.config.translation(Ingress::Server);

    client
      .write_all(&ipv4_tcp(SERVER, EXTERNAL, b"reply"))
      .await
      .unwrap();
    drop(client);
    handle_conn(conn, &translation, &ctx).await.unwrap();

    let (route, bytes) = egress.try_recv().unwrap();
    assert_eq!(route, Route::Host);
    let packet = DecodedPacket::from_ipv4(&bytes).unwrap();
    assert_eq!(packet.source(), SERVER);
    assert_eq!(packet.destination(), GATEWAY);
  }

  #[tokio::test]
  async fn udp_payload_ends_connection() {
    let (ctx, mut egress) = context();
    let (mut client, conn) = duplex(4096);
    let translation = ctx.config.translation(Ingress::Host);

    client
      .write_all(&ipv4_udp(GATEWAY, SERVER, b"query"))
      .await
      .unwrap();

    // The client stays open: the handler must stop on its own.
    timeout(Duration::from_secs(1), handle_conn(conn, &translation, &ctx))
      .await
      .unwrap()
      .unwrap();
    assert!(egress.try_recv().is_err());
    assert_eq!(ctx.metrics.decode_dropped(), 1);
    drop(client);
  }

  #[tokio::test]
  async fn read_error_is_returned() {
    struct Reset;

    impl AsyncRead for Reset {
      fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut TaskContext<'_>,
        _buf: &mut ReadBuf<'_>,
      ) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::ErrorKind::ConnectionReset.into()))
      }
    }

    let (ctx, _egress) = context();
    let translation = ctx.config.translation(Ingress::Server);
    assert!(handle_conn(Reset, &translation, &ctx).await.is_err());
  }

  #[tokio::test]
  async fn listeners_accept_and_rewrite() {
    let (ctx, mut egress) = context();
    let bound = InboundManager::new(&ctx.config)
      .start(ctx.clone())
      .await
      .unwrap();
    assert_eq!(bound.len(), 2);

    let mut stream = TcpStream::connect(bound[0]).await.unwrap();
    stream
      .write_all(&ipv4_tcp(GATEWAY, SERVER, b"via listener"))
      .await
      .unwrap();

    let (route, bytes) = egress.recv().await.unwrap();
    assert_eq!(route, Route::Server);
    assert_eq!(DecodedPacket::from_ipv4(&bytes).unwrap().source(), EXTERNAL);
    assert_eq!(ctx.metrics.accepted(), 1);
  }

  #[tokio::test]
  async fn failed_accept_waits_before_retrying() {
    let (ctx, mut egress) = context();
    let (mut client, conn) = duplex(4096);
    client
      .write_all(&ipv4_tcp(GATEWAY, SERVER, b"after backoff"))
      .await
      .unwrap();

    let listener = Scripted {
      script: Mutex::new(
        vec![
          Err(io::Error::from_raw_os_error(libc::EMFILE)),
          Ok(conn),
        ]
        .into(),
      ),
    };
    let started = Instant::now();
    tokio::spawn(handle_listener(listener, Ingress::Host, ctx.clone()));

    let (route, _) = timeout(Duration::from_secs(5), egress.recv())
      .await
      .unwrap()
      .unwrap();
    assert_eq!(route, Route::Server);
    assert!(started.elapsed() >= ACCEPT_BACKOFF);
    assert_eq!(ctx.metrics.accepted(), 1);
    drop(client);
  }

  #[tokio::test]
  async fn bind_failure_is_fatal() {
    let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut config = Config::default();
    config.inbounds.host = taken.local_addr().unwrap();
    config.inbounds.server = "127.0.0.1:0".parse().unwrap();
    let (ctx, _egress) = AppContext::new(&config);

    let result = InboundManager::new(&config).start(Arc::new(ctx)).await;
    assert!(result.is_err());
  }
}
