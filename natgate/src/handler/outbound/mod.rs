use crate::prelude::*;

mod mptcp;
mod tcp;

pub use mptcp::MptcpHandler;
pub use tcp::TcpHandler;

/// One egress path. Every call opens its own connection, writes the whole
/// packet and closes it again.
#[async_trait]
pub trait OutboundHandler: Send + Sync {
    async fn forward(&self, packet: &[u8]) -> Result<()>;

    fn describe(&self) -> String;
}
