use super::OutboundHandler;
use crate::config::MptcpOutbound;
use crate::net_wrapper::connect_mptcp;
use crate::prelude::*;
use tokio::io::AsyncWriteExt;

pub struct MptcpHandler {
    addr: SmolStr,
    interface: SmolStr,
}

impl MptcpHandler {
    pub fn new(config: &MptcpOutbound) -> Self {
        Self {
            addr: config.addr.clone(),
            interface: config.interface.clone(),
        }
    }
}

#[async_trait]
impl OutboundHandler for MptcpHandler {
    async fn forward(&self, packet: &[u8]) -> Result<()> {
        let mut stream = connect_mptcp(&self.addr, &self.interface).await?;
        stream.write_all(packet).await?;
        stream.shutdown().await?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("mptcp://{}%{}", self.addr, self.interface)
    }
}
