use super::OutboundHandler;
use crate::config::TcpOutbound;
use crate::prelude::*;
use anyhow::{anyhow, Context};
use tokio::io::AsyncWriteExt;
use tokio::net::{lookup_host, TcpStream};

pub struct TcpHandler {
    addr: SmolStr,
}

impl TcpHandler {
    pub fn new(config: &TcpOutbound) -> Self {
        Self {
            addr: config.addr.clone(),
        }
    }

    async fn connect(&self) -> Result<TcpStream> {
        let addrs = lookup_host(self.addr.as_str())
            .await
            .with_context(|| format!("resolving {}", self.addr))?;

        for addr in addrs {
            match crate::net_wrapper::connect_tcp(addr).await {
                Ok(stream) => return Ok(stream),
                Err(err) => warn!("Trying {} failed: {}", addr, err),
            }
        }
        Err(anyhow!("All attempts to reach {} failed", self.addr))
    }
}

#[async_trait]
impl OutboundHandler for TcpHandler {
    async fn forward(&self, packet: &[u8]) -> Result<()> {
        let mut stream = self.connect().await?;
        stream.write_all(packet).await?;
        stream.shutdown().await?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("tcp://{}", self.addr)
    }
}
