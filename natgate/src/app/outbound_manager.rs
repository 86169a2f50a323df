use crate::app::metrics::Metrics;
use crate::config::Config;
use crate::handler::outbound::{MptcpHandler, OutboundHandler, TcpHandler};
use crate::prelude::*;

pub struct OutboundManager {
  server: Box<dyn OutboundHandler>,
  host: Box<dyn OutboundHandler>,
}

impl OutboundManager {
  pub fn new(config: &Config) -> Self {
    Self::with_handlers(
      Box::new(MptcpHandler::new(&config.outbounds.server)),
      Box::new(TcpHandler::new(&config.outbounds.host)),
    )
  }

  pub fn with_handlers(server: Box<dyn OutboundHandler>, host: Box<dyn OutboundHandler>) -> Self {
    Self { server, host }
  }

  pub fn get_handler(&self, route: Route) -> &dyn OutboundHandler {
    match route {
      Route::Server => self.server.as_ref(),
      Route::Host => self.host.as_ref(),
    }
  }

  /// Sends one packet out and reports the outcome in the log only.
  pub async fn forward(&self, route: Route, packet: &[u8], metrics: &Metrics) {
    let handler = self.get_handler(route);
    match handler.forward(packet).await {
      Ok(_) => {
        metrics.add_forwarded();
        match route {
          Route::Server => info!("Packet forwarded via MPTCP"),
          Route::Host => info!("Packet forwarded to host"),
        }
      }
      Err(err) => {
        metrics.add_forward_failed();
        error!("Error forwarding packet to {}: {:#}", handler.describe(), err);
      }
    }
  }
}
