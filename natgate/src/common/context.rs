use crate::app::dispatcher::{Dispatcher, EgressReceiver};
use crate::app::metrics::Metrics;
use crate::app::outbound_manager::OutboundManager;
use crate::config::Config;
use crate::nat::NatTable;
use std::sync::Arc;

pub type AppContextRef = Arc<AppContext>;

/// Everything the ingress and egress tasks share. Built once at startup and
/// never mutated afterwards, apart from the interior-mutable counters and
/// table.
pub struct AppContext {
    pub config: Config,
    pub nat_table: NatTable,
    pub metrics: Metrics,
    pub outbound_manager: OutboundManager,
    pub dispatcher: Dispatcher,
}

impl AppContext {
    pub fn new(config: &Config) -> (Self, EgressReceiver) {
        let (dispatcher, egress) = Dispatcher::channel();
        let ctx = AppContext {
            config: config.clone(),
            nat_table: NatTable::new(),
            metrics: Metrics::default(),
            outbound_manager: OutboundManager::new(config),
            dispatcher,
        };
        (ctx, egress)
    }
}
