pub mod capture;
pub mod dispatcher;
pub mod inbound_manager;
pub mod metrics;
pub mod outbound_manager;
