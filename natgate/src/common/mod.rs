mod context;
mod packet;

pub use context::{AppContext, AppContextRef};
pub use packet::{DecodedPacket, PacketError};

#[cfg(test)]
pub(crate) use packet::test_packets;

/// Where a rewritten packet leaves the gateway.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Route {
    /// MPTCP over the egress interface, towards the external server.
    Server,
    /// Plain TCP back to the internal host.
    Host,
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::result::Result<(), std::fmt::Error> {
        let s = match self {
            Route::Server => "server",
            Route::Host => "host",
        };
        write!(f, "{}", s)
    }
}

/// The three traffic sources feeding the rewriter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Ingress {
    Capture,
    Host,
    Server,
}

impl std::fmt::Display for Ingress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::result::Result<(), std::fmt::Error> {
        let s = match self {
            Ingress::Capture => "capture",
            Ingress::Host => "host",
            Ingress::Server => "server",
        };
        write!(f, "{}", s)
    }
}
