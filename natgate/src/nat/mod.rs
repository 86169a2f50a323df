//! Stateless address substitution.
use crate::common::{DecodedPacket, Route};
use bytes::Bytes;
use std::fmt;
use std::net::Ipv4Addr;

mod table;

pub use table::{NatEntry, NatKey, NatTable};

/// Replaces `from` with `to` in the source address, or failing that in the
/// destination address, then encodes the packet.
///
/// Only one field is rewritten per call, and the source wins when both
/// match. Ports and checksums are left untouched.
pub fn rewrite(mut packet: DecodedPacket, from: Ipv4Addr, to: Ipv4Addr) -> Bytes {
    if packet.source() == from {
        packet.set_source(to);
    } else if packet.destination() == from {
        packet.set_destination(to);
    }
    packet.encode()
}

/// A rewrite rule bound to the egress route its output takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Translation {
    pub from: Ipv4Addr,
    pub to: Ipv4Addr,
    pub route: Route,
}

impl Translation {
    pub fn new(from: Ipv4Addr, to: Ipv4Addr, route: Route) -> Self {
        Self { from, to, route }
    }

    pub fn apply(&self, packet: DecodedPacket) -> Bytes {
        rewrite(packet, self.from, self.to)
    }
}

impl fmt::Display for Translation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} via {}", self.from, self.to, self.route)
    }
}
