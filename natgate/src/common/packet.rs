//! IPv4/TCP decoding and re-encoding of captured or received frames.
use bytes::{BufMut, Bytes, BytesMut};
use pnet::packet::ethernet::{EtherTypes, EthernetPacket};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::{Ipv4Flags, Ipv4Packet, MutableIpv4Packet};
use pnet::packet::tcp::TcpPacket;
use pnet::packet::Packet;
use std::fmt;
use std::net::Ipv4Addr;
use thiserror::Error;

const IPV4_MIN_HEADER: usize = 20;
const TCP_MIN_HEADER: usize = 20;
const VLAN_TAG_LEN: usize = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("truncated {0} header")]
    Truncated(&'static str),
    #[error("not an IPv4 packet")]
    NotIpv4,
    #[error("malformed {0} header")]
    BadHeader(&'static str),
    #[error("IPv4 fragment carries no TCP header")]
    Fragment,
    #[error("not a TCP segment (protocol {0})")]
    NotTcp(u8),
}

/// An IPv4 datagram known to carry a TCP segment.
///
/// The address fields are mutated in place and the packet is encoded back
/// as-is: checksums and length fields are never recomputed. Decoding cuts
/// the datagram to its IPv4 total length, so encoding cannot fail.
#[derive(Debug, Clone)]
pub struct DecodedPacket {
    data: Vec<u8>,
    ip_header_len: usize,
}

impl DecodedPacket {
    /// Decodes an Ethernet II frame, stepping over a single 802.1Q tag.
    pub fn from_ethernet(frame: &[u8]) -> Result<Self, PacketError> {
        let eth = EthernetPacket::new(frame).ok_or(PacketError::Truncated("Ethernet"))?;
        match eth.get_ethertype() {
            EtherTypes::Ipv4 => Self::from_ipv4(eth.payload()),
            EtherTypes::Vlan => {
                let tagged = eth.payload();
                if tagged.len() < VLAN_TAG_LEN {
                    return Err(PacketError::Truncated("802.1Q"));
                }
                let inner = u16::from_be_bytes([tagged[2], tagged[3]]);
                if inner != EtherTypes::Ipv4.0 {
                    return Err(PacketError::NotIpv4);
                }
                Self::from_ipv4(&tagged[VLAN_TAG_LEN..])
            }
            _ => Err(PacketError::NotIpv4),
        }
    }

    /// Decodes bytes that start directly with an IPv4 header.
    pub fn from_ipv4(bytes: &[u8]) -> Result<Self, PacketError> {
        let ip = Ipv4Packet::new(bytes).ok_or(PacketError::Truncated("IPv4"))?;
        if ip.get_version() != 4 {
            return Err(PacketError::NotIpv4);
        }

        let header_len = ip.get_header_length() as usize * 4;
        let total_len = ip.get_total_length() as usize;
        if header_len < IPV4_MIN_HEADER || total_len < header_len {
            return Err(PacketError::BadHeader("IPv4"));
        }
        if bytes.len() < header_len {
            return Err(PacketError::Truncated("IPv4"));
        }

        if ip.get_flags() & Ipv4Flags::MoreFragments != 0 || ip.get_fragment_offset() != 0 {
            return Err(PacketError::Fragment);
        }
        let protocol = ip.get_next_level_protocol();
        if protocol != IpNextHeaderProtocols::Tcp {
            return Err(PacketError::NotTcp(protocol.0));
        }

        // Link-layer padding past the total length is not part of the datagram.
        let datagram = &bytes[..total_len.min(bytes.len())];
        let segment = &datagram[header_len..];
        let tcp = TcpPacket::new(segment).ok_or(PacketError::Truncated("TCP"))?;
        let data_offset = tcp.get_data_offset() as usize * 4;
        if data_offset < TCP_MIN_HEADER {
            return Err(PacketError::BadHeader("TCP"));
        }
        if data_offset > segment.len() {
            return Err(PacketError::Truncated("TCP"));
        }

        Ok(DecodedPacket {
            data: datagram.to_vec(),
            ip_header_len: header_len,
        })
    }

    pub fn source(&self) -> Ipv4Addr {
        self.ip().get_source()
    }

    pub fn destination(&self) -> Ipv4Addr {
        self.ip().get_destination()
    }

    pub fn set_source(&mut self, addr: Ipv4Addr) {
        self.ip_mut().set_source(addr);
    }

    pub fn set_destination(&mut self, addr: Ipv4Addr) {
        self.ip_mut().set_destination(addr);
    }

    pub fn source_port(&self) -> u16 {
        self.tcp().get_source()
    }

    pub fn destination_port(&self) -> u16 {
        self.tcp().get_destination()
    }

    /// Serializes the IPv4 header followed by the TCP header and payload.
    pub fn encode(&self) -> Bytes {
        let (header, segment) = self.data.split_at(self.ip_header_len);
        let mut buffer = BytesMut::with_capacity(self.data.len());
        buffer.put_slice(header);
        buffer.put_slice(segment);
        buffer.freeze()
    }

    fn ip(&self) -> Ipv4Packet<'_> {
        // Length was checked when decoding.
        Ipv4Packet::new(&self.data[..self.ip_header_len]).expect("decoded IPv4 header")
    }

    fn ip_mut(&mut self) -> MutableIpv4Packet<'_> {
        MutableIpv4Packet::new(&mut self.data[..self.ip_header_len]).expect("decoded IPv4 header")
    }

    fn tcp(&self) -> TcpPacket<'_> {
        TcpPacket::new(&self.data[self.ip_header_len..]).expect("decoded TCP header")
    }
}

impl fmt::Display for DecodedPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{}",
            self.source(),
            self.source_port(),
            self.destination(),
            self.destination_port()
        )
    }
}
