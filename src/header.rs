//! Header Validator
//!
//! Bounds-checked extraction of the Ethernet, IPv4 and TCP/UDP fields the
//! admission policy needs. Only IPv4 is classified; every other ethertype is
//! reported as unsupported and passed through by the policy.

use std::fmt;
use std::net::Ipv4Addr;

use crate::constants::wire::{
    ETH_HDR_LEN, ETH_P_IP, IPPROTO_TCP, IPPROTO_UDP, IPV4_MIN_HDR_LEN, TCP_HDR_LEN, UDP_HDR_LEN,
};

/// Transport layer as seen by the policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Tcp {
        source_port: u16,
        dest_port: u16,
        flags: u8,
    },
    Udp {
        source_port: u16,
        dest_port: u16,
    },
    /// ICMP and every other IP protocol, carried as its protocol number
    Other(u8),
}

impl Transport {
    /// IP protocol number of this transport
    pub fn protocol(&self) -> u8 {
        match self {
            Transport::Tcp { .. } => IPPROTO_TCP,
            Transport::Udp { .. } => IPPROTO_UDP,
            Transport::Other(proto) => *proto,
        }
    }

    /// Destination port, if the transport has one
    pub fn dest_port(&self) -> Option<u16> {
        match self {
            Transport::Tcp { dest_port, .. } | Transport::Udp { dest_port, .. } => Some(*dest_port),
            Transport::Other(_) => None,
        }
    }
}

/// Fields extracted from a well-formed IPv4 frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketSummary {
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
    pub transport: Transport,
}

/// Layer at which a frame stopped being parseable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    /// Shorter than an Ethernet header
    Link,
    /// IPv4 header incomplete or inconsistent
    Network,
    /// TCP header incomplete
    Tcp,
    /// UDP header incomplete
    Udp,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layer::Link => write!(f, "link"),
            Layer::Network => write!(f, "network"),
            Layer::Tcp => write!(f, "tcp"),
            Layer::Udp => write!(f, "udp"),
        }
    }
}

/// Result of validating one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderOutcome {
    Ipv4(PacketSummary),
    /// Not IPv4 (IPv6, ARP, VLAN-tagged, ...)
    Unsupported { ethertype: u16 },
    /// `source` is known when the IPv4 header itself was complete
    Malformed {
        layer: Layer,
        source: Option<Ipv4Addr>,
    },
}

impl HeaderOutcome {
    fn malformed(layer: Layer, source: Option<Ipv4Addr>) -> Self {
        HeaderOutcome::Malformed { layer, source }
    }
}

/// Validate an Ethernet frame and extract the fields used by the policy.
///
/// Every access is bounds-checked against `frame`, so any byte string is
/// accepted. Work is bounded by the fixed header sizes, never by payload length.
pub fn parse_frame(frame: &[u8]) -> HeaderOutcome {
    if frame.len() < ETH_HDR_LEN {
        return HeaderOutcome::malformed(Layer::Link, None);
    }

    let ethertype = u16::from_be_bytes([frame[12], frame[13]]);

    if ethertype != ETH_P_IP {
        return HeaderOutcome::Unsupported { ethertype };
    }

    let ip = &frame[ETH_HDR_LEN..];
    if ip.len() < IPV4_MIN_HDR_LEN {
        return HeaderOutcome::malformed(Layer::Network, None);
    }

    let version = ip[0] >> 4;
    let header_len = usize::from(ip[0] & 0x0f) * 4;
    if version != 4 || header_len < IPV4_MIN_HDR_LEN || ip.len() < header_len {
        return HeaderOutcome::malformed(Layer::Network, None);
    }

    let protocol = ip[9];
    let source = Ipv4Addr::new(ip[12], ip[13], ip[14], ip[15]);
    let destination = Ipv4Addr::new(ip[16], ip[17], ip[18], ip[19]);

    let l4 = &ip[header_len..];
    let transport = match protocol {
        IPPROTO_TCP => {
            if l4.len() < TCP_HDR_LEN {
                return HeaderOutcome::malformed(Layer::Tcp, Some(source));
            }
            Transport::Tcp {
                source_port: u16::from_be_bytes([l4[0], l4[1]]),
                dest_port: u16::from_be_bytes([l4[2], l4[3]]),
                flags: l4[13],
            }
        }
        IPPROTO_UDP => {
            if l4.len() < UDP_HDR_LEN {
                return HeaderOutcome::malformed(Layer::Udp, Some(source));
            }
            Transport::Udp {
                source_port: u16::from_be_bytes([l4[0], l4[1]]),
                dest_port: u16::from_be_bytes([l4[2], l4[3]]),
            }
        }
        other => Transport::Other(other),
    };

    HeaderOutcome::Ipv4(PacketSummary {
        source,
        destination,
        transport,
    })
}
