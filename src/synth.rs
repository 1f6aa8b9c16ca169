//! Synthetic frame construction
//!
//! Builds Ethernet/IPv4 frames for the simulator, the benchmarks and the test
//! suites, including deliberately truncated frames for the malformed-packet
//! policy.

use std::net::Ipv4Addr;

use crate::constants::wire::{
    ETH_HDR_LEN, ETH_P_IP, IPPROTO_ICMP, IPPROTO_TCP, IPPROTO_UDP, IPV4_MIN_HDR_LEN, TCP_HDR_LEN,
    UDP_HDR_LEN,
};

pub const TCP_FLAG_SYN: u8 = 0x02;
pub const TCP_FLAG_ACK: u8 = 0x10;

const ICMP_HDR_LEN: usize = 8;
const DEFAULT_DESTINATION: Ipv4Addr = Ipv4Addr::new(198, 51, 100, 1);

#[derive(Debug, Clone, Copy)]
enum Kind {
    Tcp { flags: u8 },
    Udp,
    Icmp,
}

#[derive(Debug, Clone, Copy)]
enum Truncation {
    /// Cut the whole frame to this many bytes
    Frame(usize),
    /// Keep only this many bytes of the transport header
    Transport(usize),
}

/// Builder for a single Ethernet frame
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    kind: Kind,
    source: Ipv4Addr,
    destination: Ipv4Addr,
    source_port: u16,
    dest_port: u16,
    ethertype: u16,
    options_len: usize,
    payload_len: usize,
    truncation: Option<Truncation>,
}

impl FrameBuilder {
    fn new(kind: Kind, source: Ipv4Addr, dest_port: u16) -> Self {
        Self {
            kind,
            source,
            destination: DEFAULT_DESTINATION,
            source_port: 40000,
            dest_port,
            ethertype: ETH_P_IP,
            options_len: 0,
            payload_len: 0,
            truncation: None,
        }
    }

    /// TCP segment with the ACK flag set
    pub fn tcp(source: Ipv4Addr, dest_port: u16) -> Self {
        Self::new(Kind::Tcp { flags: TCP_FLAG_ACK }, source, dest_port)
    }

    pub fn udp(source: Ipv4Addr, dest_port: u16) -> Self {
        Self::new(Kind::Udp, source, dest_port)
    }

    /// ICMP echo request
    pub fn icmp(source: Ipv4Addr) -> Self {
        Self::new(Kind::Icmp, source, 0)
    }

    /// Turn a TCP builder into a bare SYN
    pub fn syn(mut self) -> Self {
        if let Kind::Tcp { .. } = self.kind {
            self.kind = Kind::Tcp { flags: TCP_FLAG_SYN };
        }
        self
    }

    pub fn destination(mut self, destination: Ipv4Addr) -> Self {
        self.destination = destination;
        self
    }

    pub fn source_port(mut self, port: u16) -> Self {
        self.source_port = port;
        self
    }

    /// Override the ethertype (the IPv4 body is still written)
    pub fn ethertype(mut self, ethertype: u16) -> Self {
        self.ethertype = ethertype;
        self
    }

    /// Append IPv4 options, rounded up to a multiple of 4 bytes
    pub fn ip_options(mut self, len: usize) -> Self {
        self.options_len = len.div_ceil(4) * 4;
        self
    }

    pub fn payload(mut self, len: usize) -> Self {
        self.payload_len = len;
        self
    }

    /// Cut the finished frame to `len` bytes
    pub fn truncate_at(mut self, len: usize) -> Self {
        self.truncation = Some(Truncation::Frame(len));
        self
    }

    /// Keep only `len` bytes of the transport header and drop the payload
    pub fn truncate_transport(mut self, len: usize) -> Self {
        self.truncation = Some(Truncation::Transport(len));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let (protocol, l4) = self.transport_bytes();
        let ip_header_len = IPV4_MIN_HDR_LEN + self.options_len;
        let total_len = ip_header_len + l4.len();

        let mut frame = Vec::with_capacity(ETH_HDR_LEN + total_len);

        frame.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
        frame.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, 0x00, 0x02]);
        frame.extend_from_slice(&self.ethertype.to_be_bytes());

        let mut ip = [0u8; IPV4_MIN_HDR_LEN];
        ip[0] = 0x40 | (ip_header_len / 4) as u8;
        ip[2..4].copy_from_slice(&(total_len as u16).to_be_bytes());
        ip[6] = 0x40; // don't fragment
        ip[8] = 64;
        ip[9] = protocol;
        ip[12..16].copy_from_slice(&self.source.octets());
        ip[16..20].copy_from_slice(&self.destination.octets());
        let mut header = ip.to_vec();
        // NOP options
        header.resize(ip_header_len, 0x01);
        let checksum = ipv4_checksum(&header);
        header[10..12].copy_from_slice(&checksum.to_be_bytes());

        frame.extend_from_slice(&header);
        frame.extend_from_slice(&l4);

        if let Some(Truncation::Frame(len)) = self.truncation {
            frame.truncate(len);
        }
        frame
    }

    fn transport_bytes(&self) -> (u8, Vec<u8>) {
        let (protocol, mut l4) = match self.kind {
            Kind::Tcp { flags } => {
                let mut tcp = vec![0u8; TCP_HDR_LEN];
                tcp[0..2].copy_from_slice(&self.source_port.to_be_bytes());
                tcp[2..4].copy_from_slice(&self.dest_port.to_be_bytes());
                tcp[4..8].copy_from_slice(&1u32.to_be_bytes());
                tcp[12] = ((TCP_HDR_LEN / 4) as u8) << 4;
                tcp[13] = flags;
                tcp[14..16].copy_from_slice(&64240u16.to_be_bytes());
                (IPPROTO_TCP, tcp)
            }
            Kind::Udp => {
                let mut udp = vec![0u8; UDP_HDR_LEN];
                udp[0..2].copy_from_slice(&self.source_port.to_be_bytes());
                udp[2..4].copy_from_slice(&self.dest_port.to_be_bytes());
                udp[4..6].copy_from_slice(&((UDP_HDR_LEN + self.payload_len) as u16).to_be_bytes());
                (IPPROTO_UDP, udp)
            }
            Kind::Icmp => {
                let mut icmp = vec![0u8; ICMP_HDR_LEN];
                icmp[0] = 8; // echo request
                (IPPROTO_ICMP, icmp)
            }
        };

        match self.truncation {
            Some(Truncation::Transport(len)) => l4.truncate(len),
            _ => l4.resize(l4.len() + self.payload_len, 0xab),
        }
        (protocol, l4)
    }
}

/// RFC 1071 ones' complement checksum over an IPv4 header
pub fn ipv4_checksum(header: &[u8]) -> u16 {
    let mut sum: u32 = header
        .chunks(2)
        .enumerate()
        .filter(|(i, _)| *i != 5)
        .map(|(_, pair)| {
            let hi = u32::from(pair[0]) << 8;
            let lo = pair.get(1).copied().map(u32::from).unwrap_or(0);
            hi | lo
        })
        .sum();
    while sum > 0xffff {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}
