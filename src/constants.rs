//! Compiled-in constants shared by both entry adapters.
//!
//! These values are the contract between the XDP fast path and the TC fallback
//! path. `FilterConfig::default()` is built from them.

/// Packets per second allowed from a single source before it is blocked
pub const RATE_BUDGET_PPS: u64 = 5000;

/// Accounting window of the rate tracker (1 second in nanoseconds)
pub const RATE_WINDOW_NS: u64 = 1_000_000_000;

/// How long a source stays blocked after exceeding its budget (60 seconds)
pub const BLOCK_DURATION_NS: u64 = 60_000_000_000;

/// WireGuard default port, the only UDP port that is rate-limited
pub const TUNNEL_PORT: u16 = 51820;

/// Maximum number of distinct sources tracked by the rate tracker
pub const RATE_STORE_CAPACITY: usize = 100_000;

/// Maximum number of sources held in the block list
pub const BLOCK_STORE_CAPACITY: usize = 10_000;

/// Counter slots reserved per execution unit (3 in use)
pub const METRIC_SLOTS: usize = 8;

/// Frame layout constants
pub mod wire {
    pub const ETH_HDR_LEN: usize = 14;
    pub const IPV4_MIN_HDR_LEN: usize = 20;
    pub const TCP_HDR_LEN: usize = 20;
    pub const UDP_HDR_LEN: usize = 8;

    pub const ETH_P_IP: u16 = 0x0800;
    pub const ETH_P_ARP: u16 = 0x0806;
    pub const ETH_P_IPV6: u16 = 0x86DD;

    pub const IPPROTO_ICMP: u8 = 1;
    pub const IPPROTO_TCP: u8 = 6;
    pub const IPPROTO_UDP: u8 = 17;
}
