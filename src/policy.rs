//! Admission Policy
//!
//! The per-protocol decision shared by both entry adapters. Stateless per
//! call; all state lives in the block store and the rate tracker.
//!
//! | Traffic                         | Verdict                              |
//! |---------------------------------|--------------------------------------|
//! | source in block list            | Drop                                 |
//! | TCP                             | rate-limited, Drop + block when over |
//! | UDP to the tunnel port          | rate-limited like TCP                |
//! | other UDP                       | Pass, no accounting                  |
//! | ICMP and other protocols        | Pass                                 |
//! | truncated link / IPv4 header    | Pass                                 |
//! | truncated TCP header            | Drop, no block                       |
//! | truncated UDP header            | Pass                                 |
//! | non-IPv4                        | Pass                                 |

use std::fmt;
use std::net::Ipv4Addr;
use tracing::info;

use crate::block_store::BlockStore;
use crate::config::FilterConfig;
use crate::header::{HeaderOutcome, Layer, PacketSummary, Transport};
use crate::rate_tracker::{RateTracker, RateVerdict};

/// Host-independent packet verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    Pass,
    Drop,
}

/// Why a packet got its verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    /// Source has an active block
    Blocked,
    /// Source just went over budget; a block was installed
    RateLimited,
    /// Rate-limited traffic still inside its budget
    WithinBudget,
    /// UDP to a port other than the tunnel port
    ExemptUdp,
    /// ICMP or another non-TCP/UDP protocol
    Unlimited,
    /// Not IPv4
    Unsupported,
    Malformed(Layer),
}

impl Decision {
    pub fn verdict(self) -> Verdict {
        match self {
            Decision::Blocked | Decision::RateLimited | Decision::Malformed(Layer::Tcp) => {
                Verdict::Drop
            }
            Decision::WithinBudget
            | Decision::ExemptUdp
            | Decision::Unlimited
            | Decision::Unsupported
            | Decision::Malformed(Layer::Link | Layer::Network | Layer::Udp) => Verdict::Pass,
        }
    }

    /// Stable label for reports
    pub fn label(self) -> &'static str {
        match self {
            Decision::Blocked => "blocked",
            Decision::RateLimited => "rate_limited",
            Decision::WithinBudget => "within_budget",
            Decision::ExemptUdp => "exempt_udp",
            Decision::Unlimited => "unlimited",
            Decision::Unsupported => "unsupported",
            Decision::Malformed(Layer::Link) => "malformed_link",
            Decision::Malformed(Layer::Network) => "malformed_network",
            Decision::Malformed(Layer::Tcp) => "malformed_tcp",
            Decision::Malformed(Layer::Udp) => "malformed_udp",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Shared decision logic over the two record stores
#[derive(Debug)]
pub struct AdmissionPolicy {
    blocks: BlockStore,
    rates: RateTracker,
    block_duration_ns: u64,
    tunnel_port: u16,
}

impl AdmissionPolicy {
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            blocks: BlockStore::new(config.block_capacity_nonzero()),
            rates: RateTracker::new(config.rate_capacity_nonzero(), config.rate_budget),
            block_duration_ns: config.block_duration_ns,
            tunnel_port: config.tunnel_port,
        }
    }

    /// Decide on a fully parsed IPv4 packet.
    pub fn decide(&self, summary: &PacketSummary, now: u64) -> Decision {
        if self.blocks.is_blocked(summary.source, now) {
            return Decision::Blocked;
        }

        match summary.transport {
            Transport::Tcp { .. } => self.enforce(summary.source, now),
            Transport::Udp { dest_port, .. } if dest_port == self.tunnel_port => {
                self.enforce(summary.source, now)
            }
            Transport::Udp { .. } => Decision::ExemptUdp,
            Transport::Other(_) => Decision::Unlimited,
        }
    }

    /// Decide on any header validation outcome.
    ///
    /// A truncated transport header still has a readable IPv4 source, so
    /// the block list is consulted before the malformation verdict applies.
    pub fn evaluate(&self, outcome: &HeaderOutcome, now: u64) -> Decision {
        match outcome {
            HeaderOutcome::Ipv4(summary) => self.decide(summary, now),
            HeaderOutcome::Unsupported { .. } => Decision::Unsupported,
            HeaderOutcome::Malformed { layer, source } => match source {
                Some(source) if self.blocks.is_blocked(*source, now) => Decision::Blocked,
                _ => Decision::Malformed(*layer),
            },
        }
    }

    fn enforce(&self, source: Ipv4Addr, now: u64) -> Decision {
        match self.rates.admit(source, now) {
            RateVerdict::Admit => Decision::WithinBudget,
            RateVerdict::ThresholdExceeded => {
                let expiry = now.saturating_add(self.block_duration_ns);
                self.blocks.block(source, expiry);
                info!(
                    "Rate budget of {} pps exceeded by {}, blocked until {}",
                    self.rates.budget(),
                    source,
                    expiry
                );
                Decision::RateLimited
            }
        }
    }

    pub fn blocks(&self) -> &BlockStore {
        &self.blocks
    }

    pub fn rates(&self) -> &RateTracker {
        &self.rates
    }

    pub fn tunnel_port(&self) -> u16 {
        self.tunnel_port
    }
}
