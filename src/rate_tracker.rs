//! Rate Tracker
//!
//! Fixed one-second window counter per source address. The first packet of a
//! window stamps `window_start`; every later packet inside the window bumps
//! `count`; the first packet more than one window after `window_start` starts a
//! new window at count 1.
//!
//! The store is bounded. When it is full the least recently touched source is
//! evicted and, if it shows up again, starts from a fresh budget. That accuracy
//! loss is the price of bounded memory and is intentional.
//!
//! Like the block store, the tracker is one mutex around one cache. `admit`
//! holds it for the single-key read-modify-write and nothing else, so the
//! packet path never waits on I/O, only on a concurrent unit's O(1) update.

use std::net::Ipv4Addr;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use tracing::{debug, trace};

use crate::bounded_cache::BoundedCache;
use crate::constants::RATE_WINDOW_NS;
use crate::lock_utils::lock_or_recover;

const STORE_NAME: &str = "rate tracker";

/// Per-source accounting window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateRecord {
    /// Monotonic timestamp (ns) of the first packet in the window
    pub window_start: u64,
    /// Packets seen since `window_start`, inclusive
    pub count: u64,
}

impl RateRecord {
    fn fresh(now: u64) -> Self {
        Self {
            window_start: now,
            count: 1,
        }
    }
}

/// Outcome of counting one packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateVerdict {
    Admit,
    /// The source went over budget; the caller installs the block
    ThresholdExceeded,
}

/// Shared, concurrently accessed per-source counters
#[derive(Debug)]
pub struct RateTracker {
    records: Mutex<BoundedCache<RateRecord>>,
    budget: u64,
    window_ns: u64,
}

impl RateTracker {
    /// `budget` is the number of packets allowed per window
    pub fn new(capacity: NonZeroUsize, budget: u64) -> Self {
        debug!(
            "Rate tracker created (capacity: {}, budget: {} pps)",
            capacity, budget
        );
        Self {
            records: Mutex::new(BoundedCache::new(capacity)),
            budget,
            window_ns: RATE_WINDOW_NS,
        }
    }

    /// Count one packet from `ip` observed at `now`.
    pub fn admit(&self, ip: Ipv4Addr, now: u64) -> RateVerdict {
        let key = u32::from(ip);
        let mut records = lock_or_recover(&self.records, STORE_NAME);

        match records.get(key) {
            Some(record) => {
                // A timestamp behind window_start comes from a racing unit and
                // counts as inside the window.
                if now.saturating_sub(record.window_start) > self.window_ns {
                    *record = RateRecord::fresh(now);
                    return RateVerdict::Admit;
                }

                record.count = record.count.saturating_add(1);
                if record.count > self.budget {
                    RateVerdict::ThresholdExceeded
                } else {
                    RateVerdict::Admit
                }
            }
            None => {
                let evicted = records.insert(key, RateRecord::fresh(now));
                drop(records);
                if let Some((victim, _)) = evicted {
                    trace!("Rate tracker full, evicted {}", Ipv4Addr::from(victim));
                }
                RateVerdict::Admit
            }
        }
    }

    /// Current record for `ip`, without touching recency
    pub fn record(&self, ip: Ipv4Addr) -> Option<RateRecord> {
        lock_or_recover(&self.records, STORE_NAME)
            .peek(u32::from(ip))
            .copied()
    }

    pub fn budget(&self) -> u64 {
        self.budget
    }

    pub fn len(&self) -> usize {
        lock_or_recover(&self.records, STORE_NAME).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        lock_or_recover(&self.records, STORE_NAME).capacity()
    }
}
