//! Metrics Sink
//!
//! Per-verdict packet counters, one shard per execution unit. A unit only ever
//! increments its own shard, so the hot path never contends on a cache line.
//! Reads sum every shard and may observe a slightly stale total.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::constants::METRIC_SLOTS;

/// Counter slots in use, by index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum Metric {
    Passed = 0,
    DroppedRate = 1,
    DroppedBlock = 2,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Passed, Metric::DroppedRate, Metric::DroppedBlock];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Metric::Passed => "passed",
            Metric::DroppedRate => "dropped_rate",
            Metric::DroppedBlock => "dropped_block",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One execution unit's counters, padded to its own cache line
#[derive(Debug, Default)]
#[repr(align(64))]
struct Shard {
    slots: [AtomicU64; METRIC_SLOTS],
}

/// Sharded counter array
#[derive(Debug)]
pub struct MetricsSink {
    shards: Box<[Shard]>,
}

impl MetricsSink {
    /// One shard per execution unit (at least one)
    pub fn new(units: usize) -> Self {
        let shards = (0..units.max(1)).map(|_| Shard::default()).collect();
        Self { shards }
    }

    pub fn units(&self) -> usize {
        self.shards.len()
    }

    /// Bump `metric` on the shard owned by `unit`
    #[inline]
    pub fn record(&self, unit: usize, metric: Metric) {
        let shard = &self.shards[unit % self.shards.len()];
        shard.slots[metric.index()].fetch_add(1, Ordering::Relaxed);
    }

    /// Sum of one slot across all shards
    pub fn total(&self, metric: Metric) -> u64 {
        self.shards
            .iter()
            .map(|shard| shard.slots[metric.index()].load(Ordering::Relaxed))
            .fold(0u64, u64::wrapping_add)
    }

    /// Aggregate view across all shards
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot::collect(|metric| self.total(metric))
    }

    /// View of a single unit's shard
    pub fn shard_snapshot(&self, unit: usize) -> MetricsSnapshot {
        let shard = &self.shards[unit % self.shards.len()];
        MetricsSnapshot::collect(|metric| shard.slots[metric.index()].load(Ordering::Relaxed))
    }
}

/// Summed counters, as handed to external observers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub passed: u64,
    pub dropped_rate: u64,
    pub dropped_block: u64,
}

impl MetricsSnapshot {
    fn collect(read: impl Fn(Metric) -> u64) -> Self {
        let mut snap = Self::default();
        for metric in Metric::ALL {
            *snap.slot_mut(metric) = read(metric);
        }
        snap
    }

    fn slot_mut(&mut self, metric: Metric) -> &mut u64 {
        match metric {
            Metric::Passed => &mut self.passed,
            Metric::DroppedRate => &mut self.dropped_rate,
            Metric::DroppedBlock => &mut self.dropped_block,
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped_rate + self.dropped_block
    }

    pub fn get(&self, metric: Metric) -> u64 {
        match metric {
            Metric::Passed => self.passed,
            Metric::DroppedRate => self.dropped_rate,
            Metric::DroppedBlock => self.dropped_block,
        }
    }

    /// Format counters in Prometheus text exposition format
    pub fn to_prometheus_format(&self) -> String {
        format!(
            "# HELP cerberus_packets_passed_total Packets counted as passed\n\
             # TYPE cerberus_packets_passed_total counter\n\
             cerberus_packets_passed_total {}\n\
             \n\
             # HELP cerberus_packets_dropped_rate_total Packets dropped for exceeding the rate budget\n\
             # TYPE cerberus_packets_dropped_rate_total counter\n\
             cerberus_packets_dropped_rate_total {}\n\
             \n\
             # HELP cerberus_packets_dropped_block_total Packets dropped from blocked sources\n\
             # TYPE cerberus_packets_dropped_block_total counter\n\
             cerberus_packets_dropped_block_total {}\n",
            self.passed, self.dropped_rate, self.dropped_block
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_starts_at_zero() {
        let sink = MetricsSink::new(4);
        assert_eq!(sink.snapshot(), MetricsSnapshot::default());
        assert_eq!(sink.units(), 4);
    }

    #[test]
    fn test_zero_units_still_has_a_shard() {
        let sink = MetricsSink::new(0);
        sink.record(3, Metric::Passed);
        assert_eq!(sink.units(), 1);
        assert_eq!(sink.total(Metric::Passed), 1);
    }

    #[test]
    fn test_shards_sum_on_read() {
        let sink = MetricsSink::new(2);
        sink.record(0, Metric::DroppedRate);
        sink.record(1, Metric::DroppedRate);
        sink.record(1, Metric::DroppedBlock);
        // unit index wraps onto the shard count
        sink.record(2, Metric::Passed);

        assert_eq!(
            sink.snapshot(),
            MetricsSnapshot {
                passed: 1,
                dropped_rate: 2,
                dropped_block: 1
            }
        );
        assert_eq!(sink.shard_snapshot(1).dropped(), 2);
        assert_eq!(sink.shard_snapshot(0).passed, 1);
    }

    #[test]
    fn test_concurrent_units() {
        let sink = Arc::new(MetricsSink::new(8));
        let handles: Vec<_> = (0..8)
            .map(|unit| {
                let sink = Arc::clone(&sink);
                thread::spawn(move || {
                    for _ in 0..10_000 {
                        sink.record(unit, Metric::Passed);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(sink.total(Metric::Passed), 80_000);
        assert_eq!(sink.shard_snapshot(5).passed, 10_000);
    }

    #[test]
    fn test_snapshot_covers_every_metric() {
        let sink = MetricsSink::new(3);
        for (n, metric) in Metric::ALL.into_iter().enumerate() {
            for _ in 0..=n {
                sink.record(n, metric);
            }
        }
        let snap = sink.snapshot();
        for (n, metric) in Metric::ALL.into_iter().enumerate() {
            assert_eq!(snap.get(metric), n as u64 + 1, "{}", metric);
            assert_eq!(sink.shard_snapshot(n).get(metric), n as u64 + 1);
        }
    }

    #[test]
    fn test_shard_alignment() {
        assert_eq!(std::mem::align_of::<Shard>(), 64);
    }

    #[test]
    fn test_prometheus_format() {
        let snap = MetricsSnapshot {
            passed: 10,
            dropped_rate: 3,
            dropped_block: 7,
        };
        let text = snap.to_prometheus_format();
        assert!(text.contains("cerberus_packets_passed_total 10"));
        assert!(text.contains("cerberus_packets_dropped_rate_total 3"));
        assert!(text.contains("cerberus_packets_dropped_block_total 7"));
        assert!(text.contains("# TYPE cerberus_packets_passed_total counter"));
        assert_eq!(snap.dropped(), 10);
    }

    #[test]
    fn test_snapshot_json() {
        let snap = MetricsSnapshot {
            passed: 1,
            dropped_rate: 2,
            dropped_block: 3,
        };
        let json = serde_json::to_string(&snap).unwrap();
        assert_eq!(json, r#"{"passed":1,"dropped_rate":2,"dropped_block":3}"#);
        let back: MetricsSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get(Metric::DroppedBlock), 3);
    }
}
