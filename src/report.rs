//! Traffic Reports
//!
//! Aggregated outcome of driving a batch of frames through one adapter: the
//! simulator and the capture replay both produce a [`TrafficReport`].

use serde::Serialize;
use std::collections::BTreeMap;

use crate::hooks::{FilterCore, Handled, HostHook};
use crate::metrics::MetricsSnapshot;
use crate::policy::Verdict;

// =============================================================================
// REPORT
// =============================================================================

/// Verdict and decision tallies for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrafficReport {
    /// Adapter name (`xdp` or `tc`)
    pub path: &'static str,
    pub frames: u64,
    pub passed: u64,
    pub dropped: u64,
    /// Frames per decision label
    pub decisions: BTreeMap<&'static str, u64>,
    /// Frames per host return code
    pub codes: BTreeMap<&'static str, u64>,
    /// Numeric value of each host return code seen
    pub code_values: BTreeMap<&'static str, i64>,
    /// Sources still present in the block store at the end of the run
    pub blocked_sources: usize,
    /// Sources still present in the rate tracker at the end of the run
    pub tracked_sources: usize,
    /// Metrics sink totals at the end of the run
    pub metrics: MetricsSnapshot,
}

impl TrafficReport {
    pub fn new(path: &'static str) -> Self {
        Self {
            path,
            ..Default::default()
        }
    }

    /// Tally one adapter call
    pub fn record<H: HostHook>(&mut self, handled: Handled<H::Code>) {
        self.frames += 1;
        match handled.decision.verdict() {
            Verdict::Pass => self.passed += 1,
            Verdict::Drop => self.dropped += 1,
        }
        *self.decisions.entry(handled.decision.label()).or_default() += 1;
        let name = H::code_name(handled.code);
        *self.codes.entry(name).or_default() += 1;
        self.code_values.insert(name, H::raw_code(handled.code));
    }

    /// Fold a per-worker report into this one
    pub fn merge(&mut self, other: &TrafficReport) {
        self.frames += other.frames;
        self.passed += other.passed;
        self.dropped += other.dropped;
        for (label, count) in &other.decisions {
            *self.decisions.entry(*label).or_default() += *count;
        }
        for (code, count) in &other.codes {
            *self.codes.entry(*code).or_default() += *count;
        }
        self.code_values
            .extend(other.code_values.iter().map(|(code, value)| (*code, *value)));
    }

    /// Capture store sizes and metric totals from the shared state
    pub fn finish(&mut self, core: &FilterCore) {
        self.blocked_sources = core.policy().blocks().len();
        self.tracked_sources = core.policy().rates().len();
        self.metrics = core.metrics().snapshot();
    }

    pub fn decision_count(&self, label: &str) -> u64 {
        self.decisions.get(label).copied().unwrap_or(0)
    }

    /// Share of frames dropped, in percent
    pub fn drop_rate(&self) -> f64 {
        if self.frames == 0 {
            return 0.0;
        }
        (self.dropped as f64 / self.frames as f64) * 100.0
    }
}
