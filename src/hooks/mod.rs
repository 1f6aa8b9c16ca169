//! Entry adapters
//!
//! Thin per-host wrappers around the shared [`AdmissionPolicy`]. An adapter
//! receives a raw frame, the invoking execution unit and a monotonic
//! timestamp, runs the header validator and the policy, records metrics
//! according to its own accounting table and returns its host's code.

pub mod fallback;
pub mod fast_path;

pub use fallback::{FallbackHook, TcAction};
pub use fast_path::{FastPathHook, XdpAction};

use std::fmt;

use crate::config::FilterConfig;
use crate::error::ConfigError;
use crate::header::parse_frame;
use crate::metrics::{Metric, MetricsSink};
use crate::policy::{AdmissionPolicy, Decision, Verdict};

/// State shared by every adapter attached to the same host
#[derive(Debug)]
pub struct FilterCore {
    policy: AdmissionPolicy,
    metrics: MetricsSink,
}

impl FilterCore {
    /// Build the shared state from a validated configuration
    pub fn new(config: &FilterConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            policy: AdmissionPolicy::new(config),
            metrics: MetricsSink::new(config.resolved_execution_units()),
        })
    }

    pub fn policy(&self) -> &AdmissionPolicy {
        &self.policy
    }

    pub fn metrics(&self) -> &MetricsSink {
        &self.metrics
    }
}

/// One adapter call, with the decision that produced the code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handled<C> {
    pub decision: Decision,
    pub code: C,
}

/// Packet entry point for one host context
pub trait HostHook {
    /// Host return code
    type Code: Copy + fmt::Debug + PartialEq;

    /// Short name used in logs and reports
    const NAME: &'static str;

    fn core(&self) -> &FilterCore;

    /// Host code for a verdict
    fn code_for(verdict: Verdict) -> Self::Code;

    /// Counter bumped for a decision, if any
    fn metric_for(decision: Decision) -> Option<Metric>;

    /// Numeric value handed back to the host
    fn raw_code(code: Self::Code) -> i64;

    /// Symbolic name of a host code
    fn code_name(code: Self::Code) -> &'static str;

    fn process(&self, frame: &[u8], unit: usize, now: u64) -> Handled<Self::Code> {
        let core = self.core();
        let decision = core.policy().evaluate(&parse_frame(frame), now);
        if let Some(metric) = Self::metric_for(decision) {
            core.metrics().record(unit, metric);
        }
        Handled {
            decision,
            code: Self::code_for(decision.verdict()),
        }
    }

    fn handle(&self, frame: &[u8], unit: usize, now: u64) -> Self::Code {
        self.process(frame, unit, now).code
    }
}
