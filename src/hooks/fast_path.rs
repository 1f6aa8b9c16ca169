//! Driver-level (XDP) entry adapter
//!
//! | Verdict | Code         |
//! |---------|--------------|
//! | Pass    | `XDP_PASS` 2 |
//! | Drop    | `XDP_DROP` 1 |
//!
//! | Decision    | Counter         |
//! |-------------|-----------------|
//! | Blocked     | `dropped_block` |
//! | RateLimited | `dropped_rate`  |
//! | Unlimited   | `passed`        |

use std::sync::Arc;

use super::{FilterCore, HostHook};
use crate::metrics::Metric;
use crate::policy::{Decision, Verdict};

/// XDP program return codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum XdpAction {
    Aborted = 0,
    Drop = 1,
    Pass = 2,
    Tx = 3,
    Redirect = 4,
}

impl XdpAction {
    pub fn as_raw(self) -> u32 {
        self as u32
    }

    pub fn name(self) -> &'static str {
        match self {
            XdpAction::Aborted => "XDP_ABORTED",
            XdpAction::Drop => "XDP_DROP",
            XdpAction::Pass => "XDP_PASS",
            XdpAction::Tx => "XDP_TX",
            XdpAction::Redirect => "XDP_REDIRECT",
        }
    }
}

/// Fast-path adapter over a shared [`FilterCore`]
#[derive(Debug, Clone)]
pub struct FastPathHook {
    core: Arc<FilterCore>,
}

impl FastPathHook {
    pub fn new(core: Arc<FilterCore>) -> Self {
        Self { core }
    }
}

impl HostHook for FastPathHook {
    type Code = XdpAction;

    const NAME: &'static str = "xdp";

    fn core(&self) -> &FilterCore {
        &self.core
    }

    fn code_for(verdict: Verdict) -> XdpAction {
        match verdict {
            Verdict::Pass => XdpAction::Pass,
            Verdict::Drop => XdpAction::Drop,
        }
    }

    fn metric_for(decision: Decision) -> Option<Metric> {
        match decision {
            Decision::Blocked => Some(Metric::DroppedBlock),
            Decision::RateLimited => Some(Metric::DroppedRate),
            Decision::Unlimited => Some(Metric::Passed),
            _ => None,
        }
    }

    fn raw_code(code: XdpAction) -> i64 {
        i64::from(code.as_raw())
    }

    fn code_name(code: XdpAction) -> &'static str {
        code.name()
    }
}
