//! Traffic-control ingress (TC) entry adapter
//!
//! Used when the driver-level hook cannot be attached. Same decisions as the
//! fast path but a different code vocabulary, and passed traffic is never
//! counted here.
//!
//! | Verdict | Code              |
//! |---------|-------------------|
//! | Pass    | `TC_ACT_OK` 0     |
//! | Drop    | `TC_ACT_SHOT` 2   |

use std::sync::Arc;

use super::{FilterCore, HostHook};
use crate::metrics::Metric;
use crate::policy::{Decision, Verdict};

/// TC classifier action codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum TcAction {
    /// Inherit the host's default action; never produced by the filter
    Unspec = -1,
    Ok = 0,
    Shot = 2,
}

impl TcAction {
    pub fn as_raw(self) -> i32 {
        self as i32
    }

    pub fn name(self) -> &'static str {
        match self {
            TcAction::Unspec => "TC_ACT_UNSPEC",
            TcAction::Ok => "TC_ACT_OK",
            TcAction::Shot => "TC_ACT_SHOT",
        }
    }
}

/// Fallback adapter over a shared [`FilterCore`]
#[derive(Debug, Clone)]
pub struct FallbackHook {
    core: Arc<FilterCore>,
}

impl FallbackHook {
    pub fn new(core: Arc<FilterCore>) -> Self {
        Self { core }
    }
}

impl HostHook for FallbackHook {
    type Code = TcAction;

    const NAME: &'static str = "tc";

    fn core(&self) -> &FilterCore {
        &self.core
    }

    fn code_for(verdict: Verdict) -> TcAction {
        match verdict {
            Verdict::Pass => TcAction::Ok,
            Verdict::Drop => TcAction::Shot,
        }
    }

    fn metric_for(decision: Decision) -> Option<Metric> {
        match decision {
            Decision::Blocked => Some(Metric::DroppedBlock),
            Decision::RateLimited => Some(Metric::DroppedRate),
            _ => None,
        }
    }

    fn raw_code(code: TcAction) -> i64 {
        i64::from(code.as_raw())
    }

    fn code_name(code: TcAction) -> &'static str {
        code.name()
    }
}
