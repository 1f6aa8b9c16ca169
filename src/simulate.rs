//! Traffic simulator
//!
//! Drives synthetic per-source traffic through an adapter on a virtual clock.
//! Each source sends `pps` evenly spaced packets per second for `duration_secs`
//! seconds. Sources are spread over `workers` threads, and each worker acts as
//! one execution unit.

use clap::ValueEnum;
use serde::Serialize;
use std::any::Any;
use std::net::Ipv4Addr;
use std::thread;
use tracing::debug;

use crate::error::SimulationError;
use crate::hooks::HostHook;
use crate::report::TrafficReport;
use crate::synth::FrameBuilder;

/// First simulated source address (10.0.0.1)
const FIRST_SOURCE: u32 = 0x0a00_0001;

/// Virtual clock origin, so no packet is stamped at zero
const CLOCK_ORIGIN_NS: u64 = 1_000_000_000;

/// Shape of the generated packets
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficKind {
    /// TCP SYN flood to port 443
    Tcp,
    /// UDP to the rate-limited tunnel port
    Tunnel,
    /// UDP to port 53
    Udp,
    /// ICMP echo requests
    Icmp,
}

/// Parameters for one simulation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SimulationPlan {
    pub kind: TrafficKind,
    /// Packets per second sent by each source
    pub pps: u64,
    pub duration_secs: u64,
    pub sources: u32,
    pub workers: usize,
}

impl SimulationPlan {
    /// Total frames the run will generate
    pub fn total_frames(&self) -> u64 {
        self.pps
            .saturating_mul(self.duration_secs)
            .saturating_mul(u64::from(self.sources))
    }

    fn interval_ns(&self) -> u64 {
        1_000_000_000 / self.pps.max(1)
    }
}

/// Source address of simulated source `index`
pub fn source_address(index: u32) -> Ipv4Addr {
    Ipv4Addr::from(FIRST_SOURCE.wrapping_add(index))
}

fn frame_for(kind: TrafficKind, source: Ipv4Addr, tunnel_port: u16) -> Vec<u8> {
    match kind {
        TrafficKind::Tcp => FrameBuilder::tcp(source, 443).syn().build(),
        TrafficKind::Tunnel => FrameBuilder::udp(source, tunnel_port).payload(32).build(),
        TrafficKind::Udp => FrameBuilder::udp(source, 53).payload(32).build(),
        TrafficKind::Icmp => FrameBuilder::icmp(source).payload(56).build(),
    }
}

fn run_worker<H: HostHook>(hook: &H, plan: &SimulationPlan, unit: usize) -> TrafficReport {
    let mut report = TrafficReport::new(H::NAME);
    let tunnel_port = hook.core().policy().tunnel_port();
    let packets = plan.pps.saturating_mul(plan.duration_secs);
    let interval = plan.interval_ns();
    let workers = plan.workers.max(1);

    for index in (0..plan.sources).filter(|index| *index as usize % workers == unit) {
        let frame = frame_for(plan.kind, source_address(index), tunnel_port);
        for n in 0..packets {
            let now = CLOCK_ORIGIN_NS + n * interval;
            report.record::<H>(hook.process(&frame, unit, now));
        }
    }

    debug!("Simulation worker {} processed {} frames", unit, report.frames);
    report
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run `plan` through `hook` and return the merged report.
///
/// Fails if any worker panicked, since its frames would be missing from the
/// report while still counted in the shared metrics.
pub fn run_simulation<H>(hook: &H, plan: &SimulationPlan) -> Result<TrafficReport, SimulationError>
where
    H: HostHook + Sync,
{
    let workers = plan.workers.max(1);
    let mut report = TrafficReport::new(H::NAME);

    // every handle is joined so the scope never re-raises a worker panic
    let outcomes: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|unit| scope.spawn(move || run_worker(hook, plan, unit)))
            .collect();
        handles.into_iter().map(|handle| handle.join()).collect()
    });

    for (unit, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Ok(partial) => report.merge(&partial),
            Err(payload) => {
                return Err(SimulationError::WorkerPanicked {
                    unit,
                    reason: panic_reason(payload.as_ref()),
                })
            }
        }
    }

    report.finish(hook.core());
    Ok(report)
}
