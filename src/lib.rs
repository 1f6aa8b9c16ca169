// Library interface for the Cerberus admission filter
// Shared decision core plus the XDP and TC entry adapters

pub mod block_store;
pub mod bounded_cache;
pub mod config;
pub mod constants;
pub mod error;
pub mod header;
pub mod hooks;
pub mod lock_utils;
pub mod metrics;
pub mod policy;
pub mod rate_tracker;
pub mod replay;
pub mod report;
pub mod simulate;
pub mod synth;

pub use config::FilterConfig;
pub use error::{ConfigError, ReplayError, SimulationError};
pub use header::{parse_frame, HeaderOutcome, Layer, PacketSummary, Transport};
pub use hooks::{FallbackHook, FastPathHook, FilterCore, Handled, HostHook, TcAction, XdpAction};
pub use metrics::{Metric, MetricsSink, MetricsSnapshot};
pub use policy::{AdmissionPolicy, Decision, Verdict};
