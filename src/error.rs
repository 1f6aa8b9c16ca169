use std::path::PathBuf;
use thiserror::Error;

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("Invalid rate_budget: must be > 0")]
    ZeroRateBudget,

    #[error("Invalid block_duration_ns: {value} (must be between {min} and {max})")]
    BlockDuration { value: u64, min: u64, max: u64 },

    #[error("Invalid tunnel_port: cannot be 0")]
    ZeroTunnelPort,

    #[error("Invalid {store} capacity: {value} (must be between 1 and {max})")]
    Capacity {
        store: &'static str,
        value: usize,
        max: usize,
    },

    #[error("Invalid execution_units: {value} (must be between 1 and {max})")]
    ExecutionUnits { value: usize, max: usize },
}

/// Capture replay errors
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Failed to read capture {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid capture header: {0}")]
    Header(String),

    #[error("Corrupt capture record #{index}: {reason}")]
    Record { index: usize, reason: String },

    #[error("Unsupported capture link type {0} (only Ethernet is supported)")]
    LinkType(i32),
}

/// Traffic simulation errors
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Simulation worker {unit} panicked: {reason}")]
    WorkerPanicked { unit: usize, reason: String },
}
