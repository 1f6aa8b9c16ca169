use serde::{Deserialize, Serialize};
use std::fs;
use std::num::NonZeroUsize;
use std::path::Path;

use crate::bounded_cache::MAX_CAPACITY;
use crate::constants::{
    BLOCK_DURATION_NS, BLOCK_STORE_CAPACITY, RATE_BUDGET_PPS, RATE_STORE_CAPACITY, TUNNEL_PORT,
};
use crate::error::ConfigError;

/// Shortest accepted block (1 second)
pub const MIN_BLOCK_DURATION_NS: u64 = 1_000_000_000;

/// Longest accepted block (24 hours)
pub const MAX_BLOCK_DURATION_NS: u64 = 86_400 * 1_000_000_000;

/// Upper bound on metric shards
pub const MAX_EXECUTION_UNITS: usize = 1024;

/// Filter configuration
///
/// `Default` is the compiled-in policy shared by both entry adapters. A TOML
/// file only needs the keys it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Packets per second allowed per source
    pub rate_budget: u64,
    /// Block length after exceeding the budget
    pub block_duration_ns: u64,
    /// UDP destination port that is rate-limited like TCP
    pub tunnel_port: u16,
    /// Maximum tracked sources
    pub rate_capacity: usize,
    /// Maximum blocked sources
    pub block_capacity: usize,
    /// Metric shards; `None` uses the host's available parallelism
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_units: Option<usize>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            rate_budget: RATE_BUDGET_PPS,
            block_duration_ns: BLOCK_DURATION_NS,
            tunnel_port: TUNNEL_PORT,
            rate_capacity: RATE_STORE_CAPACITY,
            block_capacity: BLOCK_STORE_CAPACITY,
            execution_units: None,
        }
    }
}

impl FilterConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: FilterConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_budget == 0 {
            return Err(ConfigError::ZeroRateBudget);
        }

        if !(MIN_BLOCK_DURATION_NS..=MAX_BLOCK_DURATION_NS).contains(&self.block_duration_ns) {
            return Err(ConfigError::BlockDuration {
                value: self.block_duration_ns,
                min: MIN_BLOCK_DURATION_NS,
                max: MAX_BLOCK_DURATION_NS,
            });
        }

        if self.tunnel_port == 0 {
            return Err(ConfigError::ZeroTunnelPort);
        }

        for (store, value) in [
            ("rate store", self.rate_capacity),
            ("block store", self.block_capacity),
        ] {
            if value == 0 || value > MAX_CAPACITY {
                return Err(ConfigError::Capacity {
                    store,
                    value,
                    max: MAX_CAPACITY,
                });
            }
        }

        if let Some(units) = self.execution_units {
            if units == 0 || units > MAX_EXECUTION_UNITS {
                return Err(ConfigError::ExecutionUnits {
                    value: units,
                    max: MAX_EXECUTION_UNITS,
                });
            }
        }

        Ok(())
    }

    /// Metric shard count, resolving `None` against the host
    pub fn resolved_execution_units(&self) -> usize {
        self.execution_units.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        })
    }

    pub(crate) fn rate_capacity_nonzero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.rate_capacity).unwrap_or(NonZeroUsize::MIN)
    }

    pub(crate) fn block_capacity_nonzero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.block_capacity).unwrap_or(NonZeroUsize::MIN)
    }
}
