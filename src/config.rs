//! Typed construction options for a [`crate::cache::Cache`]. Deriving
//! `serde::{Serialize, Deserialize}` here matches the teacher's practice of
//! deriving serde on every config struct in `config/mod.rs` regardless of
//! whether a given deployment actually loads it from a file — file-based
//! loading itself is not part of this crate's surface.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Number of counters backing the TinyLFU sketch/doorkeeper, rounded up
    /// to the next power of two.
    pub num_counters: usize,
    /// Total cost budget the Sampled-LFU policy enforces.
    pub max_cost: i64,
    /// Total buffered `get` slots across all read-buffer stripes.
    pub buffer_items: usize,
    /// Whether counters/histogram accumulate at all.
    pub metrics: bool,
    /// Whether the internal bookkeeping cost of a stored item counts
    /// against `max_cost` in addition to the caller-supplied cost.
    pub ignore_internal_cost: bool,
    /// How often the mutator sweeps the TTL bucket index.
    #[serde(with = "humantime_serde")]
    pub ttl_ticker: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            num_counters: 1 << 20,
            max_cost: 1 << 30,
            buffer_items: 64,
            metrics: true,
            ignore_internal_cost: false,
            ttl_ticker: Duration::from_secs(1),
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_counters == 0 {
            return Err(ConfigError::NumCountersZero);
        }
        if self.max_cost <= 0 {
            return Err(ConfigError::MaxCostZero);
        }
        if self.buffer_items == 0 {
            return Err(ConfigError::BufferItemsZero);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(CacheConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_num_counters_is_rejected() {
        let cfg = CacheConfig { num_counters: 0, ..CacheConfig::default() };
        assert_eq!(cfg.validate(), Err(ConfigError::NumCountersZero));
    }

    #[test]
    fn non_positive_max_cost_is_rejected() {
        let cfg = CacheConfig { max_cost: 0, ..CacheConfig::default() };
        assert_eq!(cfg.validate(), Err(ConfigError::MaxCostZero));
    }

    #[test]
    fn zero_buffer_items_is_rejected() {
        let cfg = CacheConfig { buffer_items: 0, ..CacheConfig::default() };
        assert_eq!(cfg.validate(), Err(ConfigError::BufferItemsZero));
    }
}
