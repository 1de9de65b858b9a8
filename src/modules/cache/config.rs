//! Tiered cache configuration.

use crate::config::{ValidationError, ValidationResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the two-level cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of entries in the hot level.
    pub l1_max_size: usize,

    /// Default time-to-live for hot entries.
    #[serde(with = "humantime_serde")]
    pub l1_ttl: Duration,

    /// Maximum number of entries in the warm level.
    pub l2_max_size: usize,

    /// Default time-to-live for warm entries.
    #[serde(with = "humantime_serde")]
    pub l2_ttl: Duration,

    /// Memory ceiling across both levels, in megabytes.
    pub max_memory_usage_mb: f64,

    /// Share of the memory ceiling reserved for the hot level.
    pub hot_memory_fraction: f64,

    /// Compress large warm entries during `optimize()`.
    pub compression_enabled: bool,

    /// Minimum value size considered for compression.
    pub compression_threshold_bytes: usize,

    /// Hot entries idle for longer than this are demoted by `optimize()`.
    #[serde(with = "humantime_serde")]
    pub cold_after: Duration,

    /// Warm hits needed before an entry is promoted back to hot.
    pub promote_after_hits: u32,

    /// Target false-positive rate of the key pre-filter.
    pub bloom_false_positive_rate: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            l1_max_size: 1000,
            l1_ttl: Duration::from_secs(5 * 60),
            l2_max_size: 10_000,
            l2_ttl: Duration::from_secs(60 * 60),
            max_memory_usage_mb: 100.0,
            hot_memory_fraction: 0.25,
            compression_enabled: true,
            compression_threshold_bytes: 1024,
            cold_after: Duration::from_secs(10 * 60),
            promote_after_hits: 1,
            bloom_false_positive_rate: 0.01,
        }
    }
}

impl CacheConfig {
    /// Memory ceiling in bytes.
    #[must_use]
    pub fn max_memory_bytes(&self) -> usize {
        (self.max_memory_usage_mb * 1024.0 * 1024.0) as usize
    }

    /// Byte budget of the hot level.
    #[must_use]
    pub fn hot_memory_bytes(&self) -> usize {
        (self.max_memory_bytes() as f64 * self.hot_memory_fraction) as usize
    }

    /// Byte budget of the warm level. Hot plus warm never exceeds the ceiling.
    #[must_use]
    pub fn warm_memory_bytes(&self) -> usize {
        self.max_memory_bytes() - self.hot_memory_bytes()
    }

    /// Check ranges and consistency.
    #[must_use]
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        if self.l1_max_size == 0 {
            result.add_error(ValidationError::error(
                "cache.l1_max_size",
                "must be at least 1",
            ));
        }
        if self.l2_max_size == 0 {
            result.add_error(ValidationError::error(
                "cache.l2_max_size",
                "must be at least 1",
            ));
        }
        if self.l1_ttl.is_zero() {
            result.add_error(ValidationError::error("cache.l1_ttl", "must be positive"));
        }
        if self.l2_ttl.is_zero() {
            result.add_error(ValidationError::error("cache.l2_ttl", "must be positive"));
        } else if self.l2_ttl < self.l1_ttl {
            result.add_error(ValidationError::warning(
                "cache.l2_ttl",
                "shorter than l1_ttl; demoted entries will expire before hot ones",
            ));
        }
        if !(self.max_memory_usage_mb > 0.0 && self.max_memory_usage_mb.is_finite()) {
            result.add_error(ValidationError::error(
                "cache.max_memory_usage_mb",
                "must be a positive number",
            ));
        }
        if !(self.hot_memory_fraction > 0.0 && self.hot_memory_fraction < 1.0) {
            result.add_error(ValidationError::error(
                "cache.hot_memory_fraction",
                "must be between 0 and 1 (exclusive)",
            ));
        }
        if self.compression_threshold_bytes == 0 {
            result.add_error(ValidationError::error(
                "cache.compression_threshold_bytes",
                "must be at least 1",
            ));
        }
        if self.cold_after.is_zero() {
            result.add_error(ValidationError::error(
                "cache.cold_after",
                "must be positive",
            ));
        }
        if self.promote_after_hits == 0 {
            result.add_error(ValidationError::error(
                "cache.promote_after_hits",
                "must be at least 1",
            ));
        }
        if !(self.bloom_false_positive_rate > 0.0 && self.bloom_false_positive_rate < 1.0) {
            result.add_error(ValidationError::error(
                "cache.bloom_false_positive_rate",
                "must be between 0 and 1 (exclusive)",
            ));
        }

        result
    }
}
