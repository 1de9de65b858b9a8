//! Configuration for keyed rate limiting.

use crate::config::{ValidationError, ValidationResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Token-bucket limits applied per caller key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Whether checks are enforced. Disabled limiters allow everything.
    pub enabled: bool,

    /// Sustained rate per key (bucket refill rate).
    pub requests_per_second: f64,

    /// Bucket capacity per key.
    pub burst_size: u64,

    /// Maximum number of keys tracked at once; least recently seen keys are dropped.
    pub max_tracked_keys: usize,

    /// Buckets untouched for this long are discarded.
    #[serde(with = "humantime_serde")]
    pub idle_ttl: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_second: 100.0,
            burst_size: 200,
            max_tracked_keys: 10_000,
            idle_ttl: Duration::from_secs(10 * 60),
        }
    }
}

impl RateLimitConfig {
    /// Create a config with the given rate and burst.
    #[must_use]
    pub fn new(requests_per_second: f64, burst_size: u64) -> Self {
        Self {
            requests_per_second,
            burst_size,
            ..Self::default()
        }
    }

    /// Check ranges.
    #[must_use]
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        if !(self.requests_per_second > 0.0 && self.requests_per_second.is_finite()) {
            result.add_error(ValidationError::error(
                "rate_limit.requests_per_second",
                "must be a positive number",
            ));
        }
        if self.burst_size == 0 {
            result.add_error(ValidationError::error(
                "rate_limit.burst_size",
                "must be at least 1",
            ));
        }
        if self.max_tracked_keys == 0 {
            result.add_error(ValidationError::error(
                "rate_limit.max_tracked_keys",
                "must be at least 1",
            ));
        }
        if self.idle_ttl.is_zero() {
            result.add_error(ValidationError::error(
                "rate_limit.idle_ttl",
                "must be positive",
            ));
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(RateLimitConfig::default().validate().is_valid());
    }

    #[test]
    fn test_invalid_values() {
        let config = RateLimitConfig {
            requests_per_second: 0.0,
            burst_size: 0,
            ..RateLimitConfig::default()
        };
        assert_eq!(config.validate().errors_only().len(), 2);
    }

    #[test]
    fn test_parse_toml() {
        let config: RateLimitConfig = toml::from_str(
            r#"
            requests_per_second = 5
            idle_ttl = "30s"
        "#,
        )
        .unwrap();
        assert_eq!(config.requests_per_second, 5.0);
        assert_eq!(config.idle_ttl, Duration::from_secs(30));
        assert_eq!(config.burst_size, 200);
    }
}
