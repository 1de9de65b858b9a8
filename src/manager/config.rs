//! Manager configuration.

use crate::config::{ValidationError, ValidationResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for the composition root and its maintenance loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// How often the maintenance loop runs `optimize()`.
    #[serde(with = "humantime_serde")]
    pub optimize_interval: Duration,

    /// Memoize successful results of `execute_with_monitoring` in the cache.
    pub memoize_results: bool,

    /// Timeout for unrouted monitored operations.
    #[serde(default, with = "humantime_serde")]
    pub operation_timeout: Option<Duration>,

    /// How long `shutdown()` waits for in-flight operations.
    #[serde(with = "humantime_serde")]
    pub drain_timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            optimize_interval: Duration::from_secs(60),
            memoize_results: true,
            operation_timeout: None,
            drain_timeout: Duration::from_secs(30),
        }
    }
}

impl ManagerConfig {
    /// Check ranges.
    #[must_use]
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        if self.optimize_interval < Duration::from_secs(5) {
            result.add_error(ValidationError::error(
                "manager.optimize_interval",
                "must be at least 5s",
            ));
        }
        if self.operation_timeout.is_some_and(|t| t.is_zero()) {
            result.add_error(ValidationError::error(
                "manager.operation_timeout",
                "must be positive",
            ));
        }
        if self.drain_timeout.is_zero() {
            result.add_error(ValidationError::error(
                "manager.drain_timeout",
                "must be positive",
            ));
        }

        result
    }
}
