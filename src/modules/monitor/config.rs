//! Performance monitor configuration.

use crate::config::{ValidationError, ValidationResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the performance monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// How often the manager samples resource usage.
    #[serde(with = "humantime_serde")]
    pub sample_interval: Duration,

    /// Capacity of each metric window.
    pub window_size: usize,

    /// Fraction of response-time samples kept. Counters and errors are never sampled.
    pub sampling_rate: f64,

    /// Alert thresholds.
    pub alert_thresholds: AlertThresholds,

    /// Minimum time between two alerts of the same kind.
    #[serde(with = "humantime_serde")]
    pub alert_cooldown: Duration,

    /// Outcomes needed in the window before latency, error-rate or health alerts fire.
    pub alert_min_samples: usize,

    /// Fired alerts kept for inspection.
    pub alert_history_size: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_secs(5),
            window_size: 1000,
            sampling_rate: 1.0,
            alert_thresholds: AlertThresholds::default(),
            alert_cooldown: Duration::from_secs(5 * 60),
            alert_min_samples: 10,
            alert_history_size: 100,
        }
    }
}

/// Threshold per alert kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    /// Average response time above which an alert fires.
    pub response_time_ms: f64,
    /// Error rate (0..1) above which an alert fires.
    pub error_rate: f64,
    /// Memory usage above which an alert fires.
    pub memory_usage_mb: f64,
    /// CPU usage above which an alert fires.
    pub cpu_usage_percent: f64,
    /// Health score below which an alert fires.
    pub health_score: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            response_time_ms: 1000.0,
            error_rate: 0.05,
            memory_usage_mb: 512.0,
            cpu_usage_percent: 80.0,
            health_score: 70.0,
        }
    }
}

impl MonitorConfig {
    /// Check ranges.
    #[must_use]
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        if self.sample_interval.is_zero() {
            result.add_error(ValidationError::error(
                "monitor.sample_interval",
                "must be positive",
            ));
        }
        if self.window_size == 0 {
            result.add_error(ValidationError::error(
                "monitor.window_size",
                "must be at least 1",
            ));
        }
        if !(self.sampling_rate > 0.0 && self.sampling_rate <= 1.0) {
            result.add_error(ValidationError::error(
                "monitor.sampling_rate",
                "must be in (0, 1]",
            ));
        }
        if self.alert_cooldown.is_zero() {
            result.add_error(ValidationError::error(
                "monitor.alert_cooldown",
                "must be positive",
            ));
        }
        if self.alert_history_size == 0 {
            result.add_error(ValidationError::error(
                "monitor.alert_history_size",
                "must be at least 1",
            ));
        }

        let t = &self.alert_thresholds;
        if !(t.response_time_ms > 0.0) {
            result.add_error(ValidationError::error(
                "monitor.alert_thresholds.response_time_ms",
                "must be positive",
            ));
        }
        if !(t.error_rate > 0.0 && t.error_rate <= 1.0) {
            result.add_error(ValidationError::error(
                "monitor.alert_thresholds.error_rate",
                "must be in (0, 1]",
            ));
        }
        if !(t.memory_usage_mb > 0.0) {
            result.add_error(ValidationError::error(
                "monitor.alert_thresholds.memory_usage_mb",
                "must be positive",
            ));
        }
        if !(t.cpu_usage_percent > 0.0 && t.cpu_usage_percent <= 100.0) {
            result.add_error(ValidationError::error(
                "monitor.alert_thresholds.cpu_usage_percent",
                "must be in (0, 100]",
            ));
        }
        if !(0.0..=100.0).contains(&t.health_score) {
            result.add_error(ValidationError::error(
                "monitor.alert_thresholds.health_score",
                "must be in [0, 100]",
            ));
        }
        if self.alert_min_samples > self.window_size {
            result.add_error(ValidationError::warning(
                "monitor.alert_min_samples",
                "larger than the window; rate alerts will never fire",
            ));
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = MonitorConfig::default();
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings().is_empty());
    }

    #[test]
    fn test_sampling_rate_bounds() {
        for rate in [0.0, -0.5, 1.5, f64::NAN] {
            let config = MonitorConfig {
                sampling_rate: rate,
                ..MonitorConfig::default()
            };
            assert_eq!(config.validate().errors_only().len(), 1, "rate {rate}");
        }
    }

    #[test]
    fn test_partial_thresholds() {
        let config: MonitorConfig = toml::from_str(
            r#"
            sample_interval = "1s"

            [alert_thresholds]
            cpu_usage_percent = 95
        "#,
        )
        .unwrap();
        assert_eq!(config.sample_interval, Duration::from_secs(1));
        assert_eq!(config.alert_thresholds.cpu_usage_percent, 95.0);
        assert_eq!(config.alert_thresholds.error_rate, 0.05);
    }
}
