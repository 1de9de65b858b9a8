//! Configuration validation system.

use super::error::{ConfigError, ConfigResult};
use super::types::PerfConfig;
use tracing::warn;

/// A single validation issue.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// Error message.
    pub message: String,
    /// Severity level.
    pub severity: ValidationSeverity,
}

impl ValidationError {
    /// Create a new error.
    pub fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            severity: ValidationSeverity::Error,
        }
    }

    /// Create a new warning.
    pub fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            severity: ValidationSeverity::Warning,
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Severity of validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationSeverity {
    /// Error - configuration is invalid.
    Error,
    /// Warning - configuration may have issues.
    Warning,
}

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    errors: Vec<ValidationError>,
}

impl ValidationResult {
    /// Create a new empty (valid) result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an issue to the result.
    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Check if the validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self
            .errors
            .iter()
            .any(|e| e.severity == ValidationSeverity::Error)
    }

    /// Get all validation issues.
    #[must_use]
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Get only errors (not warnings).
    #[must_use]
    pub fn errors_only(&self) -> Vec<&ValidationError> {
        self.errors
            .iter()
            .filter(|e| e.severity == ValidationSeverity::Error)
            .collect()
    }

    /// Get only warnings.
    #[must_use]
    pub fn warnings(&self) -> Vec<&ValidationError> {
        self.errors
            .iter()
            .filter(|e| e.severity == ValidationSeverity::Warning)
            .collect()
    }

    /// Merge another validation result into this one.
    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
    }

    /// Log warnings and convert errors into a [`ConfigError`].
    ///
    /// A single error keeps its field as [`ConfigError::Invalid`]; several are
    /// joined into [`ConfigError::Validation`].
    ///
    /// # Errors
    ///
    /// Returns an error if any issue has error severity.
    pub fn into_result(self) -> ConfigResult<()> {
        for warning in self.warnings() {
            warn!(field = %warning.field, "{}", warning.message);
        }

        let mut errors: Vec<ValidationError> = self
            .errors
            .into_iter()
            .filter(|e| e.severity == ValidationSeverity::Error)
            .collect();

        match errors.len() {
            0 => Ok(()),
            1 => {
                let err = errors.remove(0);
                Err(ConfigError::Invalid {
                    field: err.field,
                    message: err.message,
                })
            },
            _ => Err(ConfigError::Validation(
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            )),
        }
    }
}

/// Trait for configuration validators.
pub trait Validator: std::fmt::Debug + Send + Sync {
    /// Validate a configuration and return any issues.
    fn validate(&self, config: &PerfConfig) -> ValidationResult;
}

/// Built-in validator running every section's range checks.
#[derive(Debug, Default)]
pub struct BasicValidator;

impl BasicValidator {
    /// Create a new basic validator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Validator for BasicValidator {
    fn validate(&self, config: &PerfConfig) -> ValidationResult {
        let mut result = ValidationResult::new();
        result.merge(config.cache.validate());
        result.merge(config.load_balancer.validate());
        result.merge(config.monitor.validate());
        result.merge(config.benchmark.validate());
        result.merge(config.rate_limit.validate());
        result.merge(config.manager.validate());
        result
    }
}

/// Validator for settings that only make sense together.
#[derive(Debug, Default)]
pub struct ConsistencyValidator;

impl ConsistencyValidator {
    /// Create a new consistency validator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Validator for ConsistencyValidator {
    fn validate(&self, config: &PerfConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        if config.cache.max_memory_usage_mb > config.monitor.alert_thresholds.memory_usage_mb {
            result.add_error(ValidationError::warning(
                "cache.max_memory_usage_mb",
                format!(
                    "cache ceiling {}MB exceeds the memory alert threshold {}MB; a full cache will keep alerting",
                    config.cache.max_memory_usage_mb, config.monitor.alert_thresholds.memory_usage_mb
                ),
            ));
        }

        if let Some(timeout) = config.load_balancer.request_timeout {
            if timeout >= config.load_balancer.circuit_breaker_timeout {
                result.add_error(ValidationError::warning(
                    "load_balancer.request_timeout",
                    "request timeout is not shorter than the circuit breaker timeout",
                ));
            }
        }

        if config.manager.optimize_interval < config.monitor.sample_interval {
            result.add_error(ValidationError::warning(
                "manager.optimize_interval",
                "optimizing more often than sampling",
            ));
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_basic_validator_valid() {
        let config = PerfConfig::default();
        let result = BasicValidator::new().validate(&config);
        assert!(result.is_valid());
    }

    #[test]
    fn test_basic_validator_collects_sections() {
        let mut config = PerfConfig::default();
        config.cache.l1_max_size = 0;
        config.load_balancer.max_connections = 0;

        let result = BasicValidator::new().validate(&config);
        assert!(!result.is_valid());
        assert_eq!(result.errors_only().len(), 2);
    }

    #[test]
    fn test_consistency_warnings() {
        let mut config = PerfConfig::default();
        config.cache.max_memory_usage_mb = 1024.0;
        config.load_balancer.request_timeout = Some(Duration::from_secs(60));

        let result = ConsistencyValidator::new().validate(&config);
        assert!(result.is_valid());
        assert_eq!(result.warnings().len(), 2);
    }

    #[test]
    fn test_into_result_single_error_keeps_field() {
        let mut result = ValidationResult::new();
        result.add_error(ValidationError::error("cache.l1_max_size", "must be at least 1"));
        result.add_error(ValidationError::warning("cache.l2_ttl", "short"));

        match result.into_result() {
            Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, "cache.l1_max_size"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_into_result_joins_errors() {
        let mut result = ValidationResult::new();
        result.add_error(ValidationError::error("a", "bad"));
        result.add_error(ValidationError::error("b", "worse"));

        let err = result.into_result().unwrap_err();
        assert_eq!(
            err.to_string(),
            "configuration validation failed: a: bad; b: worse"
        );
    }

    #[test]
    fn test_validation_result_merge() {
        let mut result1 = ValidationResult::new();
        result1.add_error(ValidationError::error("field1", "error1"));

        let mut result2 = ValidationResult::new();
        result2.add_error(ValidationError::warning("field2", "warning1"));

        result1.merge(result2);
        assert_eq!(result1.errors().len(), 2);
    }
}
