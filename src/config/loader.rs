//! Configuration file loader.

use super::error::{ConfigError, ConfigResult};
use super::types::PerfConfig;
use super::validation::{BasicValidator, ValidationResult, Validator};
use crate::modules::load_balancer::StrategyType;
use std::path::Path;
use tracing::debug;

/// Overrides the load balancing strategy.
pub const ENV_STRATEGY: &str = "ADAPTIVE_PERF_STRATEGY";
/// Overrides the cache memory ceiling in megabytes.
pub const ENV_MAX_MEMORY_MB: &str = "ADAPTIVE_PERF_MAX_MEMORY_MB";

/// Configuration loader with validation and environment overrides.
#[derive(Debug)]
pub struct ConfigLoader {
    /// Validators to run on loaded configuration.
    validators: Vec<Box<dyn Validator>>,
    /// Apply `ADAPTIVE_PERF_*` environment overrides.
    env_overrides: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self {
            validators: vec![Box::new(BasicValidator::new())],
            env_overrides: true,
        }
    }
}

impl ConfigLoader {
    /// Create a loader with the basic validator and environment overrides enabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a validator to the loader.
    #[must_use]
    pub fn with_validator<V: Validator + 'static>(mut self, validator: V) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    /// Disable environment overrides.
    #[must_use]
    pub fn without_env_overrides(mut self) -> Self {
        self.env_overrides = false;
        self
    }

    /// Load configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file does not exist
    /// - The file cannot be read
    /// - The TOML is malformed
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(&self, path: P) -> ConfigResult<PerfConfig> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        debug!(path = %path.display(), "Loading configuration");
        self.load_str(&content)
    }

    /// Load configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed, an override is unparsable,
    /// or validation fails.
    pub fn load_str(&self, content: &str) -> ConfigResult<PerfConfig> {
        let mut config: PerfConfig = toml::from_str(content)?;
        if self.env_overrides {
            apply_overrides(&mut config, |key| std::env::var(key).ok())?;
        }
        self.validate(&config)?;
        Ok(config)
    }

    /// Load configuration or return the default if the file doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default<P: AsRef<Path>>(&self, path: P) -> ConfigResult<PerfConfig> {
        let path = path.as_ref();
        if path.exists() {
            self.load(path)
        } else {
            self.load_str("")
        }
    }

    /// Save configuration to a file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn save<P: AsRef<Path>>(&self, config: &PerfConfig, path: P) -> ConfigResult<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(config)?;
        std::fs::write(path, content).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(())
    }

    /// Validate a configuration against all registered validators.
    fn validate(&self, config: &PerfConfig) -> ConfigResult<()> {
        let mut result = ValidationResult::new();
        for validator in &self.validators {
            result.merge(validator.validate(config));
        }
        result.into_result()
    }
}

/// Apply `ADAPTIVE_PERF_*` overrides using `lookup` to read variables.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] if a variable is set but unparsable.
pub fn apply_overrides<F>(config: &mut PerfConfig, lookup: F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(ENV_STRATEGY) {
        config.load_balancer.strategy =
            raw.parse::<StrategyType>()
                .map_err(|message| ConfigError::Invalid {
                    field: ENV_STRATEGY.to_string(),
                    message,
                })?;
        debug!(strategy = %raw, "Strategy overridden from environment");
    }

    if let Some(raw) = lookup(ENV_MAX_MEMORY_MB) {
        config.cache.max_memory_usage_mb =
            raw.trim()
                .parse::<f64>()
                .map_err(|e| ConfigError::Invalid {
                    field: ENV_MAX_MEMORY_MB.to_string(),
                    message: e.to_string(),
                })?;
        debug!(max_memory_mb = %raw, "Memory ceiling overridden from environment");
    }

    Ok(())
}
