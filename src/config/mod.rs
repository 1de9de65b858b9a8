//! # Configuration System
//!
//! TOML-based configuration for every component, with validation and a
//! small set of environment overrides.
//!
//! ## Example Configuration
//!
//! ```toml
//! [cache]
//! l1_max_size = 1000
//! l1_ttl = "5m"
//! max_memory_usage_mb = 100
//!
//! [load_balancer]
//! strategy = "least-connections"
//! circuit_breaker_threshold = 5
//! circuit_breaker_timeout = "30s"
//!
//! [monitor.alert_thresholds]
//! error_rate = 0.05
//!
//! [benchmark]
//! regression_threshold = 0.2
//! ```
//!
//! `ADAPTIVE_PERF_STRATEGY` and `ADAPTIVE_PERF_MAX_MEMORY_MB` override the
//! corresponding fields after the file is parsed.

mod error;
mod loader;
mod types;
mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{apply_overrides, ConfigLoader, ENV_MAX_MEMORY_MB, ENV_STRATEGY};
pub use types::PerfConfig;
pub use validation::{
    BasicValidator, ConsistencyValidator, ValidationError, ValidationResult, ValidationSeverity,
    Validator,
};
