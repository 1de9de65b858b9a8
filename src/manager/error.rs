//! Manager error type.

use crate::config::ConfigError;
use crate::modules::cache::CacheError;
use crate::modules::load_balancer::LoadBalancerError;
use crate::modules::monitor::MonitorError;
use crate::modules::rate_limiting::RateLimitError;
use crate::perf::BenchmarkError;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by [`super::PerformanceManager`].
#[derive(Debug, Error)]
pub enum PerfError {
    /// Cache failure.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Load balancer failure, including routed operation failures.
    #[error(transparent)]
    LoadBalancer(#[from] LoadBalancerError),

    /// Monitor failure.
    #[error(transparent)]
    Monitor(#[from] MonitorError),

    /// Benchmark failure.
    #[error(transparent)]
    Benchmark(#[from] BenchmarkError),

    /// Rate limit failure.
    #[error(transparent)]
    RateLimit(#[from] RateLimitError),

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An unrouted operation exceeded its timeout. Recorded as an error.
    #[error("operation '{label}' timed out after {timeout:?}")]
    Timeout {
        /// Operation label.
        label: String,
        /// Timeout that expired.
        timeout: Duration,
    },

    /// The manager is shutting down and accepts no new operations.
    #[error("performance manager is shutting down")]
    ShuttingDown,

    /// An unrouted operation failed. Recorded as an error.
    #[error("operation '{label}' failed: {message}")]
    Operation {
        /// Operation label.
        label: String,
        /// Error message.
        message: String,
    },
}

impl PerfError {
    /// Whether the error came from the operation itself rather than the layer.
    #[must_use]
    pub fn is_operation_failure(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::Operation { .. }
                | Self::LoadBalancer(
                    LoadBalancerError::OperationTimeout { .. } | LoadBalancerError::Operation { .. }
                )
        )
    }
}

/// Result type for manager operations.
pub type PerfResult<T> = Result<T, PerfError>;
