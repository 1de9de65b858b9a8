//! Load balancer error types.

use crate::config::ConfigError;
use std::time::Duration;
use thiserror::Error;

/// Boxed error returned by a routed operation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur in the load balancer.
#[derive(Debug, Error)]
pub enum LoadBalancerError {
    /// No instance is eligible: every circuit is open or every instance is at capacity.
    #[error("no healthy instance available ({registered} registered)")]
    NoHealthyInstance {
        /// Number of registered instances.
        registered: usize,
    },

    /// The instance's circuit is open.
    #[error("circuit open for instance '{0}'")]
    CircuitOpen(String),

    /// The instance is at its connection cap.
    #[error("instance '{0}' is at its connection limit")]
    AtCapacity(String),

    /// Instance not found.
    #[error("instance '{0}' not found")]
    InstanceNotFound(String),

    /// Instance already registered.
    #[error("instance '{0}' already exists")]
    InstanceAlreadyExists(String),

    /// The operation exceeded its timeout. Recorded as a failure.
    #[error("operation on instance '{instance}' timed out after {timeout:?}")]
    OperationTimeout {
        /// Instance the operation ran on.
        instance: String,
        /// Timeout that expired.
        timeout: Duration,
    },

    /// The operation itself failed. Recorded as a failure.
    #[error("operation on instance '{instance}' failed: {source}")]
    Operation {
        /// Instance the operation ran on.
        instance: String,
        /// Underlying error.
        #[source]
        source: BoxError,
    },

    /// The balancer is shutting down.
    #[error("load balancer is shutting down")]
    ShuttingDown,

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl LoadBalancerError {
    /// Whether this error was raised by the routed operation rather than by routing.
    #[must_use]
    pub fn is_operation_failure(&self) -> bool {
        matches!(self, Self::Operation { .. } | Self::OperationTimeout { .. })
    }
}

/// Result type for load balancer operations.
pub type LoadBalancerResult<T> = Result<T, LoadBalancerError>;
