//! Error types for rate limiting.

use crate::config::ConfigError;
use std::time::Duration;
use thiserror::Error;

/// Result type for rate limiting operations.
pub type RateLimitResult<T> = Result<T, RateLimitError>;

/// Errors that can occur during rate limiting.
#[derive(Debug, Error)]
pub enum RateLimitError {
    /// The caller has no tokens left.
    #[error("rate limit exceeded for '{key}', retry after {retry_after:?}")]
    Exceeded {
        /// Caller key.
        key: String,
        /// Time until a token is available.
        retry_after: Duration,
    },

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl RateLimitError {
    /// Whether retrying later can succeed.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Exceeded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RateLimitError::Exceeded {
            key: "tenant-a".to_string(),
            retry_after: Duration::from_millis(250),
        };
        assert_eq!(
            err.to_string(),
            "rate limit exceeded for 'tenant-a', retry after 250ms"
        );
        assert!(err.is_recoverable());
    }
}
