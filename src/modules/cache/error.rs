//! Cache error types.

use crate::config::ConfigError;
use thiserror::Error;

/// Errors that can occur in the cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Invalidation pattern is not a valid regular expression.
    #[error("invalid invalidation pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Entry is larger than the warm level's whole memory budget.
    #[error("entry '{key}' is {size} bytes, larger than the {limit} byte level budget")]
    EntryTooLarge {
        /// Entry key.
        key: String,
        /// Entry size in bytes.
        size: usize,
        /// Budget it was checked against.
        limit: usize,
    },

    /// A compressed entry could not be restored.
    #[error("failed to decompress entry '{key}': {message}")]
    Decompression {
        /// Entry key.
        key: String,
        /// Codec error message.
        message: String,
    },

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
