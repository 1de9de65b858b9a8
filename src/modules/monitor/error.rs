//! Monitor error types.

use crate::config::ConfigError;
use thiserror::Error;

/// Errors that can occur in the performance monitor.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Snapshot could not be encoded or decoded.
    #[error("snapshot serialization failed: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// Snapshot was written by an incompatible version.
    #[error("unsupported snapshot version {found} (supported: {supported})")]
    UnsupportedVersion {
        /// Version found in the snapshot.
        found: u32,
        /// Version this build reads.
        supported: u32,
    },

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for monitor operations.
pub type MonitorResult<T> = Result<T, MonitorError>;
