//! Benchmark error types.

use crate::config::ConfigError;
use thiserror::Error;

/// Errors from the benchmark runner.
#[derive(Debug, Error)]
pub enum BenchmarkError {
    /// Baselines are immutable once created.
    #[error("baseline '{0}' already exists")]
    BaselineExists(String),

    /// A baseline needs at least one recorded result.
    #[error("no benchmark results recorded")]
    NoResults,

    /// A benchmark must measure at least one iteration.
    #[error("benchmark '{0}' has no iterations")]
    EmptyBenchmark(String),

    /// Baselines could not be encoded or decoded.
    #[error("baseline serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for benchmark operations.
pub type BenchResult<T> = Result<T, BenchmarkError>;
