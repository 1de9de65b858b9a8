//! Benchmark configuration.

use crate::config::{ValidationError, ValidationResult};
use serde::{Deserialize, Serialize};

/// Defaults for [`super::BenchmarkRunner`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    /// Relative slowdown of the mean that counts as a regression (0.2 = 20%).
    pub regression_threshold: f64,

    /// Measured iterations per benchmark.
    pub iterations: usize,

    /// Unmeasured iterations run first.
    pub warmup_iterations: usize,

    /// Coefficient of variation above which a result is reported as noisy.
    pub noisy_cv: f64,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            regression_threshold: 0.2,
            iterations: 1000,
            warmup_iterations: 100,
            noisy_cv: 0.5,
        }
    }
}

impl BenchmarkConfig {
    /// Override the iteration counts.
    #[must_use]
    pub fn with_iterations(mut self, iterations: usize, warmup_iterations: usize) -> Self {
        self.iterations = iterations;
        self.warmup_iterations = warmup_iterations;
        self
    }

    /// Override the regression threshold.
    #[must_use]
    pub fn with_regression_threshold(mut self, threshold: f64) -> Self {
        self.regression_threshold = threshold;
        self
    }

    /// Check ranges.
    #[must_use]
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        if !(self.regression_threshold > 0.0 && self.regression_threshold <= 10.0) {
            result.add_error(ValidationError::error(
                "benchmark.regression_threshold",
                "must be in (0, 10]",
            ));
        }
        if self.iterations == 0 {
            result.add_error(ValidationError::error(
                "benchmark.iterations",
                "must be at least 1",
            ));
        } else if self.iterations < 30 {
            result.add_error(ValidationError::warning(
                "benchmark.iterations",
                "fewer than 30 samples gives unstable percentiles",
            ));
        }
        if !(self.noisy_cv > 0.0 && self.noisy_cv.is_finite()) {
            result.add_error(ValidationError::error(
                "benchmark.noisy_cv",
                "must be a positive number",
            ));
        }

        result
    }
}
