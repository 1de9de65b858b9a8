//! # Benchmarking
//!
//! Offline measurement of the same paths the manager serves live.
//!
//! ## Features
//!
//! - **Runner**: warmup plus timed iterations, mean/stddev/percentiles and
//!   ops per second for sync and async operations
//! - **Baselines**: immutable named snapshots with regression and
//!   improvement detection, exportable as JSON
//! - **Reports**: regressions ranked worst first plus recommendations
//! - **Heap tracking**: [`TrackingAllocator`] measures net heap growth
//!
//! ## Example
//!
//! ```
//! use adaptive_perf::perf::{BenchmarkConfig, BenchmarkRunner};
//!
//! let runner = BenchmarkRunner::new(BenchmarkConfig::default().with_iterations(100, 10)).unwrap();
//! runner.run_benchmark("sum", || (0..100u64).sum::<u64>()).unwrap();
//! runner.create_baseline("v1").unwrap();
//! assert!(runner.compare_against_baseline("v1").is_empty());
//! ```

pub mod baseline;
pub mod benchmark;
pub mod config;
pub mod error;
pub mod memory;
pub mod report;

pub use baseline::{Baseline, BaselineComparison, Improvement, MeanDelta, Regression};
pub use benchmark::{BenchmarkOptions, BenchmarkResult, BenchmarkRunner, BenchmarkSuite};
pub use config::BenchmarkConfig;
pub use error::{BenchResult, BenchmarkError};
pub use memory::{HeapSnapshot, TrackingAllocator};
pub use report::BenchmarkReport;
