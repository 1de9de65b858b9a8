//! # Performance Manager
//!
//! Wires the cache, load balancer, monitor, rate limiter and benchmark runner
//! together behind one handle.
//!
//! ## Features
//!
//! - Cache-first execution with memoization and monitoring
//! - Load-balanced execution through circuit breakers
//! - Per-caller rate limiting
//! - Background maintenance loop: memory sampling, cache optimize,
//!   idle bucket purge and alert sweep
//! - Aggregated stats and Prometheus rendering across components
//!
//! ## Example
//!
//! ```
//! use adaptive_perf::config::PerfConfig;
//! use adaptive_perf::manager::PerformanceManager;
//! use bytes::Bytes;
//!
//! let rt = tokio::runtime::Runtime::new().unwrap();
//! rt.block_on(async {
//!     let manager = PerformanceManager::new(PerfConfig::default()).unwrap();
//!     let value = manager
//!         .execute_with_monitoring("greeting", || async {
//!             Ok::<_, std::io::Error>(Bytes::from_static(b"hello"))
//!         })
//!         .await
//!         .unwrap();
//!     assert_eq!(value, "hello");
//! });
//! ```

pub mod config;
pub mod error;
#[allow(clippy::module_inception)]
pub mod manager;

pub use config::ManagerConfig;
pub use error::{PerfError, PerfResult};
pub use manager::{ManagerStats, OptimizationReport, PerformanceManager, RateLimitSummary};
