//! # Performance Monitor Module
//!
//! Sliding-window metrics with threshold alerts.
//!
//! ## Features
//!
//! - Response-time windows with p50/p95/p99 and probabilistic sampling
//! - Success/error outcome windows for throughput and error rate
//! - Memory and CPU usage samples
//! - Health score in `[0, 100]`
//! - Threshold alerts with per-kind cooldown, history and broadcast subscribers
//! - Versioned JSON export and import of the whole monitor state
//!
//! Errors are never sampled out; only response-time samples are.

pub mod alert;
pub mod config;
pub mod error;
#[allow(clippy::module_inception)]
pub mod monitor;
pub mod snapshot;
pub mod window;

pub use alert::{Alert, AlertKind, AlertSeverity};
pub use config::{AlertThresholds, MonitorConfig};
pub use error::{MonitorError, MonitorResult};
pub use monitor::{
    health_score, ErrorMetrics, HealthMetrics, PerformanceMetrics, PerformanceMonitor,
    ResourceMetrics, ResponseTimeMetrics, ThroughputMetrics,
};
pub use snapshot::{CounterSnapshot, MonitorSnapshot, SNAPSHOT_VERSION};
pub use window::{MetricWindow, Sample};
