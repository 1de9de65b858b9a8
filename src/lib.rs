//! # Adaptive Perf
//!
//! In-process performance toolkit: a tiered cache, a load balancer with
//! circuit breakers, a sliding-window performance monitor and a benchmark
//! runner with regression detection, composed by [`PerformanceManager`].
//!
//! ## Features
//!
//! - Hot/warm cache with LRU eviction, promotion, TTLs and LZ4 compression
//! - Round-robin, least-connections and weighted instance selection
//! - Per-instance circuit breakers and optional active health checks
//! - p50/p95/p99 latency, throughput, error rate and health score
//! - Threshold alerts with cooldown and subscribers
//! - Benchmarks, baselines and regression reports
//! - Keyed rate limiting
//! - Prometheus text rendering for every component
//!
//! ## Architecture
//!
//! Each long-lived component implements [`component::Component`] for status
//! and metrics. Configuration is one TOML document, see [`config`].

pub mod component;
pub mod config;
pub mod manager;
pub mod modules;
pub mod perf;
pub mod primitives;

pub use component::{Component, ComponentStatus, MetricsPayload};
pub use config::{ConfigLoader, PerfConfig};
pub use manager::{PerfError, PerfResult, PerformanceManager};
pub use modules::cache::TieredCache;
pub use modules::load_balancer::LoadBalancer;
pub use modules::monitor::PerformanceMonitor;
pub use modules::rate_limiting::RateLimiter;
pub use perf::BenchmarkRunner;
