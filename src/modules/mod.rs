//! # Runtime Components
//!
//! - [`cache`] - Two-level in-process cache with compression and a bloom pre-filter
//! - [`load_balancer`] - Instance selection with circuit breakers and health checks
//! - [`monitor`] - Sliding-window metrics and threshold alerts
//! - [`rate_limiting`] - Keyed token-bucket rate limiting

pub mod cache;
pub mod load_balancer;
pub mod monitor;
pub mod rate_limiting;
