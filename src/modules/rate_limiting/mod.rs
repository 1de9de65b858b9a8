//! # Rate Limiting Module
//!
//! Token-bucket rate limiting keyed by caller identity.
//!
//! ## Features
//!
//! - **Token Bucket Algorithm**: bursts up to `burst_size`, sustained rate of
//!   `requests_per_second` per key
//! - **Bounded Key Map**: buckets live in an LRU map capped at
//!   `max_tracked_keys`
//! - **Idle Expiry**: buckets unused for `idle_ttl` are reset and purged
//!
//! ## Usage
//!
//! ```
//! use adaptive_perf::modules::rate_limiting::{RateLimitConfig, RateLimiter};
//!
//! let limiter = RateLimiter::new(RateLimitConfig::new(10.0, 2)).unwrap();
//! assert!(limiter.check("tenant-a").allowed);
//! assert!(limiter.check("tenant-a").allowed);
//! assert!(!limiter.check("tenant-a").allowed);
//! ```

mod bucket;
mod config;
mod error;
mod limiter;

pub use bucket::TokenBucket;
pub use config::RateLimitConfig;
pub use error::{RateLimitError, RateLimitResult};
pub use limiter::{RateLimitDecision, RateLimiter, RateLimiterStats};
