//! # Tiered Cache Module
//!
//! Two-level in-process cache with TTLs, memory budgets and optional
//! compression of warm entries.
//!
//! ## Levels
//!
//! - **Hot (L1)**: small, uncompressed, default TTL `l1_ttl`
//! - **Warm (L2)**: larger, compressed by `optimize()`, default TTL `l2_ttl`
//!
//! Memory pressure on hot demotes its least-recently-used entries to warm;
//! pressure on warm evicts. The two budgets together never exceed
//! `max_memory_usage_mb`.

pub mod compression;
pub mod config;
pub mod entry;
pub mod error;
pub mod stats;
pub mod tiered;

pub use config::CacheConfig;
pub use entry::{CacheLevel, EntryInfo, SetOptions};
pub use error::{CacheError, CacheResult};
pub use stats::{CacheStats, LevelStats};
pub use tiered::{OptimizeResult, TieredCache};
