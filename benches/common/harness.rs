//! Benchmark harness utilities.
//!
//! Tokio runtimes for async benchmarks and component constructors with
//! settings suited to tight loops.

use adaptive_perf::modules::cache::{CacheConfig, TieredCache};
use adaptive_perf::modules::load_balancer::{LoadBalancer, LoadBalancerConfig, StrategyType};

use super::generators;

/// Create a multi-threaded Tokio runtime for async benchmarks.
pub fn bench_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build Tokio runtime for benchmarks")
}

/// Create a current-thread Tokio runtime (for single-threaded benchmarks).
pub fn bench_runtime_single() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build single-thread Tokio runtime")
}

/// Cache sized to hold `entries` keys across both levels without eviction.
pub fn roomy_cache(entries: usize) -> TieredCache {
    TieredCache::new(CacheConfig {
        l1_max_size: entries,
        l2_max_size: entries,
        max_memory_usage_mb: 512.0,
        ..CacheConfig::default()
    })
    .expect("valid cache config")
}

/// Cache with a small hot level so most traffic exercises promotion.
pub fn churning_cache() -> TieredCache {
    TieredCache::new(CacheConfig {
        l1_max_size: 64,
        l2_max_size: 4_096,
        ..CacheConfig::default()
    })
    .expect("valid cache config")
}

/// Load balancer over `count` generated instances.
pub fn balancer(strategy: StrategyType, count: usize) -> LoadBalancer {
    LoadBalancer::new(LoadBalancerConfig {
        strategy,
        max_connections: 1_000_000,
        instances: generators::instance_configs(count),
        ..LoadBalancerConfig::default()
    })
    .expect("valid load balancer config")
}

/// Standard benchmark sizes.
pub struct BenchSizes;

impl BenchSizes {
    /// Small working set.
    pub const SMALL: usize = 100;
    /// Medium working set.
    pub const MEDIUM: usize = 1_000;
    /// Large working set.
    pub const LARGE: usize = 10_000;
}
