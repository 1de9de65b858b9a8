//! Adaptive Perf binary entry point.
//!
//! Usage: `adaptive-perf [config.toml]`
//!
//! Loads the configuration (defaults when no path is given), runs the
//! built-in primitive and cache benchmark suite and prints the report.
//! `RUST_LOG` controls log output (default `info`).

use adaptive_perf::modules::cache::TieredCache;
use adaptive_perf::perf::{BenchmarkSuite, TrackingAllocator};
use adaptive_perf::primitives::{sort, BloomFilter, LruMap, RingBuffer};
use adaptive_perf::{Component, ConfigLoader, PerfConfig, PerformanceManager};
use bytes::Bytes;
use std::hint::black_box;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: TrackingAllocator = TrackingAllocator;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config() -> Result<PerfConfig, Box<dyn std::error::Error>> {
    match std::env::args().nth(1) {
        Some(path) => {
            info!(path = %path, "Loading configuration");
            Ok(ConfigLoader::new().load(&path)?)
        },
        None => {
            info!("No configuration file given, using defaults");
            Ok(PerfConfig::default())
        },
    }
}

fn builtin_suite(cache: Arc<TieredCache>) -> BenchmarkSuite {
    let keys: Vec<String> = (0..1_000).map(|i| format!("key:{i}")).collect();
    for key in &keys {
        let _ = cache.set(key.clone(), Bytes::from(key.clone().into_bytes()));
    }

    let mut ring = RingBuffer::new(1_024);
    let mut lru = LruMap::new(1_024);
    let bloom = BloomFilter::new(10_000, 0.01);
    let mut counter = 0u64;
    let mut floats: Vec<f64> = (0..1_000).map(|i| ((i * 7_919) % 1_000) as f64).collect();

    let hit_cache = Arc::clone(&cache);
    let hit_keys = keys.clone();
    let mut hit_idx = 0usize;

    let set_cache = cache;
    let mut set_idx = 0u64;

    BenchmarkSuite::new("builtin")
        .with("ring_buffer_push", move || {
            counter += 1;
            black_box(ring.push(counter));
        })
        .with("lru_map_set", move || {
            counter += 1;
            black_box(lru.set(counter % 2_048, counter));
        })
        .with("bloom_add_test", move || {
            counter += 1;
            bloom.add(&counter);
            black_box(bloom.test(&counter));
        })
        .with("sort_1k_floats", move || {
            floats.reverse();
            let mut data = floats.clone();
            sort::sort_floats(&mut data);
            black_box(sort::percentile_sorted(&data, 95.0));
        })
        .with("cache_get_hit", move || {
            hit_idx = (hit_idx + 1) % hit_keys.len();
            black_box(hit_cache.get(&hit_keys[hit_idx]));
        })
        .with("cache_set", move || {
            set_idx += 1;
            let _ = black_box(set_cache.set(format!("bench:{}", set_idx % 4_096), "value"));
        })
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let manager = PerformanceManager::new(config)?;

    let mut suite = builtin_suite(Arc::clone(manager.cache()));
    manager.benchmark().run_suite(&mut suite)?;

    let report = manager.benchmark().generate_report();
    println!("{report}");

    manager.shutdown().await;
    print!("{}", manager.render_prometheus());
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        heap_tracking = TrackingAllocator::is_active(),
        "Adaptive Perf starting"
    );

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Benchmark run failed");
            ExitCode::FAILURE
        },
    }
}
