#![allow(clippy::all)]
//! Benchmarks for the tiered cache.
//!
//! Tests: hot hits, warm hits with promotion, filtered misses, writes under
//! eviction pressure, batch operations, optimize passes with compression.

mod common;
use adaptive_perf::modules::cache::{CacheConfig, CacheLevel, SetOptions, TieredCache};
use common::generators;
use common::harness::{self, BenchSizes};
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache/get");

    for size in [BenchSizes::SMALL, BenchSizes::MEDIUM, BenchSizes::LARGE] {
        let cache = harness::roomy_cache(size);
        let keys = generators::keys("user", size);
        for key in &keys {
            cache.set(key.clone(), generators::random_bytes(128)).unwrap();
        }

        group.bench_with_input(BenchmarkId::new("hot_hit", size), &size, |b, _| {
            let mut i = 0usize;
            b.iter(|| {
                i = (i + 1) % keys.len();
                black_box(cache.get(&keys[i]));
            });
        });
    }

    let cache = harness::roomy_cache(BenchSizes::LARGE);
    let absent = generators::keys("absent", BenchSizes::LARGE);
    group.bench_function("filtered_miss", |b| {
        let mut i = 0usize;
        b.iter(|| {
            i = (i + 1) % absent.len();
            black_box(cache.get(&absent[i]));
        });
    });

    let churn = harness::churning_cache();
    let keys = generators::keys("item", 2_048);
    for key in &keys {
        churn
            .set_with(key.clone(), "payload", SetOptions::default().at_level(CacheLevel::Warm))
            .unwrap();
    }
    let indices = generators::skewed_indices(keys.len(), BenchSizes::LARGE);
    group.bench_function("skewed_with_promotion", |b| {
        let mut i = 0usize;
        b.iter(|| {
            i = (i + 1) % indices.len();
            black_box(churn.get(&keys[indices[i]]));
        });
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

fn bench_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache/set");

    for value_size in [64usize, 1024, 16 * 1024] {
        let value = generators::random_bytes(value_size);
        group.throughput(Throughput::Bytes(value_size as u64));
        group.bench_with_input(
            BenchmarkId::new("overwrite", value_size),
            &value_size,
            |b, _| {
                let cache = harness::roomy_cache(BenchSizes::MEDIUM);
                let keys = generators::keys("k", BenchSizes::MEDIUM);
                let mut i = 0usize;
                b.iter(|| {
                    i = (i + 1) % keys.len();
                    cache.set(keys[i].clone(), value.clone()).unwrap();
                });
            },
        );
    }

    group.throughput(Throughput::Elements(1));
    group.bench_function("evicting", |b| {
        let cache = harness::churning_cache();
        let mut i = 0u64;
        b.iter(|| {
            i += 1;
            cache.set(format!("stream:{i}"), "event").unwrap();
        });
    });

    let entries: Vec<(String, bytes::Bytes)> = generators::keys("batch", BenchSizes::SMALL)
        .into_iter()
        .map(|k| (k, generators::random_bytes(256)))
        .collect();
    let batch_keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
    group.throughput(Throughput::Elements(entries.len() as u64));
    group.bench_function("set_batch_100", |b| {
        let cache = harness::roomy_cache(BenchSizes::MEDIUM);
        b.iter(|| black_box(cache.set_batch(entries.iter().cloned()).unwrap()));
    });
    group.bench_function("get_batch_100", |b| {
        let cache = harness::roomy_cache(BenchSizes::MEDIUM);
        cache.set_batch(entries.iter().cloned()).unwrap();
        b.iter(|| black_box(cache.get_batch(&batch_keys)));
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Maintenance
// ---------------------------------------------------------------------------

fn bench_optimize(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache/optimize");

    for entries in [BenchSizes::SMALL, BenchSizes::MEDIUM] {
        group.bench_with_input(
            BenchmarkId::new("compress_warm", entries),
            &entries,
            |b, &entries| {
                b.iter_batched(
                    || {
                        let cache = TieredCache::new(CacheConfig {
                            l2_max_size: entries,
                            max_memory_usage_mb: 256.0,
                            ..CacheConfig::default()
                        })
                        .unwrap();
                        for key in generators::keys("doc", entries) {
                            cache
                                .set_with(
                                    key,
                                    generators::compressible_bytes(4096),
                                    SetOptions::default().at_level(CacheLevel::Warm),
                                )
                                .unwrap();
                        }
                        cache
                    },
                    |cache| black_box(cache.optimize()),
                    BatchSize::LargeInput,
                );
            },
        );
    }

    group.bench_function("idle_pass", |b| {
        let cache = harness::roomy_cache(BenchSizes::MEDIUM);
        for key in generators::keys("k", BenchSizes::MEDIUM) {
            cache.set(key, "v").unwrap();
        }
        cache.optimize();
        b.iter(|| black_box(cache.optimize()));
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Contention
// ---------------------------------------------------------------------------

fn bench_concurrent_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache/concurrent");
    let rt = harness::bench_runtime();

    let cache = Arc::new(harness::roomy_cache(BenchSizes::MEDIUM));
    let keys = Arc::new(generators::keys("shared", BenchSizes::MEDIUM));
    for key in keys.iter() {
        cache.set(key.clone(), "v").unwrap();
    }

    for tasks in [2usize, 8] {
        group.bench_with_input(BenchmarkId::new("get", tasks), &tasks, |b, &tasks| {
            b.to_async(&rt).iter(|| {
                let cache = Arc::clone(&cache);
                let keys = Arc::clone(&keys);
                async move {
                    let handles: Vec<_> = (0..tasks)
                        .map(|t| {
                            let cache = Arc::clone(&cache);
                            let keys = Arc::clone(&keys);
                            tokio::spawn(async move {
                                for i in (t..keys.len()).step_by(tasks) {
                                    black_box(cache.get(&keys[i]));
                                }
                            })
                        })
                        .collect();
                    for handle in handles {
                        handle.await.unwrap();
                    }
                }
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_get,
    bench_set,
    bench_optimize,
    bench_concurrent_reads,
);
criterion_main!(benches);
