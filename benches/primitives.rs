#![allow(clippy::all)]
//! Benchmarks for the memory-efficient primitives.
//!
//! Tests: ring buffer push, LRU map churn, bloom filter add/test, priority
//! queue, introsort against std, the three search algorithms.

mod common;
use adaptive_perf::primitives::{
    search, sort, BloomFilter, BoyerMoore, LruMap, PriorityQueue, RingBuffer,
};
use common::generators;
use common::harness::BenchSizes;
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use std::hint::black_box;

// ---------------------------------------------------------------------------
// Containers
// ---------------------------------------------------------------------------

fn bench_ring_buffer(c: &mut Criterion) {
    let mut group = c.benchmark_group("primitives/ring_buffer");

    for capacity in [BenchSizes::SMALL, BenchSizes::LARGE] {
        group.bench_with_input(
            BenchmarkId::new("push_full", capacity),
            &capacity,
            |b, &capacity| {
                let mut ring = RingBuffer::new(capacity);
                for i in 0..capacity as u64 {
                    ring.push(i);
                }
                let mut next = 0u64;
                b.iter(|| {
                    next += 1;
                    black_box(ring.push(next));
                });
            },
        );
    }

    group.bench_function("push_shift", |b| {
        let mut ring = RingBuffer::new(BenchSizes::MEDIUM);
        b.iter(|| {
            ring.push(black_box(7u64));
            black_box(ring.shift());
        });
    });

    group.finish();
}

fn bench_lru_map(c: &mut Criterion) {
    let mut group = c.benchmark_group("primitives/lru_map");

    for capacity in [BenchSizes::SMALL, BenchSizes::MEDIUM, BenchSizes::LARGE] {
        let keys = generators::keys("k", capacity * 2);
        let indices = generators::skewed_indices(keys.len(), BenchSizes::LARGE);

        group.bench_with_input(
            BenchmarkId::new("set_evicting", capacity),
            &capacity,
            |b, &capacity| {
                let mut map = LruMap::new(capacity);
                let mut i = 0usize;
                b.iter(|| {
                    i = (i + 1) % keys.len();
                    black_box(map.set(keys[i].clone(), i));
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("get_skewed", capacity),
            &capacity,
            |b, &capacity| {
                let mut map = LruMap::new(capacity);
                for (i, key) in keys.iter().enumerate().take(capacity) {
                    map.set(key.clone(), i);
                }
                let mut i = 0usize;
                b.iter(|| {
                    i = (i + 1) % indices.len();
                    black_box(map.get(keys[indices[i]].as_str()));
                });
            },
        );
    }

    group.finish();
}

fn bench_bloom_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("primitives/bloom_filter");

    for fp_rate in [0.1, 0.01, 0.001] {
        let filter = BloomFilter::new(BenchSizes::LARGE, fp_rate);
        let keys = generators::keys("member", BenchSizes::LARGE);
        for key in &keys {
            filter.add(key.as_str());
        }
        let probes = generators::keys("probe", BenchSizes::LARGE);

        group.bench_with_input(BenchmarkId::new("add", fp_rate), &fp_rate, |b, _| {
            let mut i = 0usize;
            b.iter(|| {
                i = (i + 1) % keys.len();
                filter.add(keys[i].as_str());
            });
        });

        group.bench_with_input(BenchmarkId::new("test_miss", fp_rate), &fp_rate, |b, _| {
            let mut i = 0usize;
            b.iter(|| {
                i = (i + 1) % probes.len();
                black_box(filter.test(probes[i].as_str()));
            });
        });
    }

    group.finish();
}

fn bench_priority_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("primitives/priority_queue");

    for size in [BenchSizes::SMALL, BenchSizes::LARGE] {
        let priorities = generators::random_u64s(size);
        group.bench_with_input(BenchmarkId::new("drain", size), &size, |b, _| {
            b.iter_batched(
                || {
                    let mut queue = PriorityQueue::new_min();
                    for (i, p) in priorities.iter().enumerate() {
                        queue.enqueue(i, *p);
                    }
                    queue
                },
                |mut queue| {
                    while let Some(item) = queue.dequeue() {
                        black_box(item);
                    }
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Algorithms
// ---------------------------------------------------------------------------

fn bench_sort(c: &mut Criterion) {
    let mut group = c.benchmark_group("primitives/sort");

    for size in [BenchSizes::MEDIUM, BenchSizes::LARGE] {
        let data = generators::random_u64s(size);
        let latencies = generators::latencies_ms(size);

        group.bench_with_input(BenchmarkId::new("introsort", size), &size, |b, _| {
            b.iter_batched(
                || data.clone(),
                |mut d| sort::sort(&mut d),
                BatchSize::SmallInput,
            );
        });

        group.bench_with_input(BenchmarkId::new("std_unstable", size), &size, |b, _| {
            b.iter_batched(
                || data.clone(),
                |mut d| d.sort_unstable(),
                BatchSize::SmallInput,
            );
        });

        group.bench_with_input(BenchmarkId::new("p99_latency", size), &size, |b, _| {
            b.iter(|| black_box(sort::percentile(&latencies, 99.0)));
        });
    }

    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("primitives/search");

    let mut sorted = generators::random_u64s(BenchSizes::LARGE);
    sorted.sort_unstable();
    let targets: Vec<u64> = sorted.iter().step_by(97).copied().collect();

    group.bench_function("binary", |b| {
        let mut i = 0usize;
        b.iter(|| {
            i = (i + 1) % targets.len();
            black_box(search::binary_search(&sorted, &targets[i]));
        });
    });

    group.bench_function("interpolation", |b| {
        let mut i = 0usize;
        b.iter(|| {
            i = (i + 1) % targets.len();
            black_box(search::interpolation_search(&sorted, targets[i]));
        });
    });

    let needle = "circuit-breaker-tripped";
    let text = generators::haystack(64 * 1024, needle);
    let matcher = BoyerMoore::new(needle);

    group.bench_function("boyer_moore_64k", |b| {
        b.iter(|| black_box(matcher.find(text.as_bytes())));
    });

    group.bench_function("str_find_64k", |b| {
        b.iter(|| black_box(text.find(needle)));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_ring_buffer,
    bench_lru_map,
    bench_bloom_filter,
    bench_priority_queue,
    bench_sort,
    bench_search,
);
criterion_main!(benches);
