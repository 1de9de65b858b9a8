#![allow(clippy::all)]
//! Benchmarks for the load balancer.
//!
//! Tests: selection per strategy, routed execution, circuit breaker
//! admission, concurrent routed requests, instance snapshots.

mod common;
use adaptive_perf::modules::load_balancer::{
    CircuitBreaker, CircuitBreakerConfig, StrategyType,
};
use common::harness;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use std::io;
use std::sync::Arc;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Strategy selection
// ---------------------------------------------------------------------------

fn bench_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("load_balancer/select");

    for strategy in [
        StrategyType::RoundRobin,
        StrategyType::LeastConnections,
        StrategyType::Weighted,
    ] {
        for count in [3, 10, 50, 200] {
            let lb = harness::balancer(strategy, count);
            group.bench_with_input(
                BenchmarkId::new(strategy.as_str(), count),
                &count,
                |b, _| {
                    b.iter(|| {
                        let guard = lb.select().unwrap();
                        black_box(guard.instance().id().len());
                    });
                },
            );
        }
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Routed execution
// ---------------------------------------------------------------------------

fn bench_execute_request(c: &mut Criterion) {
    let mut group = c.benchmark_group("load_balancer/execute_request");
    let rt = harness::bench_runtime();

    for count in [3, 50] {
        let lb = harness::balancer(StrategyType::RoundRobin, count);
        group.bench_with_input(BenchmarkId::new("ok", count), &count, |b, _| {
            b.to_async(&rt).iter(|| async {
                black_box(
                    lb.execute_request(|inst| async move { Ok::<_, io::Error>(inst.weight()) })
                        .await
                        .unwrap(),
                );
            });
        });
    }

    let lb = Arc::new(harness::balancer(StrategyType::LeastConnections, 8));
    for tasks in [4usize, 32] {
        group.bench_with_input(BenchmarkId::new("concurrent", tasks), &tasks, |b, &tasks| {
            b.to_async(&rt).iter(|| {
                let lb = Arc::clone(&lb);
                async move {
                    let handles: Vec<_> = (0..tasks)
                        .map(|_| {
                            let lb = Arc::clone(&lb);
                            tokio::spawn(async move {
                                lb.execute_request(|_| async {
                                    tokio::task::yield_now().await;
                                    Ok::<_, io::Error>(())
                                })
                                .await
                            })
                        })
                        .collect();
                    for handle in handles {
                        handle.await.unwrap().unwrap();
                    }
                }
            });
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Circuit breaker and snapshots
// ---------------------------------------------------------------------------

fn bench_circuit_breaker(c: &mut Criterion) {
    let mut group = c.benchmark_group("load_balancer/circuit_breaker");

    let breaker = CircuitBreaker::new(
        "node-0",
        CircuitBreakerConfig {
            threshold: 5,
            open_timeout: Duration::from_secs(30),
            failure_window: Duration::from_secs(60),
        },
    );

    group.bench_function("acquire_success_closed", |b| {
        b.iter(|| {
            let admission = breaker.try_acquire().unwrap();
            breaker.record_success(admission);
        });
    });

    group.bench_function("is_available", |b| {
        b.iter(|| black_box(breaker.is_available()));
    });

    group.finish();
}

fn bench_snapshots(c: &mut Criterion) {
    let mut group = c.benchmark_group("load_balancer/snapshots");

    for count in [10, 200] {
        let lb = harness::balancer(StrategyType::Weighted, count);
        group.bench_with_input(BenchmarkId::new("get_instances", count), &count, |b, _| {
            b.iter(|| black_box(lb.get_instances()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_select,
    bench_execute_request,
    bench_circuit_breaker,
    bench_snapshots,
);
criterion_main!(benches);
