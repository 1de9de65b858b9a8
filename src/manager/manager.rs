//! Composition root.

use super::error::{PerfError, PerfResult};
use crate::component::{Component, ComponentStatus, MetricsPayload};
use crate::config::{ConsistencyValidator, PerfConfig, Validator};
use crate::modules::cache::{CacheStats, OptimizeResult, TieredCache};
use crate::modules::load_balancer::{BoxError, Instance, InstanceSnapshot, LoadBalancer};
use crate::modules::monitor::{Alert, PerformanceMetrics, PerformanceMonitor};
use crate::modules::rate_limiting::{RateLimitDecision, RateLimiter};
use crate::perf::BenchmarkRunner;
use bytes::Bytes;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

const MIB: f64 = 1024.0 * 1024.0;

/// Outcome of one [`PerformanceManager::optimize`] pass.
#[derive(Debug, Clone, Serialize)]
pub struct OptimizationReport {
    /// Cache maintenance.
    pub cache: OptimizeResult,
    /// Idle rate limit buckets removed.
    pub rate_limit_buckets_purged: usize,
    /// Alerts fired by the threshold sweep.
    pub alerts_fired: usize,
    /// Time spent.
    pub duration: Duration,
}

/// Rate limiter summary in [`ManagerStats`].
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitSummary {
    /// Keys with a live bucket.
    pub tracked_keys: usize,
    /// Checks allowed.
    pub allowed: u64,
    /// Checks denied.
    pub denied: u64,
}

/// Snapshot returned by [`PerformanceManager::get_stats`].
#[derive(Debug, Clone, Serialize)]
pub struct ManagerStats {
    /// Overall status.
    pub status: ComponentStatus,
    /// Cache statistics.
    pub cache: CacheStats,
    /// Registered instances.
    pub instances: Vec<InstanceSnapshot>,
    /// Monitor metrics.
    pub metrics: PerformanceMetrics,
    /// Alerts still in their cooldown window.
    pub active_alerts: Vec<Alert>,
    /// Rate limiter counters.
    pub rate_limit: RateLimitSummary,
    /// Completed optimize passes.
    pub optimize_runs: u64,
    /// Time since construction.
    pub uptime: Duration,
}

/// Shared handles used by both the manager and its maintenance loop.
#[derive(Debug, Clone)]
struct Components {
    cache: Arc<TieredCache>,
    load_balancer: Arc<LoadBalancer>,
    monitor: Arc<PerformanceMonitor>,
    rate_limiter: Arc<RateLimiter>,
    optimize_runs: Arc<AtomicU64>,
}

impl Components {
    fn sample_resources(&self) {
        let memory_mb = self.cache.memory_usage_bytes() as f64 / MIB;
        self.monitor.record_memory_usage(memory_mb);
    }

    fn optimize(&self) -> OptimizationReport {
        let started = Instant::now();
        let cache = self.cache.optimize();
        let purged = self.rate_limiter.purge_idle();
        self.sample_resources();
        let alerts = self.monitor.check_alerts();
        self.optimize_runs.fetch_add(1, Ordering::Relaxed);

        let report = OptimizationReport {
            cache,
            rate_limit_buckets_purged: purged,
            alerts_fired: alerts.len(),
            duration: started.elapsed(),
        };
        debug!(
            freed_bytes = report.cache.memory_freed,
            entries_optimized = report.cache.entries_optimized,
            buckets_purged = purged,
            alerts = report.alerts_fired,
            "Optimize pass complete"
        );
        report
    }
}

async fn maintenance_loop(
    components: Components,
    sample_interval: Duration,
    optimize_interval: Duration,
    mut shutdown: mpsc::Receiver<()>,
) {
    let mut sample = tokio::time::interval_at(
        tokio::time::Instant::now() + sample_interval,
        sample_interval,
    );
    let mut optimize = tokio::time::interval_at(
        tokio::time::Instant::now() + optimize_interval,
        optimize_interval,
    );
    sample.set_missed_tick_behavior(MissedTickBehavior::Skip);
    optimize.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                debug!("Maintenance loop shutting down");
                break;
            }
            _ = sample.tick() => components.sample_resources(),
            _ = optimize.tick() => {
                components.optimize();
            }
        }
    }
}

/// Counts a monitored operation as in flight until dropped.
struct InFlight<'a> {
    manager: &'a PerformanceManager,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.manager.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.manager.drained.notify_waiters();
        }
    }
}

/// Owns every component and routes monitored work through them.
///
/// Lookups go cache first; misses run the operation (optionally on a
/// load-balanced instance), time it into the monitor and memoize the result.
#[derive(Debug)]
pub struct PerformanceManager {
    config: PerfConfig,
    components: Components,
    benchmark: BenchmarkRunner,
    maintenance: Mutex<Option<(mpsc::Sender<()>, JoinHandle<()>)>>,
    started_at: Instant,
    shut_down: AtomicBool,
    in_flight: AtomicUsize,
    drained: Notify,
}

impl PerformanceManager {
    /// Build every component from `config`.
    ///
    /// # Errors
    ///
    /// Returns the first component's configuration error.
    pub fn new(config: PerfConfig) -> PerfResult<Self> {
        ConsistencyValidator::new().validate(&config).into_result()?;

        let cache = Arc::new(TieredCache::new(config.cache.clone())?);
        let load_balancer = Arc::new(LoadBalancer::new(config.load_balancer.clone())?);
        let monitor = Arc::new(PerformanceMonitor::new(config.monitor.clone())?);
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone())?);
        let benchmark =
            BenchmarkRunner::new(config.benchmark.clone())?.with_monitor(Arc::clone(&monitor));

        info!(
            strategy = load_balancer.strategy_name(),
            instances = load_balancer.instance_count(),
            "Performance manager created"
        );

        Ok(Self {
            components: Components {
                cache,
                load_balancer,
                monitor,
                rate_limiter,
                optimize_runs: Arc::new(AtomicU64::new(0)),
            },
            benchmark,
            config,
            maintenance: Mutex::new(None),
            started_at: Instant::now(),
            shut_down: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            drained: Notify::new(),
        })
    }

    /// Configuration.
    #[must_use]
    pub fn config(&self) -> &PerfConfig {
        &self.config
    }

    /// Tiered cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<TieredCache> {
        &self.components.cache
    }

    /// Load balancer.
    #[must_use]
    pub fn load_balancer(&self) -> &Arc<LoadBalancer> {
        &self.components.load_balancer
    }

    /// Performance monitor.
    #[must_use]
    pub fn monitor(&self) -> &Arc<PerformanceMonitor> {
        &self.components.monitor
    }

    /// Keyed rate limiter.
    #[must_use]
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.components.rate_limiter
    }

    /// Benchmark runner, reporting live metrics from this manager's monitor.
    #[must_use]
    pub fn benchmark(&self) -> &BenchmarkRunner {
        &self.benchmark
    }

    /// Run `op` locally, memoizing its result under `label`.
    ///
    /// A cached value is returned without running `op`. Both paths are
    /// timed and recorded in the monitor.
    ///
    /// # Errors
    ///
    /// [`PerfError::Operation`] or [`PerfError::Timeout`]; both are recorded
    /// in the monitor before being returned. [`PerfError::ShuttingDown`]
    /// once shutdown has begun.
    pub async fn execute_with_monitoring<F, Fut, E>(&self, label: &str, op: F) -> PerfResult<Bytes>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Bytes, E>>,
        E: Display,
    {
        let _flight = self.enter()?;
        if let Some(hit) = self.memoized(label) {
            return Ok(hit);
        }
        let value = self.run_monitored(label, op).await?;
        self.memoize(label, &value);
        Ok(value)
    }

    /// Like [`PerformanceManager::execute_with_monitoring`], but on a miss
    /// `op` runs on an instance chosen by the load balancer.
    ///
    /// # Errors
    ///
    /// [`PerfError::LoadBalancer`] for selection, timeout and operation
    /// failures, recorded in the monitor. [`PerfError::ShuttingDown`] once
    /// shutdown has begun.
    pub async fn execute_routed<F, Fut, E>(&self, label: &str, op: F) -> PerfResult<Bytes>
    where
        F: FnOnce(Arc<Instance>) -> Fut,
        Fut: Future<Output = Result<Bytes, E>>,
        E: Into<BoxError>,
    {
        let _flight = self.enter()?;
        if let Some(hit) = self.memoized(label) {
            return Ok(hit);
        }
        let load_balancer = &self.components.load_balancer;
        let value = self
            .timed(label, async {
                load_balancer
                    .execute_request(op)
                    .await
                    .map_err(PerfError::from)
            })
            .await?;
        self.memoize(label, &value);
        Ok(value)
    }

    /// Run `op` locally, timed and recorded in the monitor, without caching.
    ///
    /// # Errors
    ///
    /// [`PerfError::Operation`] when `op` fails, [`PerfError::Timeout`]
    /// when `manager.operation_timeout` expires and
    /// [`PerfError::ShuttingDown`] once shutdown has begun.
    pub async fn execute_monitored<T, F, Fut, E>(&self, label: &str, op: F) -> PerfResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let _flight = self.enter()?;
        self.run_monitored(label, op).await
    }

    /// Operations currently running through the manager.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    async fn run_monitored<T, F, Fut, E>(&self, label: &str, op: F) -> PerfResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let timeout = self.config.manager.operation_timeout;
        self.timed(label, async move {
            let outcome = match timeout {
                Some(timeout) => tokio::time::timeout(timeout, op()).await.map_err(|_| {
                    PerfError::Timeout {
                        label: label.to_string(),
                        timeout,
                    }
                })?,
                None => op().await,
            };
            outcome.map_err(|e| PerfError::Operation {
                label: label.to_string(),
                message: e.to_string(),
            })
        })
        .await
    }

    /// Take one rate limit token for `caller`.
    pub fn check_rate_limit(&self, caller: &str) -> RateLimitDecision {
        self.components.rate_limiter.check(caller)
    }

    /// Run a maintenance pass: cache optimize, idle bucket purge, memory
    /// sample and alert sweep.
    pub fn optimize(&self) -> OptimizationReport {
        self.components.optimize()
    }

    /// Snapshot of every component.
    #[must_use]
    pub fn get_stats(&self) -> ManagerStats {
        let limiter = self.components.rate_limiter.stats();
        ManagerStats {
            status: self.status(),
            cache: self.components.cache.get_stats(),
            instances: self.components.load_balancer.get_instances(),
            metrics: self.components.monitor.get_metrics(),
            active_alerts: self.components.monitor.get_active_alerts(),
            rate_limit: RateLimitSummary {
                tracked_keys: self.components.rate_limiter.tracked_keys(),
                allowed: limiter.allowed.load(Ordering::Relaxed),
                denied: limiter.denied.load(Ordering::Relaxed),
            },
            optimize_runs: self.components.optimize_runs.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
        }
    }

    /// Spawn the maintenance loop.
    ///
    /// Returns `false` if it is already running or the manager was shut down.
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> bool {
        if self.shut_down.load(Ordering::Acquire) {
            return false;
        }
        let mut slot = self.maintenance.lock();
        if slot.is_some() {
            return false;
        }

        let sample_interval = self.config.monitor.sample_interval;
        let optimize_interval = self.config.manager.optimize_interval;
        let (tx, rx) = mpsc::channel(1);
        let handle = tokio::spawn(maintenance_loop(
            self.components.clone(),
            sample_interval,
            optimize_interval,
            rx,
        ));
        *slot = Some((tx, handle));

        info!(
            sample_interval_ms = sample_interval.as_millis() as u64,
            optimize_interval_ms = optimize_interval.as_millis() as u64,
            "Performance manager started"
        );
        true
    }

    /// Whether the maintenance loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.maintenance.lock().is_some()
    }

    /// Refuse new operations, stop the maintenance loop, wait for in-flight
    /// operations, drain the load balancer and run a final optimize pass.
    /// Returns `None` if already shut down.
    pub async fn shutdown(&self) -> Option<OptimizationReport> {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return None;
        }
        info!(in_flight = self.in_flight(), "Performance manager shutting down");

        let task = self.maintenance.lock().take();
        if let Some((tx, handle)) = task {
            let _ = tx.send(()).await;
            if let Err(e) = handle.await {
                warn!(error = %e, "Maintenance loop ended abnormally");
            }
        }

        self.drain().await;
        self.components.load_balancer.shutdown().await;
        let report = self.components.optimize();

        info!(
            optimize_runs = self.components.optimize_runs.load(Ordering::Relaxed),
            "Performance manager stopped"
        );
        Some(report)
    }

    fn enter(&self) -> PerfResult<InFlight<'_>> {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        let flight = InFlight { manager: self };
        if self.shut_down.load(Ordering::Acquire) {
            return Err(PerfError::ShuttingDown);
        }
        Ok(flight)
    }

    async fn drain(&self) {
        let wait = async {
            loop {
                let notified = self.drained.notified();
                if self.in_flight() == 0 {
                    break;
                }
                notified.await;
            }
        };

        let drain_timeout = self.config.manager.drain_timeout;
        if tokio::time::timeout(drain_timeout, wait).await.is_err() {
            warn!(
                remaining = self.in_flight(),
                timeout_ms = drain_timeout.as_millis() as u64,
                "Drain timeout elapsed"
            );
        }
    }

    fn memoized(&self, label: &str) -> Option<Bytes> {
        if !self.config.manager.memoize_results {
            return None;
        }
        let started = Instant::now();
        let hit = self.components.cache.get(label)?;

        let monitor = &self.components.monitor;
        monitor.record_duration(started.elapsed(), label);
        monitor.record_success(label);
        debug!(label, "Served from cache");
        Some(hit)
    }

    fn memoize(&self, label: &str, value: &Bytes) {
        if !self.config.manager.memoize_results {
            return;
        }
        if let Err(e) = self.components.cache.set(label, value.clone()) {
            warn!(label, error = %e, "Result not cached");
        }
    }

    async fn timed<T, Fut>(&self, label: &str, fut: Fut) -> PerfResult<T>
    where
        Fut: Future<Output = PerfResult<T>>,
    {
        let started = Instant::now();
        let result = fut.await;

        let monitor = &self.components.monitor;
        monitor.record_duration(started.elapsed(), label);
        match &result {
            Ok(_) => monitor.record_success(label),
            Err(e) => monitor.record_error(e, Some(label)),
        }
        result
    }

    fn children(&self) -> [&dyn Component; 4] {
        [
            self.components.cache.as_ref(),
            self.components.load_balancer.as_ref(),
            self.components.monitor.as_ref(),
            self.components.rate_limiter.as_ref(),
        ]
    }
}

impl Drop for PerformanceManager {
    fn drop(&mut self) {
        if let Some((_, handle)) = self.maintenance.get_mut().take() {
            handle.abort();
        }
    }
}

impl Component for PerformanceManager {
    fn name(&self) -> &'static str {
        "manager"
    }

    fn status(&self) -> ComponentStatus {
        if self.shut_down.load(Ordering::Acquire) {
            return if self.in_flight() > 0 {
                ComponentStatus::Draining
            } else {
                ComponentStatus::Stopped
            };
        }

        let unhealthy: Vec<String> = self
            .children()
            .iter()
            .filter_map(|c| {
                let status = c.status();
                (!status.is_healthy()).then(|| format!("{}: {status}", c.name()))
            })
            .collect();

        if unhealthy.is_empty() {
            ComponentStatus::Running
        } else {
            ComponentStatus::Degraded {
                reason: unhealthy.join("; "),
            }
        }
    }

    fn metrics(&self) -> MetricsPayload {
        let mut payload = MetricsPayload::new();
        for child in self.children() {
            payload.merge_scoped(child.name(), child.metrics());
        }
        payload.counter(
            "optimize_runs",
            self.components.optimize_runs.load(Ordering::Relaxed),
        );
        payload.gauge("in_flight", self.in_flight() as f64);
        payload.gauge("uptime_seconds", self.started_at.elapsed().as_secs_f64());
        payload
    }
}
