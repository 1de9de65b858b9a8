//! Benchmarking framework.
//!
//! Runs timed iterations of an operation and summarizes them into a
//! [`BenchmarkResult`]. Regression tracking lives in [`super::baseline`].

use super::baseline::{Baseline, BaselineComparison};
use super::config::BenchmarkConfig;
use super::error::{BenchResult, BenchmarkError};
use super::memory::TrackingAllocator;
use super::report::BenchmarkReport;
use crate::modules::monitor::PerformanceMonitor;
use crate::primitives::sort::{percentile_sorted, sort_floats};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::hint::black_box;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Iteration counts for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchmarkOptions {
    /// Measured iterations.
    pub iterations: usize,
    /// Unmeasured iterations run first.
    pub warmup_iterations: usize,
}

impl From<&BenchmarkConfig> for BenchmarkOptions {
    fn from(config: &BenchmarkConfig) -> Self {
        Self {
            iterations: config.iterations,
            warmup_iterations: config.warmup_iterations,
        }
    }
}

/// Summary of one benchmark run. Times are in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    /// Benchmark name.
    pub name: String,
    /// Measured iterations.
    pub samples: usize,
    /// Mean time per call.
    pub mean_ms: f64,
    /// Population standard deviation.
    pub std_dev_ms: f64,
    /// Fastest call.
    pub min_ms: f64,
    /// Slowest call.
    pub max_ms: f64,
    /// Median.
    pub p50_ms: f64,
    /// 95th percentile.
    pub p95_ms: f64,
    /// 99th percentile.
    pub p99_ms: f64,
    /// Iterations divided by the measured wall-clock time.
    pub ops_per_second: f64,
    /// Net heap growth over the measured iterations. Zero unless
    /// [`TrackingAllocator`] is the global allocator.
    pub memory_delta_bytes: i64,
    /// When the run finished.
    pub recorded_at: DateTime<Utc>,
}

impl BenchmarkResult {
    /// Build a result from per-call times in milliseconds.
    ///
    /// # Errors
    ///
    /// Returns [`BenchmarkError::EmptyBenchmark`] if `times_ms` is empty.
    pub fn from_samples(
        name: impl Into<String>,
        mut times_ms: Vec<f64>,
        total: Duration,
        memory_delta_bytes: i64,
    ) -> BenchResult<Self> {
        let name = name.into();
        if times_ms.is_empty() {
            return Err(BenchmarkError::EmptyBenchmark(name));
        }

        let n = times_ms.len() as f64;
        let mean = times_ms.iter().sum::<f64>() / n;
        let variance = times_ms.iter().map(|t| (t - mean).powi(2)).sum::<f64>() / n;
        sort_floats(&mut times_ms);

        let total_secs = total.as_secs_f64();
        let ops_per_second = if total_secs > 0.0 {
            n / total_secs
        } else {
            f64::INFINITY
        };

        Ok(Self {
            samples: times_ms.len(),
            mean_ms: mean,
            std_dev_ms: variance.sqrt(),
            min_ms: times_ms[0],
            max_ms: times_ms[times_ms.len() - 1],
            p50_ms: percentile_sorted(&times_ms, 50.0),
            p95_ms: percentile_sorted(&times_ms, 95.0),
            p99_ms: percentile_sorted(&times_ms, 99.0),
            ops_per_second,
            memory_delta_bytes,
            recorded_at: Utc::now(),
            name,
        })
    }

    /// Standard deviation relative to the mean.
    #[must_use]
    pub fn coefficient_of_variation(&self) -> f64 {
        if self.mean_ms > 0.0 {
            self.std_dev_ms / self.mean_ms
        } else {
            0.0
        }
    }

    /// One-line summary.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{}: {:.2} ops/s, mean={:.4}ms, p50={:.4}ms, p99={:.4}ms, max={:.4}ms, heap={:+}B",
            self.name,
            self.ops_per_second,
            self.mean_ms,
            self.p50_ms,
            self.p99_ms,
            self.max_ms,
            self.memory_delta_bytes
        )
    }
}

type SuiteFn = Box<dyn FnMut() + Send>;

/// Named group of synchronous benchmarks run together by
/// [`BenchmarkRunner::run_suite`].
pub struct BenchmarkSuite {
    name: String,
    options: Option<BenchmarkOptions>,
    benchmarks: Vec<(String, SuiteFn)>,
}

impl std::fmt::Debug for BenchmarkSuite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.benchmarks.iter().map(|(n, _)| n.as_str()).collect();
        f.debug_struct("BenchmarkSuite")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("benchmarks", &names)
            .finish()
    }
}

impl BenchmarkSuite {
    /// Create an empty suite.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: None,
            benchmarks: Vec::new(),
        }
    }

    /// Override the runner's iteration counts for this suite.
    #[must_use]
    pub fn with_options(mut self, options: BenchmarkOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Add a benchmark.
    pub fn add<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.benchmarks.push((name.into(), Box::new(f)));
    }

    /// Builder form of [`BenchmarkSuite::add`].
    #[must_use]
    pub fn with<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        self.add(name, f);
        self
    }

    /// Suite name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of benchmarks.
    pub fn len(&self) -> usize {
        self.benchmarks.len()
    }

    /// Whether the suite has no benchmarks.
    pub fn is_empty(&self) -> bool {
        self.benchmarks.is_empty()
    }
}

/// Runs benchmarks, keeps the latest result per name and manages baselines.
#[derive(Debug)]
pub struct BenchmarkRunner {
    config: BenchmarkConfig,
    results: RwLock<BTreeMap<String, BenchmarkResult>>,
    baselines: RwLock<HashMap<String, Baseline>>,
    latest_baseline: RwLock<Option<String>>,
    monitor: Option<Arc<PerformanceMonitor>>,
}

impl BenchmarkRunner {
    /// Create a runner.
    ///
    /// # Errors
    ///
    /// Returns [`BenchmarkError::Config`] if the configuration is invalid.
    pub fn new(config: BenchmarkConfig) -> BenchResult<Self> {
        config.validate().into_result()?;
        Ok(Self {
            config,
            results: RwLock::new(BTreeMap::new()),
            baselines: RwLock::new(HashMap::new()),
            latest_baseline: RwLock::new(None),
            monitor: None,
        })
    }

    /// Include live metrics from `monitor` in generated reports.
    #[must_use]
    pub fn with_monitor(mut self, monitor: Arc<PerformanceMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Configuration.
    #[must_use]
    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Run `f` with the configured iteration counts.
    ///
    /// # Errors
    ///
    /// Returns [`BenchmarkError::EmptyBenchmark`] if `iterations` is zero.
    pub fn run_benchmark<F, R>(&self, name: &str, f: F) -> BenchResult<BenchmarkResult>
    where
        F: FnMut() -> R,
    {
        self.run_benchmark_with(name, BenchmarkOptions::from(&self.config), f)
    }

    /// Run `f` with explicit iteration counts.
    ///
    /// Warmup calls are not measured. Each measured call is timed on its own;
    /// the heap delta spans the whole measured loop.
    ///
    /// # Errors
    ///
    /// Returns [`BenchmarkError::EmptyBenchmark`] if `options.iterations` is zero.
    pub fn run_benchmark_with<F, R>(
        &self,
        name: &str,
        options: BenchmarkOptions,
        mut f: F,
    ) -> BenchResult<BenchmarkResult>
    where
        F: FnMut() -> R,
    {
        if options.iterations == 0 {
            return Err(BenchmarkError::EmptyBenchmark(name.to_string()));
        }

        for _ in 0..options.warmup_iterations {
            black_box(f());
        }

        let mut times_ms = Vec::with_capacity(options.iterations);
        let heap_before = TrackingAllocator::snapshot();
        let started = Instant::now();
        for _ in 0..options.iterations {
            let call = Instant::now();
            black_box(f());
            times_ms.push(call.elapsed().as_secs_f64() * 1000.0);
        }
        let total = started.elapsed();
        let memory_delta = TrackingAllocator::snapshot().delta_since(&heap_before);

        let result = BenchmarkResult::from_samples(name, times_ms, total, memory_delta)?;
        self.store_result(result.clone());
        Ok(result)
    }

    /// Async form of [`BenchmarkRunner::run_benchmark`].
    ///
    /// # Errors
    ///
    /// Returns [`BenchmarkError::EmptyBenchmark`] if `iterations` is zero.
    pub async fn run_benchmark_async<F, Fut, R>(
        &self,
        name: &str,
        f: F,
    ) -> BenchResult<BenchmarkResult>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = R>,
    {
        self.run_benchmark_async_with(name, BenchmarkOptions::from(&self.config), f)
            .await
    }

    /// Async form of [`BenchmarkRunner::run_benchmark_with`].
    ///
    /// # Errors
    ///
    /// Returns [`BenchmarkError::EmptyBenchmark`] if `options.iterations` is zero.
    pub async fn run_benchmark_async_with<F, Fut, R>(
        &self,
        name: &str,
        options: BenchmarkOptions,
        mut f: F,
    ) -> BenchResult<BenchmarkResult>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = R>,
    {
        if options.iterations == 0 {
            return Err(BenchmarkError::EmptyBenchmark(name.to_string()));
        }

        for _ in 0..options.warmup_iterations {
            black_box(f().await);
        }

        let mut times_ms = Vec::with_capacity(options.iterations);
        let heap_before = TrackingAllocator::snapshot();
        let started = Instant::now();
        for _ in 0..options.iterations {
            let call = Instant::now();
            black_box(f().await);
            times_ms.push(call.elapsed().as_secs_f64() * 1000.0);
        }
        let total = started.elapsed();
        let memory_delta = TrackingAllocator::snapshot().delta_since(&heap_before);

        let result = BenchmarkResult::from_samples(name, times_ms, total, memory_delta)?;
        self.store_result(result.clone());
        Ok(result)
    }

    /// Run every benchmark in `suite`, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns the first [`BenchmarkError::EmptyBenchmark`] encountered.
    pub fn run_suite(&self, suite: &mut BenchmarkSuite) -> BenchResult<Vec<BenchmarkResult>> {
        let options = suite
            .options
            .unwrap_or_else(|| BenchmarkOptions::from(&self.config));
        info!(
            suite = %suite.name,
            benchmarks = suite.benchmarks.len(),
            iterations = options.iterations,
            "Running benchmark suite"
        );

        let mut results = Vec::with_capacity(suite.benchmarks.len());
        for (name, f) in &mut suite.benchmarks {
            let result = self.run_benchmark_with(name, options, || f())?;
            debug!("{}", result.summary());
            results.push(result);
        }
        Ok(results)
    }

    /// Record an externally produced result, replacing any earlier one with the same name.
    pub fn store_result(&self, result: BenchmarkResult) {
        self.results.write().insert(result.name.clone(), result);
    }

    /// Latest result per benchmark, ordered by name.
    #[must_use]
    pub fn results(&self) -> Vec<BenchmarkResult> {
        self.results.read().values().cloned().collect()
    }

    /// Latest result for `name`.
    #[must_use]
    pub fn result(&self, name: &str) -> Option<BenchmarkResult> {
        self.results.read().get(name).cloned()
    }

    /// Snapshot the current results under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`BenchmarkError::BaselineExists`] if `name` is taken and
    /// [`BenchmarkError::NoResults`] if nothing has been run yet.
    pub fn create_baseline(&self, name: &str) -> BenchResult<Baseline> {
        let results = self.results.read().clone();
        if results.is_empty() {
            return Err(BenchmarkError::NoResults);
        }

        let mut baselines = self.baselines.write();
        if baselines.contains_key(name) {
            return Err(BenchmarkError::BaselineExists(name.to_string()));
        }

        let baseline = Baseline::new(name, results);
        baselines.insert(name.to_string(), baseline.clone());
        drop(baselines);
        *self.latest_baseline.write() = Some(name.to_string());

        info!(
            baseline = name,
            benchmarks = baseline.results.len(),
            "Baseline created"
        );
        Ok(baseline)
    }

    /// Stored baseline by name.
    #[must_use]
    pub fn baseline(&self, name: &str) -> Option<Baseline> {
        self.baselines.read().get(name).cloned()
    }

    /// Names of stored baselines, sorted.
    #[must_use]
    pub fn baseline_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.baselines.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Compare current results against baseline `name`.
    ///
    /// A benchmark regresses when its mean exceeds the baseline mean by more
    /// than `regression_threshold` and improves when it drops below it by
    /// more than the same fraction. A missing baseline logs a warning and
    /// yields an empty comparison.
    #[must_use]
    pub fn compare_against_baseline(&self, name: &str) -> BaselineComparison {
        let Some(baseline) = self.baseline(name) else {
            warn!(baseline = name, "Baseline not found; skipping regression check");
            return BaselineComparison::default();
        };

        let results = self.results.read();
        let comparison = baseline.compare(&results, self.config.regression_threshold);
        drop(results);

        for regression in &comparison.regressions {
            warn!(
                benchmark = %regression.benchmark,
                baseline = name,
                baseline_mean_ms = regression.baseline_mean_ms,
                current_mean_ms = regression.current_mean_ms,
                "Performance regression detected"
            );
        }
        for improvement in &comparison.improvements {
            debug!(
                benchmark = %improvement.benchmark,
                baseline = name,
                percent_change = improvement.percent_change(),
                "Performance improvement detected"
            );
        }
        comparison
    }

    /// Export every baseline as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`BenchmarkError::Serialization`] if encoding fails.
    pub fn export_baselines(&self) -> BenchResult<String> {
        let baselines = self.baselines.read();
        let mut sorted: Vec<&Baseline> = baselines.values().collect();
        sorted.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(serde_json::to_string_pretty(&sorted)?)
    }

    /// Import baselines exported by [`BenchmarkRunner::export_baselines`].
    ///
    /// Baselines whose name is already present are skipped. Returns the number imported.
    ///
    /// # Errors
    ///
    /// Returns [`BenchmarkError::Serialization`] for malformed input.
    pub fn import_baselines(&self, data: &str) -> BenchResult<usize> {
        let incoming: Vec<Baseline> = serde_json::from_str(data)?;
        let mut baselines = self.baselines.write();
        let mut latest: Option<Baseline> = None;
        let mut imported = 0;

        for baseline in incoming {
            if baselines.contains_key(&baseline.name) {
                warn!(baseline = %baseline.name, "Baseline already exists; not importing");
                continue;
            }
            if latest
                .as_ref()
                .is_none_or(|l| baseline.created_at >= l.created_at)
            {
                latest = Some(baseline.clone());
            }
            baselines.insert(baseline.name.clone(), baseline);
            imported += 1;
        }
        drop(baselines);

        if let Some(latest) = latest {
            let mut current = self.latest_baseline.write();
            if current.is_none() {
                *current = Some(latest.name);
            }
        }

        info!(imported, "Baselines imported");
        Ok(imported)
    }

    /// Summarize current results, changes against the latest baseline
    /// and recommendations.
    #[must_use]
    pub fn generate_report(&self) -> BenchmarkReport {
        let latest = self.latest_baseline.read().clone();
        let comparison = latest
            .as_deref()
            .map(|name| self.compare_against_baseline(name))
            .unwrap_or_default();
        let live = self.monitor.as_ref().map(|m| m.get_metrics());
        let health_threshold = self
            .monitor
            .as_ref()
            .map(|m| m.config().alert_thresholds.health_score);

        BenchmarkReport::build(
            self.results(),
            latest,
            comparison,
            live,
            &self.config,
            health_threshold,
        )
    }
}
