//! Benchmark reports.

use super::baseline::{BaselineComparison, Improvement, Regression};
use super::benchmark::BenchmarkResult;
use super::config::BenchmarkConfig;
use crate::modules::monitor::PerformanceMetrics;
use crate::primitives::PriorityQueue;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

const LARGE_HEAP_DELTA: i64 = 1024 * 1024;

/// Structured benchmark summary with recommendations.
///
/// `Display` renders a plain-text report.
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkReport {
    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Latest result per benchmark, ordered by name.
    pub results: Vec<BenchmarkResult>,
    /// Baseline the regressions were computed against.
    pub baseline: Option<String>,
    /// Regressions, worst first.
    pub regressions: Vec<Regression>,
    /// Improvements, largest first.
    pub improvements: Vec<Improvement>,
    /// Live metrics from the attached monitor.
    pub live_metrics: Option<PerformanceMetrics>,
    /// Suggested follow-ups.
    pub recommendations: Vec<String>,
}

impl BenchmarkReport {
    pub(crate) fn build(
        results: Vec<BenchmarkResult>,
        baseline: Option<String>,
        comparison: BaselineComparison,
        live_metrics: Option<PerformanceMetrics>,
        config: &BenchmarkConfig,
        health_threshold: Option<f64>,
    ) -> Self {
        let mut ranked = PriorityQueue::with_comparator(|a: &f64, b: &f64| b.total_cmp(a));
        let BaselineComparison {
            regressions,
            mut improvements,
            ..
        } = comparison;
        improvements.sort_by(|a, b| a.change.total_cmp(&b.change));

        for regression in regressions {
            let change = regression.change;
            ranked.enqueue(regression, change);
        }
        let regressions: Vec<Regression> = ranked
            .into_sorted_vec()
            .into_iter()
            .map(|(regression, _)| regression)
            .collect();

        let mut recommendations = Vec::new();

        if results.is_empty() {
            recommendations.push("No benchmarks have been run.".to_string());
        } else if baseline.is_none() {
            recommendations
                .push("Create a baseline to enable regression detection.".to_string());
        }

        for regression in &regressions {
            recommendations.push(format!(
                "{}: mean is {:.1}% slower than baseline '{}'; review changes on this path.",
                regression.benchmark,
                regression.change * 100.0,
                regression.baseline
            ));
        }

        for result in &results {
            let cv = result.coefficient_of_variation();
            if cv > config.noisy_cv {
                recommendations.push(format!(
                    "{}: high variance (cv {:.2}); increase iterations or isolate the workload.",
                    result.name, cv
                ));
            }
            if result.memory_delta_bytes > LARGE_HEAP_DELTA {
                recommendations.push(format!(
                    "{}: retains {} bytes of heap per run; check for leaks or unbounded caches.",
                    result.name, result.memory_delta_bytes
                ));
            }
        }

        if let (Some(live), Some(threshold)) = (&live_metrics, health_threshold) {
            if live.health.score < threshold {
                recommendations.push(format!(
                    "Live health score {:.1} is below {:.1}; error rate {:.1}%, average latency {:.2}ms.",
                    live.health.score,
                    threshold,
                    live.errors.rate * 100.0,
                    live.response_time.average
                ));
            }
        }

        if recommendations.is_empty() {
            recommendations.push("No issues detected.".to_string());
        }

        Self {
            generated_at: Utc::now(),
            results,
            baseline,
            regressions,
            improvements,
            live_metrics,
            recommendations,
        }
    }

    /// Whether any regression was found.
    #[must_use]
    pub fn has_regressions(&self) -> bool {
        !self.regressions.is_empty()
    }
}

impl fmt::Display for BenchmarkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Benchmark Report ({}) ===", self.generated_at.to_rfc3339())?;
        writeln!(f)?;

        for result in &self.results {
            writeln!(f, "{}", result.name)?;
            writeln!(f, "  Samples:    {}", result.samples)?;
            writeln!(f, "  Throughput: {:.2} ops/s", result.ops_per_second)?;
            writeln!(
                f,
                "  Mean:       {:.4}ms (stddev {:.4}ms)",
                result.mean_ms, result.std_dev_ms
            )?;
            writeln!(
                f,
                "  p50/p95/p99: {:.4}ms / {:.4}ms / {:.4}ms",
                result.p50_ms, result.p95_ms, result.p99_ms
            )?;
            writeln!(f, "  Heap delta: {:+} bytes", result.memory_delta_bytes)?;
        }

        writeln!(f)?;
        match &self.baseline {
            Some(name) if self.regressions.is_empty() => {
                writeln!(f, "No regressions against baseline '{name}'.")?;
            },
            Some(_) => {
                writeln!(f, "Regressions:")?;
                for regression in &self.regressions {
                    writeln!(f, "  - {regression}")?;
                }
            },
            None => writeln!(f, "No baseline.")?,
        }
        if !self.improvements.is_empty() {
            writeln!(f, "Improvements:")?;
            for improvement in &self.improvements {
                writeln!(f, "  - {improvement}")?;
            }
        }

        if let Some(live) = &self.live_metrics {
            writeln!(
                f,
                "Live: {} requests, {:.2} req/s, error rate {:.2}%, health {:.1}",
                live.throughput.total_requests,
                live.throughput.requests_per_second,
                live.errors.rate * 100.0,
                live.health.score
            )?;
        }

        writeln!(f)?;
        writeln!(f, "Recommendations:")?;
        for recommendation in &self.recommendations {
            writeln!(f, "  - {recommendation}")?;
        }
        Ok(())
    }
}
