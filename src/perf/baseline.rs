//! Baselines and regression detection.

use super::benchmark::BenchmarkResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Immutable named snapshot of benchmark results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    /// Baseline name.
    pub name: String,
    /// When the snapshot was taken.
    pub created_at: DateTime<Utc>,
    /// Results by benchmark name.
    pub results: BTreeMap<String, BenchmarkResult>,
}

impl Baseline {
    pub(crate) fn new(name: &str, results: BTreeMap<String, BenchmarkResult>) -> Self {
        Self {
            name: name.to_string(),
            created_at: Utc::now(),
            results,
        }
    }

    /// Compare `current` against this baseline.
    ///
    /// A benchmark regresses when its mean exceeds the baseline mean by more
    /// than `threshold`, and improves when it falls below it by more than
    /// `threshold`. Benchmarks missing from either side are ignored.
    #[must_use]
    pub fn compare(
        &self,
        current: &BTreeMap<String, BenchmarkResult>,
        threshold: f64,
    ) -> BaselineComparison {
        let mut comparison = BaselineComparison {
            baseline: self.name.clone(),
            regressions: Vec::new(),
            improvements: Vec::new(),
        };

        for (name, base) in &self.results {
            let Some(now) = current.get(name) else {
                continue;
            };
            let delta = || MeanDelta {
                benchmark: name.clone(),
                baseline: self.name.clone(),
                baseline_mean_ms: base.mean_ms,
                current_mean_ms: now.mean_ms,
                change: relative_change(base.mean_ms, now.mean_ms),
                threshold,
            };

            if now.mean_ms > base.mean_ms * (1.0 + threshold) {
                comparison.regressions.push(delta());
            } else if now.mean_ms < base.mean_ms * (1.0 - threshold) {
                comparison.improvements.push(delta());
            }
        }
        comparison
    }
}

fn relative_change(base: f64, now: f64) -> f64 {
    if base > 0.0 {
        (now - base) / base
    } else if now > 0.0 {
        f64::INFINITY
    } else {
        0.0
    }
}

/// Outcome of comparing current results against a baseline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaselineComparison {
    /// Baseline compared against. Empty when the baseline was not found.
    pub baseline: String,
    /// Benchmarks that slowed down past the threshold.
    pub regressions: Vec<Regression>,
    /// Benchmarks that sped up past the threshold.
    pub improvements: Vec<Improvement>,
}

impl BaselineComparison {
    /// Whether any regression was found.
    #[must_use]
    pub fn has_regressions(&self) -> bool {
        !self.regressions.is_empty()
    }

    /// Whether nothing moved past the threshold.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regressions.is_empty() && self.improvements.is_empty()
    }
}

/// Mean change of one benchmark relative to a baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeanDelta {
    /// Benchmark name.
    pub benchmark: String,
    /// Baseline compared against.
    pub baseline: String,
    /// Mean in the baseline.
    pub baseline_mean_ms: f64,
    /// Current mean.
    pub current_mean_ms: f64,
    /// Relative change of the mean (0.3 = 30% slower, -0.3 = 30% faster).
    pub change: f64,
    /// Threshold that was crossed.
    pub threshold: f64,
}

impl MeanDelta {
    /// Change as a percentage.
    #[must_use]
    pub fn percent_change(&self) -> f64 {
        self.change * 100.0
    }
}

/// A benchmark whose mean slowed down past the threshold.
pub type Regression = MeanDelta;

/// A benchmark whose mean sped up past the threshold.
pub type Improvement = MeanDelta;

impl std::fmt::Display for MeanDelta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verb = if self.change > 0.0 {
            "regressed"
        } else {
            "improved"
        };
        write!(
            f,
            "{} {} {:.1}% against '{}' ({:.4}ms -> {:.4}ms, threshold {:.0}%)",
            self.benchmark,
            verb,
            self.percent_change().abs(),
            self.baseline,
            self.baseline_mean_ms,
            self.current_mean_ms,
            self.threshold * 100.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn result(name: &str, mean: f64) -> BenchmarkResult {
        BenchmarkResult::from_samples(name, vec![mean], Duration::from_millis(1), 0).unwrap()
    }

    #[test]
    fn test_threshold_boundary() {
        let mut base = BTreeMap::new();
        base.insert("op".to_string(), result("op", 10.0));
        let baseline = Baseline::new("v1", base);

        let mut current = BTreeMap::new();
        current.insert("op".to_string(), result("op", 12.0));
        assert!(baseline.compare(&current, 0.2).is_empty());

        current.insert("op".to_string(), result("op", 12.5));
        let comparison = baseline.compare(&current, 0.2);
        assert_eq!(comparison.regressions.len(), 1);
        assert!(comparison.improvements.is_empty());
        assert!(comparison.regressions[0]
            .to_string()
            .starts_with("op regressed 25.0%"));
    }

    #[test]
    fn test_improvement_detected() {
        let mut base = BTreeMap::new();
        base.insert("op".to_string(), result("op", 10.0));
        let baseline = Baseline::new("v1", base);

        let mut current = BTreeMap::new();
        current.insert("op".to_string(), result("op", 8.5));
        assert!(baseline.compare(&current, 0.2).is_empty());

        current.insert("op".to_string(), result("op", 7.0));
        let comparison = baseline.compare(&current, 0.2);
        assert!(!comparison.has_regressions());
        assert_eq!(comparison.improvements.len(), 1);
        assert!((comparison.improvements[0].percent_change() + 30.0).abs() < 1e-9);
        assert!(comparison.improvements[0]
            .to_string()
            .starts_with("op improved 30.0%"));
    }

    #[test]
    fn test_missing_benchmarks_ignored() {
        let mut base = BTreeMap::new();
        base.insert("gone".to_string(), result("gone", 1.0));
        let baseline = Baseline::new("v1", base);

        let mut current = BTreeMap::new();
        current.insert("new".to_string(), result("new", 100.0));
        assert!(baseline.compare(&current, 0.2).is_empty());
    }
}
