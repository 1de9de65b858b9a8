//! Metrics payload shared by every component.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Metrics snapshot from a component.
///
/// Keys are kept sorted so rendered output is stable between calls.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsPayload {
    /// Counter metrics (monotonically increasing).
    pub counters: BTreeMap<String, u64>,

    /// Gauge metrics (can go up and down).
    pub gauges: BTreeMap<String, f64>,

    /// Histogram metrics (raw samples).
    pub histograms: BTreeMap<String, Vec<f64>>,
}

impl MetricsPayload {
    /// Creates a new empty metrics payload.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a counter metric.
    pub fn counter(&mut self, name: impl Into<String>, value: u64) {
        self.counters.insert(name.into(), value);
    }

    /// Adds a gauge metric.
    pub fn gauge(&mut self, name: impl Into<String>, value: f64) {
        self.gauges.insert(name.into(), value);
    }

    /// Adds a histogram metric.
    pub fn histogram(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.histograms.insert(name.into(), values);
    }

    /// Merge another payload, prefixing its names with `scope_`.
    pub fn merge_scoped(&mut self, scope: &str, other: MetricsPayload) {
        for (name, value) in other.counters {
            self.counters.insert(format!("{scope}_{name}"), value);
        }
        for (name, value) in other.gauges {
            self.gauges.insert(format!("{scope}_{name}"), value);
        }
        for (name, values) in other.histograms {
            self.histograms.insert(format!("{scope}_{name}"), values);
        }
    }

    /// Formats metrics in Prometheus text exposition format.
    ///
    /// Histograms are rendered as summaries (`count`, `sum` and p50/p95/p99
    /// quantiles).
    #[must_use]
    pub fn to_prometheus(&self, prefix: &str) -> String {
        let mut output = String::new();

        for (name, value) in &self.counters {
            let _ = writeln!(output, "# TYPE {prefix}_{name} counter");
            let _ = writeln!(output, "{prefix}_{name} {value}");
        }

        for (name, value) in &self.gauges {
            let _ = writeln!(output, "# TYPE {prefix}_{name} gauge");
            let _ = writeln!(output, "{prefix}_{name} {value}");
        }

        for (name, values) in &self.histograms {
            let mut sorted = values.clone();
            crate::primitives::sort::sort_floats(&mut sorted);
            let _ = writeln!(output, "# TYPE {prefix}_{name} summary");
            for q in [0.5, 0.95, 0.99] {
                let v = crate::primitives::sort::percentile_sorted(&sorted, q * 100.0);
                let _ = writeln!(output, "{prefix}_{name}{{quantile=\"{q}\"}} {v}");
            }
            let _ = writeln!(output, "{prefix}_{name}_sum {}", sorted.iter().sum::<f64>());
            let _ = writeln!(output, "{prefix}_{name}_count {}", sorted.len());
        }

        output
    }
}
