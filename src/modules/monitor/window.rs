//! Sliding metric windows.

use crate::primitives::RingBuffer;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One recorded sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// When the sample was recorded.
    pub at: DateTime<Utc>,
    /// Sample value (milliseconds, megabytes, percent, or 0/1 for outcomes).
    pub value: f64,
    /// Optional label (operation name, error context).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Sample {
    /// Sample taken now.
    #[must_use]
    pub fn now(value: f64, label: Option<String>) -> Self {
        Self {
            at: Utc::now(),
            value,
            label,
        }
    }
}

/// Fixed-capacity window of samples with a running sum.
#[derive(Debug, Clone)]
pub struct MetricWindow {
    samples: RingBuffer<Sample>,
    sum: f64,
}

impl MetricWindow {
    /// Create a window holding at most `capacity` samples.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: RingBuffer::new(capacity),
            sum: 0.0,
        }
    }

    /// Rebuild a window from stored samples, keeping the newest `capacity`.
    #[must_use]
    pub fn from_samples(capacity: usize, samples: Vec<Sample>) -> Self {
        let mut window = Self::new(capacity);
        for sample in samples {
            window.push(sample);
        }
        window
    }

    /// Append a sample, dropping the oldest once full.
    pub fn push(&mut self, sample: Sample) {
        self.sum += sample.value;
        if let Some(old) = self.samples.push(sample) {
            self.sum -= old.value;
        }
    }

    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the window is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Running mean. Cheap but subject to float drift; use [`MetricWindow::values`] for reporting.
    #[must_use]
    pub fn running_mean(&self) -> f64 {
        if self.samples.is_empty() {
            0.0
        } else {
            self.sum / self.samples.len() as f64
        }
    }

    /// Sample values, oldest first.
    #[must_use]
    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.value).collect()
    }

    /// Most recent sample.
    #[must_use]
    pub fn latest(&self) -> Option<&Sample> {
        self.samples.newest()
    }

    /// Oldest and newest timestamps.
    #[must_use]
    pub fn bounds(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        Some((self.samples.oldest()?.at, self.samples.newest()?.at))
    }

    /// Copy of the samples, oldest first.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Sample> {
        self.samples.to_vec()
    }

    /// Remove every sample.
    pub fn clear(&mut self) {
        self.samples.clear();
        self.sum = 0.0;
    }
}
