//! Versioned export format.

use super::config::MonitorConfig;
use super::window::Sample;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Version written by [`super::PerformanceMonitor::export_data`].
pub const SNAPSHOT_VERSION: u32 = 2;

/// Lifetime counters carried by a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    /// Successful operations.
    pub successes: u64,
    /// Failed operations.
    pub errors: u64,
    /// Response-time samples dropped by sampling.
    pub sampled_out: u64,
}

/// Complete monitor state: configuration, counters and every window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    /// Format version.
    pub version: u32,
    /// When the snapshot was taken.
    pub exported_at: DateTime<Utc>,
    /// Monitor configuration.
    pub config: MonitorConfig,
    /// Lifetime counters.
    pub counters: CounterSnapshot,
    /// Response-time window.
    pub response_times: Vec<Sample>,
    /// Outcome events, value 0 for success and 1 for error.
    pub outcomes: Vec<Sample>,
    /// Memory usage samples.
    pub memory: Vec<Sample>,
    /// CPU usage samples.
    pub cpu: Vec<Sample>,
}
