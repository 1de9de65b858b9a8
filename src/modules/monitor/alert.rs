//! Threshold alerts with per-kind cooldown.

use crate::primitives::RingBuffer;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Threshold an alert was raised for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Average response time above threshold.
    ResponseTime,
    /// Error rate above threshold.
    ErrorRate,
    /// Memory usage above threshold.
    MemoryUsage,
    /// CPU usage above threshold.
    CpuUsage,
    /// Health score below threshold.
    HealthScore,
}

impl AlertKind {
    /// Whether the alert fires when the value drops below the threshold.
    #[must_use]
    pub fn is_lower_bound(self) -> bool {
        matches!(self, Self::HealthScore)
    }

    /// Stable name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ResponseTime => "response_time",
            Self::ErrorRate => "error_rate",
            Self::MemoryUsage => "memory_usage",
            Self::CpuUsage => "cpu_usage",
            Self::HealthScore => "health_score",
        }
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    /// Threshold crossed.
    Warning,
    /// Threshold crossed by half again or more.
    Critical,
}

impl AlertSeverity {
    /// Classify a breach. Upper-bound kinds are critical at 1.5x the threshold,
    /// the health score at two thirds of it.
    #[must_use]
    pub fn classify(kind: AlertKind, value: f64, threshold: f64) -> Self {
        let critical = if kind.is_lower_bound() {
            value * 1.5 <= threshold
        } else {
            value >= threshold * 1.5
        };
        if critical {
            Self::Critical
        } else {
            Self::Warning
        }
    }
}

/// A fired alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Threshold kind.
    pub kind: AlertKind,
    /// Severity.
    pub severity: AlertSeverity,
    /// Observed value.
    pub value: f64,
    /// Configured threshold.
    pub threshold: f64,
    /// Human-readable description.
    pub message: String,
    /// When the alert fired.
    pub triggered_at: DateTime<Utc>,
    /// Further alerts of this kind are suppressed until then.
    pub cooldown_until: DateTime<Utc>,
}

impl Alert {
    /// Whether the cooldown window is still open.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        now < self.cooldown_until
    }
}

/// Cooldown bookkeeping, history and fan-out of alerts.
#[derive(Debug)]
pub(crate) struct AlertManager {
    cooldown: Duration,
    last_fired: HashMap<AlertKind, Instant>,
    active: HashMap<AlertKind, Alert>,
    history: RingBuffer<Alert>,
    fired: u64,
    suppressed: u64,
    sender: broadcast::Sender<Alert>,
}

impl AlertManager {
    pub fn new(cooldown: Duration, history_size: usize) -> Self {
        let (sender, _) = broadcast::channel(history_size.max(16));
        Self {
            cooldown,
            last_fired: HashMap::new(),
            active: HashMap::new(),
            history: RingBuffer::new(history_size),
            fired: 0,
            suppressed: 0,
            sender,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Alert> {
        self.sender.subscribe()
    }

    pub fn set_cooldown(&mut self, cooldown: Duration) {
        self.cooldown = cooldown;
    }

    /// Fire an alert unless one of the same kind is cooling down.
    pub fn raise(&mut self, kind: AlertKind, value: f64, threshold: f64) -> Option<Alert> {
        let now = Instant::now();
        if let Some(last) = self.last_fired.get(&kind) {
            if now.duration_since(*last) < self.cooldown {
                self.suppressed += 1;
                debug!(kind = %kind, value, "Alert suppressed by cooldown");
                return None;
            }
        }

        let triggered_at = Utc::now();
        let cooldown_until = chrono::Duration::from_std(self.cooldown)
            .ok()
            .and_then(|d| triggered_at.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let severity = AlertSeverity::classify(kind, value, threshold);
        let comparison = if kind.is_lower_bound() { "below" } else { "above" };

        let alert = Alert {
            kind,
            severity,
            value,
            threshold,
            message: format!("{kind} {value:.3} is {comparison} threshold {threshold:.3}"),
            triggered_at,
            cooldown_until,
        };

        warn!(
            kind = %kind,
            severity = ?severity,
            value,
            threshold,
            "Alert fired"
        );

        self.last_fired.insert(kind, now);
        self.active.insert(kind, alert.clone());
        self.history.push(alert.clone());
        self.fired += 1;
        // No receivers is fine.
        let _ = self.sender.send(alert.clone());

        Some(alert)
    }

    pub fn active(&self) -> Vec<Alert> {
        let now = Utc::now();
        let mut alerts: Vec<Alert> = self
            .active
            .values()
            .filter(|a| a.is_active_at(now))
            .cloned()
            .collect();
        alerts.sort_by(|a, b| a.triggered_at.cmp(&b.triggered_at));
        alerts
    }

    pub fn history(&self) -> Vec<Alert> {
        self.history.to_vec()
    }

    pub fn fired(&self) -> u64 {
        self.fired
    }

    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }

    pub fn clear(&mut self) {
        self.last_fired.clear();
        self.active.clear();
        self.history.clear();
    }
}
