//! # Component Contract
//!
//! Every long-lived component (cache, load balancer, monitor, rate limiter)
//! reports its status and a metrics payload through [`Component`]. The
//! payload can be rendered as Prometheus text for an external scraper.

mod metrics;
mod status;

pub use metrics::MetricsPayload;
pub use status::ComponentStatus;

/// Status and metrics reporting shared by all components.
pub trait Component: Send + Sync {
    /// Short, stable name used as the metrics prefix.
    fn name(&self) -> &'static str;

    /// Current status.
    fn status(&self) -> ComponentStatus;

    /// Current metrics.
    fn metrics(&self) -> MetricsPayload;

    /// Prometheus exposition of [`Component::metrics`] prefixed with the component name.
    fn render_prometheus(&self) -> String {
        self.metrics().to_prometheus(self.name())
    }
}
