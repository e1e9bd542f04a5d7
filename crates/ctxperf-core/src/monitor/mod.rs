//! Metrics monitoring.
//!
//! Snapshots merge system, coordination and resource metrics. The
//! [`MetricsMonitor`] keeps bounded history and per-metric series, raises
//! threshold and trend alerts that stay open until acknowledged, scores health and
//! produces windowed reports.

pub mod alerts;
pub mod error;
pub mod health;
pub mod provider;
pub mod report;
pub mod series;
pub mod service;
pub mod snapshot;

pub use alerts::{Alert, AlertKind, AlertLog, AlertSeverity, AlertThresholds, Bound, Limit};
pub use error::{MonitorError, MonitorResult};
pub use health::{assess, ComponentHealth, HealthAssessment, HealthStatus};
pub use provider::{CoordinationTracker, ManualProvider, MetricsProvider, SystemProbe};
pub use report::{recommendations, PerformanceReport, TrendSummary, HEADLINE_METRICS};
pub use series::{Aggregations, MetricSample, MetricSeries, Trend, TrendDirection};
pub use service::{MetricsMonitor, MonitorConfig};
pub use snapshot::{CoordinationMetrics, MetricKind, MetricsSnapshot, ResourceMetrics, SystemMetrics};
