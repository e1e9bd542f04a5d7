//! Point-in-time metric snapshots.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Every metric the monitor tracks as a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Milliseconds.
    ResponseTime,
    /// Requests per second.
    Throughput,
    /// Megabytes.
    MemoryUsage,
    /// Percent of one core.
    CpuUsage,
    /// Share of failed requests, 0.0 - 1.0.
    ErrorRate,
    CacheHitRate,
    TokenEfficiency,
    /// Milliseconds.
    CoordinationLatency,
}

impl MetricKind {
    pub const ALL: [MetricKind; 8] = [
        Self::ResponseTime,
        Self::Throughput,
        Self::MemoryUsage,
        Self::CpuUsage,
        Self::ErrorRate,
        Self::CacheHitRate,
        Self::TokenEfficiency,
        Self::CoordinationLatency,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ResponseTime => "response_time",
            Self::Throughput => "throughput",
            Self::MemoryUsage => "memory_usage",
            Self::CpuUsage => "cpu_usage",
            Self::ErrorRate => "error_rate",
            Self::CacheHitRate => "cache_hit_rate",
            Self::TokenEfficiency => "token_efficiency",
            Self::CoordinationLatency => "coordination_latency",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host process metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemMetrics {
    pub cpu_usage: f64,
    pub memory_usage_mb: f64,
    pub memory_total_mb: f64,
}

/// Request handling metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoordinationMetrics {
    pub response_time_ms: f64,
    pub throughput: f64,
    pub error_rate: f64,
    pub coordination_latency_ms: f64,
}

/// Engine resource metrics. `None` when the source is not wired in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceMetrics {
    pub cache_hit_rate: Option<f64>,
    pub token_efficiency: Option<f64>,
    pub cache_entries: Option<usize>,
    pub context_tokens: Option<usize>,
    pub loaded_resources: Option<usize>,
}

/// One merged sample of all sub-metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub system: SystemMetrics,
    pub coordination: CoordinationMetrics,
    pub resources: ResourceMetrics,
}

impl MetricsSnapshot {
    pub fn new(system: SystemMetrics, coordination: CoordinationMetrics, resources: ResourceMetrics) -> Self {
        Self {
            timestamp: Utc::now(),
            system,
            coordination,
            resources,
        }
    }

    /// Value of `kind`, if the snapshot carries it.
    pub fn value(&self, kind: MetricKind) -> Option<f64> {
        match kind {
            MetricKind::ResponseTime => Some(self.coordination.response_time_ms),
            MetricKind::Throughput => Some(self.coordination.throughput),
            MetricKind::MemoryUsage => Some(self.system.memory_usage_mb),
            MetricKind::CpuUsage => Some(self.system.cpu_usage),
            MetricKind::ErrorRate => Some(self.coordination.error_rate),
            MetricKind::CacheHitRate => self.resources.cache_hit_rate,
            MetricKind::TokenEfficiency => self.resources.token_efficiency,
            MetricKind::CoordinationLatency => Some(self.coordination.coordination_latency_ms),
        }
    }

    /// Every metric present in the snapshot.
    pub fn values(&self) -> Vec<(MetricKind, f64)> {
        MetricKind::ALL
            .iter()
            .filter_map(|k| self.value(*k).map(|v| (*k, v)))
            .collect()
    }
}
