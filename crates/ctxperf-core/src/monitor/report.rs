//! Windowed performance reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::alerts::{Alert, AlertThresholds};
use super::health::HealthAssessment;
use super::series::{Aggregations, MetricSeries, Trend, TrendDirection};
use super::snapshot::{MetricKind, MetricsSnapshot};

/// Metrics summarized with a trend in every report.
pub const HEADLINE_METRICS: [MetricKind; 4] = [
    MetricKind::ResponseTime,
    MetricKind::Throughput,
    MetricKind::MemoryUsage,
    MetricKind::ErrorRate,
];

/// Share of a threshold at which a metric starts drawing recommendations.
pub const RECOMMENDATION_PROXIMITY: f64 = 0.8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSummary {
    pub metric: MetricKind,
    pub direction: TrendDirection,
    pub slope: f64,
    pub current: Option<f64>,
    pub aggregations: Aggregations,
    pub forecast: Vec<f64>,
}

impl TrendSummary {
    /// Summarize the samples of `series` taken at or after `since`.
    pub fn from_series(series: &MetricSeries, since: DateTime<Utc>) -> Self {
        let values: Vec<f64> = series
            .samples
            .iter()
            .filter(|s| s.timestamp >= since)
            .map(|s| s.value)
            .collect();
        let trend = Trend::compute(&values);
        Self {
            metric: series.metric,
            direction: trend.direction,
            slope: trend.slope,
            current: values.last().copied(),
            aggregations: Aggregations::compute(&values),
            forecast: trend.forecast,
        }
    }

    fn empty(metric: MetricKind) -> Self {
        Self {
            metric,
            direction: TrendDirection::Stable,
            slope: 0.0,
            current: None,
            aggregations: Aggregations::default(),
            forecast: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub window_start: DateTime<Utc>,
    pub latest: Option<MetricsSnapshot>,
    pub alerts: Vec<Alert>,
    pub trends: Vec<TrendSummary>,
    pub health: HealthAssessment,
    pub recommendations: Vec<String>,
}

impl PerformanceReport {
    pub fn build<'a>(
        window_start: DateTime<Utc>,
        latest: Option<MetricsSnapshot>,
        alerts: Vec<Alert>,
        series: impl Fn(MetricKind) -> Option<&'a MetricSeries>,
        health: HealthAssessment,
        thresholds: &AlertThresholds,
    ) -> Self {
        let trends = HEADLINE_METRICS
            .iter()
            .map(|metric| match series(*metric) {
                Some(s) => TrendSummary::from_series(s, window_start),
                None => TrendSummary::empty(*metric),
            })
            .collect();
        let recommendations = latest
            .as_ref()
            .map(|s| recommendations(s, thresholds))
            .unwrap_or_default();

        Self {
            id: Uuid::new_v4(),
            generated_at: Utc::now(),
            window_start,
            latest,
            alerts,
            trends,
            health,
            recommendations,
        }
    }

    pub fn trend(&self, metric: MetricKind) -> Option<&TrendSummary> {
        self.trends.iter().find(|t| t.metric == metric)
    }
}

fn advice(metric: MetricKind) -> &'static str {
    match metric {
        MetricKind::ResponseTime => {
            "Response time is near its limit: enable caching for hot paths and batch coordination calls"
        }
        MetricKind::MemoryUsage => {
            "Memory usage is near its limit: lower cache capacity or enable entry compression"
        }
        MetricKind::CpuUsage => "CPU usage is near its limit: reduce concurrent loads or compaction frequency",
        MetricKind::ErrorRate => "Error rate is elevated: inspect failing resource loaders and retry policy",
        MetricKind::CacheHitRate => {
            "Cache hit rate is low: raise cache capacity or switch to an access-pattern-aware eviction strategy"
        }
        _ => "Metric is near its limit",
    }
}

/// Canned advice for every thresholded metric at or past
/// [`RECOMMENDATION_PROXIMITY`] of its limit, closest first.
pub fn recommendations(snapshot: &MetricsSnapshot, thresholds: &AlertThresholds) -> Vec<String> {
    let mut near: Vec<(f64, MetricKind)> = thresholds
        .limits()
        .into_iter()
        .filter_map(|limit| {
            let value = snapshot.value(limit.metric)?;
            let proximity = limit.proximity(value);
            (proximity >= RECOMMENDATION_PROXIMITY).then_some((proximity, limit.metric))
        })
        .collect();
    near.sort_by(|a, b| b.0.total_cmp(&a.0));
    near.into_iter().map(|(_, m)| advice(m).to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::snapshot::{CoordinationMetrics, ResourceMetrics, SystemMetrics};

    fn snapshot(response_ms: f64, memory_mb: f64) -> MetricsSnapshot {
        MetricsSnapshot::new(
            SystemMetrics {
                memory_usage_mb: memory_mb,
                ..Default::default()
            },
            CoordinationMetrics {
                response_time_ms: response_ms,
                ..Default::default()
            },
            ResourceMetrics::default(),
        )
    }

    #[test]
    fn test_recommendations_start_at_eighty_percent() {
        let thresholds = AlertThresholds::default();
        assert!(recommendations(&snapshot(700.0, 100.0), &thresholds).is_empty());

        let recs = recommendations(&snapshot(850.0, 500.0), &thresholds);
        assert_eq!(recs.len(), 2);
        assert!(recs[0].starts_with("Memory usage"));
        assert!(recs[1].starts_with("Response time"));
    }

    #[test]
    fn test_missing_series_gives_empty_trend() {
        let report = PerformanceReport::build(
            Utc::now(),
            None,
            Vec::new(),
            |_| None,
            crate::monitor::health::assess(None, [], &AlertThresholds::default()),
            &AlertThresholds::default(),
        );
        assert_eq!(report.trends.len(), HEADLINE_METRICS.len());
        let rt = report.trend(MetricKind::ResponseTime).unwrap();
        assert_eq!(rt.direction, TrendDirection::Stable);
        assert!(rt.current.is_none());
        assert!(report.recommendations.is_empty());
    }
}
