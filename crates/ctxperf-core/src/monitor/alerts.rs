//! Threshold and trend alerting.

use std::fmt;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::series::{MetricSeries, TrendDirection};
use super::snapshot::{MetricKind, MetricsSnapshot};
use crate::obs::emit_alert_raised;

/// Samples a series needs before its trend can raise an alert.
pub const MIN_TREND_SAMPLES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Threshold,
    /// Raised before a limit is crossed, when the fitted trend projects past it.
    Trend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub metric: MetricKind,
    pub message: String,
    pub value: f64,
    pub threshold: f64,
    pub timestamp: DateTime<Utc>,
    pub acknowledged: bool,
}

/// Alert thresholds. Ceilings trip above, the cache hit rate trips below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    pub response_time_ms: f64,
    pub memory_usage_mb: f64,
    pub cpu_usage: f64,
    pub error_rate: f64,
    pub cache_hit_rate_min: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            response_time_ms: 1000.0,
            memory_usage_mb: 512.0,
            cpu_usage: 80.0,
            error_rate: 0.05,
            cache_hit_rate_min: 0.7,
        }
    }
}

/// How a thresholded metric is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Ceiling,
    Floor,
}

/// A configured limit for one metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limit {
    pub metric: MetricKind,
    pub value: f64,
    pub bound: Bound,
    pub severity: AlertSeverity,
}

impl Limit {
    pub fn violated_by(&self, value: f64) -> bool {
        match self.bound {
            Bound::Ceiling => value > self.value,
            Bound::Floor => value < self.value,
        }
    }

    /// How close `value` is to the limit: 1.0 at the limit, above 1.0 past it.
    pub fn proximity(&self, value: f64) -> f64 {
        match self.bound {
            Bound::Ceiling if self.value > 0.0 => value / self.value,
            Bound::Floor if value > 0.0 => self.value / value,
            Bound::Floor => f64::INFINITY,
            Bound::Ceiling => 0.0,
        }
    }
}

impl AlertThresholds {
    pub fn limits(&self) -> [Limit; 5] {
        [
            Limit {
                metric: MetricKind::ResponseTime,
                value: self.response_time_ms,
                bound: Bound::Ceiling,
                severity: AlertSeverity::High,
            },
            Limit {
                metric: MetricKind::MemoryUsage,
                value: self.memory_usage_mb,
                bound: Bound::Ceiling,
                severity: AlertSeverity::High,
            },
            Limit {
                metric: MetricKind::CpuUsage,
                value: self.cpu_usage,
                bound: Bound::Ceiling,
                severity: AlertSeverity::Critical,
            },
            Limit {
                metric: MetricKind::ErrorRate,
                value: self.error_rate,
                bound: Bound::Ceiling,
                severity: AlertSeverity::Medium,
            },
            Limit {
                metric: MetricKind::CacheHitRate,
                value: self.cache_hit_rate_min,
                bound: Bound::Floor,
                severity: AlertSeverity::Medium,
            },
        ]
    }

    pub fn limit_for(&self, metric: MetricKind) -> Option<Limit> {
        self.limits().into_iter().find(|l| l.metric == metric)
    }
}

/// Open and acknowledged alerts.
#[derive(Debug, Clone, Default)]
pub struct AlertLog {
    alerts: Vec<Alert>,
}

impl AlertLog {
    /// Raise a threshold alert for every violated limit that has no open
    /// alert yet. Returns the new alerts.
    pub fn evaluate(&mut self, snapshot: &MetricsSnapshot, thresholds: &AlertThresholds) -> Vec<Alert> {
        let mut raised = Vec::new();
        for limit in thresholds.limits() {
            let Some(value) = snapshot.value(limit.metric) else {
                continue;
            };
            if !limit.violated_by(value) || self.has_open(limit.metric, AlertKind::Threshold) {
                continue;
            }
            let relation = match limit.bound {
                Bound::Ceiling => "above",
                Bound::Floor => "below",
            };
            let alert = Alert {
                id: Uuid::new_v4(),
                kind: AlertKind::Threshold,
                severity: limit.severity,
                metric: limit.metric,
                message: format!("{} is {value:.2}, {relation} threshold {:.2}", limit.metric, limit.value),
                value,
                threshold: limit.value,
                timestamp: snapshot.timestamp,
                acknowledged: false,
            };
            emit_alert_raised(limit.metric.as_str(), &alert.severity.to_string(), value, limit.value);
            self.alerts.push(alert.clone());
            raised.push(alert);
        }
        raised
    }

    /// Raise a trend alert for every metric still inside its limit whose
    /// series is moving toward the limit and whose forecast ends past it.
    pub fn evaluate_trends<'a>(
        &mut self,
        series: impl IntoIterator<Item = &'a MetricSeries>,
        thresholds: &AlertThresholds,
        now: DateTime<Utc>,
    ) -> Vec<Alert> {
        let mut raised = Vec::new();
        for s in series {
            let Some(limit) = thresholds.limit_for(s.metric) else {
                continue;
            };
            let (Some(latest), Some(projected)) = (s.latest(), s.trend.forecast.last().copied()) else {
                continue;
            };
            let degrading = match limit.bound {
                Bound::Ceiling => s.trend.direction == TrendDirection::Increasing,
                Bound::Floor => s.trend.direction == TrendDirection::Decreasing,
            };
            if s.len() < MIN_TREND_SAMPLES
                || !degrading
                || limit.violated_by(latest)
                || !limit.violated_by(projected)
                || self.has_open(s.metric, AlertKind::Trend)
            {
                continue;
            }
            let alert = Alert {
                id: Uuid::new_v4(),
                kind: AlertKind::Trend,
                severity: AlertSeverity::Low,
                metric: s.metric,
                message: format!(
                    "{} trending toward threshold {:.2}: {latest:.2} now, {projected:.2} projected",
                    s.metric, limit.value
                ),
                value: projected,
                threshold: limit.value,
                timestamp: now,
                acknowledged: false,
            };
            emit_alert_raised(s.metric.as_str(), &alert.severity.to_string(), projected, limit.value);
            self.alerts.push(alert.clone());
            raised.push(alert);
        }
        raised
    }

    fn has_open(&self, metric: MetricKind, kind: AlertKind) -> bool {
        self.alerts
            .iter()
            .any(|a| a.metric == metric && a.kind == kind && !a.acknowledged)
    }

    /// Mark an alert acknowledged. Returns false when the id is unknown.
    pub fn acknowledge(&mut self, id: Uuid) -> bool {
        match self.alerts.iter_mut().find(|a| a.id == id) {
            Some(alert) => {
                alert.acknowledged = true;
                true
            }
            None => false,
        }
    }

    /// Drop alerts older than `retention`.
    pub fn prune(&mut self, now: DateTime<Utc>, retention: ChronoDuration) -> usize {
        let before = self.alerts.len();
        self.alerts.retain(|a| now - a.timestamp <= retention);
        before - self.alerts.len()
    }

    pub fn all(&self) -> &[Alert] {
        &self.alerts
    }

    pub fn active(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.iter().filter(|a| !a.acknowledged)
    }

    pub fn since(&self, start: DateTime<Utc>) -> Vec<Alert> {
        self.alerts
            .iter()
            .filter(|a| a.timestamp >= start)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::series::MetricSample;
    use crate::monitor::snapshot::{CoordinationMetrics, ResourceMetrics, SystemMetrics};

    fn snapshot(response_ms: f64, cpu: f64, hit_rate: Option<f64>) -> MetricsSnapshot {
        MetricsSnapshot::new(
            SystemMetrics {
                cpu_usage: cpu,
                ..Default::default()
            },
            CoordinationMetrics {
                response_time_ms: response_ms,
                ..Default::default()
            },
            ResourceMetrics {
                cache_hit_rate: hit_rate,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_severity_by_metric() {
        let mut log = AlertLog::default();
        let raised = log.evaluate(&snapshot(1500.0, 95.0, Some(0.2)), &AlertThresholds::default());
        let by_metric = |m: MetricKind| raised.iter().find(|a| a.metric == m).map(|a| a.severity);
        assert_eq!(by_metric(MetricKind::ResponseTime), Some(AlertSeverity::High));
        assert_eq!(by_metric(MetricKind::CpuUsage), Some(AlertSeverity::Critical));
        assert_eq!(by_metric(MetricKind::CacheHitRate), Some(AlertSeverity::Medium));
        assert_eq!(raised.len(), 3);
    }

    #[test]
    fn test_one_open_alert_per_metric() {
        let mut log = AlertLog::default();
        let thresholds = AlertThresholds::default();
        assert_eq!(log.evaluate(&snapshot(1500.0, 0.0, None), &thresholds).len(), 1);
        assert!(log.evaluate(&snapshot(1800.0, 0.0, None), &thresholds).is_empty());

        let id = log.all()[0].id;
        assert!(log.acknowledge(id));
        assert_eq!(log.evaluate(&snapshot(1800.0, 0.0, None), &thresholds).len(), 1);
        assert!(!log.acknowledge(Uuid::new_v4()));
    }

    #[test]
    fn test_prune_by_retention() {
        let mut log = AlertLog::default();
        let mut old = snapshot(2000.0, 0.0, None);
        old.timestamp = Utc::now() - ChronoDuration::hours(30);
        log.evaluate(&old, &AlertThresholds::default());
        assert_eq!(log.prune(Utc::now(), ChronoDuration::hours(24)), 1);
        assert!(log.all().is_empty());
    }

    fn rising_series(values: &[f64]) -> MetricSeries {
        let mut series = MetricSeries::new(MetricKind::ResponseTime, 32);
        for value in values {
            series.push(MetricSample {
                value: *value,
                timestamp: Utc::now(),
                tags: Default::default(),
            });
        }
        series
    }

    #[test]
    fn test_rising_series_raises_trend_alert_before_threshold() {
        let mut log = AlertLog::default();
        let thresholds = AlertThresholds::default();
        let series = rising_series(&[600.0, 700.0, 800.0, 900.0, 950.0]);

        let raised = log.evaluate_trends([&series], &thresholds, Utc::now());
        assert_eq!(raised.len(), 1);
        assert_eq!(raised[0].kind, AlertKind::Trend);
        assert_eq!(raised[0].metric, MetricKind::ResponseTime);
        assert!(raised[0].value > thresholds.response_time_ms);

        // still open, so not raised twice
        assert!(log.evaluate_trends([&series], &thresholds, Utc::now()).is_empty());
    }

    #[test]
    fn test_no_trend_alert_when_flat_short_or_already_violated() {
        let mut log = AlertLog::default();
        let thresholds = AlertThresholds::default();

        let flat = rising_series(&[900.0; 6]);
        let short = rising_series(&[600.0, 800.0, 950.0]);
        let over = rising_series(&[900.0, 1000.0, 1100.0, 1200.0, 1300.0]);
        assert!(log.evaluate_trends([&flat, &short, &over], &thresholds, Utc::now()).is_empty());
    }

    #[test]
    fn test_limit_proximity() {
        let limits = AlertThresholds::default();
        let rt = limits.limit_for(MetricKind::ResponseTime).unwrap();
        assert!((rt.proximity(900.0) - 0.9).abs() < 1e-9);
        let hit = limits.limit_for(MetricKind::CacheHitRate).unwrap();
        assert!(hit.proximity(0.75) < 1.0);
        assert!(hit.violated_by(0.5));
    }
}
