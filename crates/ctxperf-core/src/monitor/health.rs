//! Health scoring from active alerts and current threshold checks.

use serde::{Deserialize, Serialize};

use super::alerts::{Alert, AlertSeverity, AlertThresholds};
use super::snapshot::{MetricKind, MetricsSnapshot};

const CRITICAL_ALERT_PENALTY: f64 = 25.0;
const HIGH_ALERT_PENALTY: f64 = 15.0;
const MEDIUM_ALERT_PENALTY: f64 = 5.0;
const VIOLATION_PENALTY: f64 = 10.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    #[default]
    Healthy,
    Warning,
    Critical,
}

/// Status of one thresholded metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub metric: MetricKind,
    pub status: HealthStatus,
    pub value: Option<f64>,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthAssessment {
    /// 0 - 100.
    pub score: f64,
    pub status: HealthStatus,
    pub components: Vec<ComponentHealth>,
    pub active_alerts: usize,
}

/// Score health starting from 100.
///
/// Each active critical, high and medium alert costs 25, 15 and 5 points;
/// each metric currently past its threshold costs 10. Critical below 50 or
/// with any critical alert, warning below 80 or with any high alert.
pub fn assess<'a, I>(
    snapshot: Option<&MetricsSnapshot>,
    active_alerts: I,
    thresholds: &AlertThresholds,
) -> HealthAssessment
where
    I: IntoIterator<Item = &'a Alert>,
{
    let mut score: f64 = 100.0;
    let mut active = 0;
    let mut any_critical = false;
    let mut any_high = false;
    for alert in active_alerts {
        active += 1;
        score -= match alert.severity {
            AlertSeverity::Critical => {
                any_critical = true;
                CRITICAL_ALERT_PENALTY
            }
            AlertSeverity::High => {
                any_high = true;
                HIGH_ALERT_PENALTY
            }
            AlertSeverity::Medium => MEDIUM_ALERT_PENALTY,
            AlertSeverity::Low => 0.0,
        };
    }

    let components: Vec<ComponentHealth> = thresholds
        .limits()
        .into_iter()
        .map(|limit| {
            let value = snapshot.and_then(|s| s.value(limit.metric));
            let status = match value {
                Some(v) if limit.violated_by(v) => {
                    score -= VIOLATION_PENALTY;
                    if limit.severity == AlertSeverity::Critical {
                        HealthStatus::Critical
                    } else {
                        HealthStatus::Warning
                    }
                }
                _ => HealthStatus::Healthy,
            };
            ComponentHealth {
                metric: limit.metric,
                status,
                value,
                threshold: limit.value,
            }
        })
        .collect();

    let score = score.clamp(0.0, 100.0);
    let status = if score < 50.0 || any_critical {
        HealthStatus::Critical
    } else if score < 80.0 || any_high {
        HealthStatus::Warning
    } else {
        HealthStatus::Healthy
    };

    HealthAssessment {
        score,
        status,
        components,
        active_alerts: active,
    }
}
