//! Per-check records and the aggregated gate result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::check::{CheckCategory, Finding, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Passed,
    /// Passed with non-blocking findings.
    Warning,
    Failed,
    /// A dependency did not pass.
    Blocked,
    /// Not run because strict mode halted the gate.
    Skipped,
}

impl CheckStatus {
    /// Whether the record contributes to the overall score.
    pub fn is_scored(self) -> bool {
        matches!(self, Self::Passed | Self::Warning | Self::Failed)
    }

    /// Whether dependents may run.
    pub fn is_success(self) -> bool {
        matches!(self, Self::Passed | Self::Warning)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckRecord {
    pub id: String,
    pub name: String,
    pub category: CheckCategory,
    pub severity: Severity,
    pub status: CheckStatus,
    pub score: f64,
    pub findings: Vec<Finding>,
    pub attempts: u32,
    pub duration_ms: u64,
    /// Last framework error, when every attempt failed.
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAssuranceResult {
    pub evaluation_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub passed: bool,
    /// Severity-weighted mean of scored checks, 0.0 - 1.0.
    pub overall_score: f64,
    pub checks: Vec<CheckRecord>,
    /// Critical and high findings.
    pub blockers: Vec<Finding>,
    /// Medium and low findings.
    pub warnings: Vec<Finding>,
    pub requires_approval: bool,
    pub approved: bool,
    pub approved_by: Option<String>,
    /// Strict mode stopped the run after a critical failure.
    pub halted: bool,
}

impl QualityAssuranceResult {
    pub fn check(&self, id: &str) -> Option<&CheckRecord> {
        self.checks.iter().find(|c| c.id == id)
    }

    pub fn has_critical_blocker(&self) -> bool {
        self.blockers.iter().any(|f| f.severity == Severity::Critical)
    }
}

/// Severity-weighted mean score. 1.0 when nothing was scored.
pub fn weighted_score(records: &[CheckRecord]) -> f64 {
    let (total, weights) = records
        .iter()
        .filter(|r| r.status.is_scored())
        .fold((0.0, 0.0), |(total, weights), r| {
            let w = r.severity.weight();
            (total + w * r.score, weights + w)
        });
    if weights == 0.0 {
        1.0
    } else {
        total / weights
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(severity: Severity, status: CheckStatus, score: f64) -> CheckRecord {
        CheckRecord {
            id: format!("{severity}-{score}"),
            name: String::new(),
            category: CheckCategory::Custom,
            severity,
            status,
            score,
            findings: Vec::new(),
            attempts: 1,
            duration_ms: 0,
            error: None,
        }
    }

    #[test]
    fn test_weighted_score() {
        let records = vec![
            record(Severity::Critical, CheckStatus::Passed, 1.0),
            record(Severity::Low, CheckStatus::Failed, 0.0),
            record(Severity::High, CheckStatus::Blocked, 0.0),
        ];
        assert!((weighted_score(&records) - 1.0 / 1.4).abs() < 1e-9);
        assert_eq!(weighted_score(&[]), 1.0);
    }
}
