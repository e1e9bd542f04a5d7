//! The quality-check contract.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::ChangeContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckCategory {
    Structure,
    TypeSafety,
    Performance,
    Security,
    Documentation,
    Integration,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Weight of a check of this severity in the overall score.
    pub fn weight(self) -> f64 {
        match self {
            Self::Critical => 1.0,
            Self::High => 0.8,
            Self::Medium => 0.6,
            Self::Low => 0.4,
        }
    }

    /// Critical and high findings block a change.
    pub fn is_blocking(self) -> bool {
        self >= Self::High
    }
}

impl fmt::Display for Severity {
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effort {
    Low,
    Medium,
    High,
}

/// An actionable problem reported by a check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub check_id: String,
    pub severity: Severity,
    pub message: String,
    pub file: Option<String>,
    pub line: Option<usize>,
    pub suggestion: String,
    pub impact: String,
    pub effort: Effort,
}

impl Finding {
    pub fn new(check_id: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            check_id: check_id.into(),
            severity,
            message: message.into(),
            file: None,
            line: None,
            suggestion: String::new(),
            impact: String::new(),
            effort: Effort::Low,
        }
    }

    pub fn at(mut self, file: impl Into<String>, line: Option<usize>) -> Self {
        self.file = Some(file.into());
        self.line = line;
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = suggestion.into();
        self
    }

    pub fn with_impact(mut self, impact: impl Into<String>, effort: Effort) -> Self {
        self.impact = impact.into();
        self.effort = effort;
        self
    }
}

/// Static description of a check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckSpec {
    pub id: String,
    pub name: String,
    pub category: CheckCategory,
    pub severity: Severity,
    pub timeout_ms: u64,
    /// Extra attempts after a timeout or error.
    pub retries: u32,
    /// Checks that must pass before this one runs.
    pub dependencies: Vec<String>,
}

impl CheckSpec {
    pub fn new(id: impl Into<String>, name: impl Into<String>, category: CheckCategory, severity: Severity) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            severity,
            timeout_ms: 30_000,
            retries: 0,
            dependencies: Vec::new(),
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// What one run of a check produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub passed: bool,
    /// 0.0 - 1.0.
    pub score: f64,
    pub findings: Vec<Finding>,
}

impl CheckOutcome {
    pub fn pass() -> Self {
        Self {
            passed: true,
            score: 1.0,
            findings: Vec::new(),
        }
    }

    /// Passed unless a finding blocks; score reduced by `penalty` per finding
    /// weighted by severity.
    pub fn from_findings(findings: Vec<Finding>, penalty: f64) -> Self {
        let deduction: f64 = findings.iter().map(|f| penalty * f.severity.weight()).sum();
        Self {
            passed: !findings.iter().any(|f| f.severity.is_blocking()),
            score: (1.0 - deduction).clamp(0.0, 1.0),
            findings,
        }
    }
}

/// A unit of validation run by the gate.
///
/// Errors returned from `run` count as framework failures: the gate retries
/// them up to `spec().retries` times, then records a critical finding.
#[async_trait]
pub trait QualityCheck: Send + Sync {
    fn spec(&self) -> &CheckSpec;

    async fn run(&self, context: &ChangeContext) -> anyhow::Result<CheckOutcome>;
}
