//! Built-in quality checks.

pub mod documentation;
pub mod integration;
pub mod performance;
pub mod security;
pub mod structure;
pub mod type_safety;

pub use documentation::DocumentationCheck;
pub use integration::IntegrationCheck;
pub use performance::PerformanceRegressionCheck;
pub use security::SecurityCheck;
pub use structure::StructureCheck;
pub use type_safety::TypeSafetyCheck;

use regex::Regex;

use crate::check::{Finding, Severity};
use crate::context::ChangeContext;
use crate::error::GateResult;

/// A line-level pattern that produces a finding on every match.
#[derive(Debug)]
pub(crate) struct LineRule {
    pattern: Regex,
    severity: Severity,
    message: &'static str,
    suggestion: &'static str,
    /// Extensions the rule applies to; empty means every file.
    extensions: &'static [&'static str],
}

impl LineRule {
    pub(crate) fn new(
        pattern: &str,
        severity: Severity,
        message: &'static str,
        suggestion: &'static str,
        extensions: &'static [&'static str],
    ) -> GateResult<Self> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            severity,
            message,
            suggestion,
            extensions,
        })
    }

    fn applies_to(&self, extension: Option<&str>) -> bool {
        self.extensions.is_empty() || extension.is_some_and(|e| self.extensions.contains(&e))
    }
}

/// Every rule match across the loaded contents of `context`, in file then
/// line order.
pub(crate) fn scan(check_id: &str, rules: &[LineRule], context: &ChangeContext) -> Vec<Finding> {
    let mut findings = Vec::new();
    for file in &context.files {
        let Some(text) = file.text() else {
            continue;
        };
        let rules: Vec<&LineRule> = rules.iter().filter(|r| r.applies_to(file.extension())).collect();
        if rules.is_empty() {
            continue;
        }
        for (n, line) in text.lines().enumerate() {
            for rule in &rules {
                if rule.pattern.is_match(line) {
                    findings.push(
                        Finding::new(check_id, rule.severity, rule.message)
                            .at(&file.path, Some(n + 1))
                            .with_suggestion(rule.suggestion),
                    );
                }
            }
        }
    }
    findings
}
