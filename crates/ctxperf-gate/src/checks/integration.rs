use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use tracing::debug;

use crate::check::{CheckCategory, CheckOutcome, CheckSpec, Effort, Finding, QualityCheck, Severity};
use crate::context::ChangeContext;
use crate::probes::{IntegrationSuite, IntegrationTest};

/// Runs the integration tests whose paths the change touches.
pub struct IntegrationCheck {
    spec: CheckSpec,
    suite: Arc<dyn IntegrationSuite>,
    tests: Vec<IntegrationTest>,
}

impl std::fmt::Debug for IntegrationCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrationCheck")
            .field("spec", &self.spec)
            .field("tests", &self.tests)
            .finish_non_exhaustive()
    }
}

impl IntegrationCheck {
    pub const ID: &'static str = "integration";

    pub fn new(suite: Arc<dyn IntegrationSuite>, tests: Vec<IntegrationTest>) -> Self {
        // long enough for the slowest test; they run concurrently
        let timeout_ms = tests.iter().map(|t| t.timeout_ms).max().unwrap_or(0) + 5_000;
        Self {
            spec: CheckSpec::new(Self::ID, "Integration tests", CheckCategory::Integration, Severity::High)
                .with_timeout_ms(timeout_ms),
            suite,
            tests,
        }
    }

    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec = self.spec.with_dependencies(dependencies);
        self
    }
}

#[async_trait]
impl QualityCheck for IntegrationCheck {
    fn spec(&self) -> &CheckSpec {
        &self.spec
    }

    async fn run(&self, context: &ChangeContext) -> anyhow::Result<CheckOutcome> {
        let selected: Vec<&IntegrationTest> = self
            .tests
            .iter()
            .filter(|t| t.applies_to(context.files.iter().map(|f| f.path.as_str())))
            .collect();
        debug!(selected = selected.len(), total = self.tests.len(), "integration tests selected");
        if selected.is_empty() {
            return Ok(CheckOutcome::pass());
        }

        let runs = try_join_all(selected.iter().map(|t| self.suite.run(t))).await?;
        let passed = runs.iter().filter(|r| r.passed).count();
        let findings: Vec<Finding> = runs
            .iter()
            .filter(|r| !r.passed)
            .map(|r| {
                Finding::new(
                    Self::ID,
                    Severity::High,
                    format!("integration test {} failed (exit {}): {}", r.name, r.exit_code, r.output.trim()),
                )
                .with_suggestion(format!("run `{}` locally", r.name))
                .with_impact("changed paths break an integration contract", Effort::Medium)
            })
            .collect();

        Ok(CheckOutcome {
            passed: findings.is_empty(),
            score: passed as f64 / runs.len() as f64,
            findings,
        })
    }
}
