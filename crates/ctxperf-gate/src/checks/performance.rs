use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

use crate::check::{CheckCategory, CheckOutcome, CheckSpec, Effort, Finding, QualityCheck, Severity};
use crate::context::ChangeContext;
use crate::probes::BenchmarkProbe;

/// Compares a fresh benchmark against a baseline and fails on degradation
/// beyond `tolerance`.
///
/// Without a configured baseline, the first measurement becomes the
/// baseline and passes.
pub struct PerformanceRegressionCheck {
    spec: CheckSpec,
    probe: Arc<dyn BenchmarkProbe>,
    tolerance: f64,
    baseline: Mutex<Option<f64>>,
}

impl std::fmt::Debug for PerformanceRegressionCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerformanceRegressionCheck")
            .field("spec", &self.spec)
            .field("tolerance", &self.tolerance)
            .finish_non_exhaustive()
    }
}

impl PerformanceRegressionCheck {
    pub const ID: &'static str = "performance-regression";

    pub fn new(probe: Arc<dyn BenchmarkProbe>, tolerance: f64, baseline: Option<f64>) -> Self {
        Self {
            spec: CheckSpec::new(Self::ID, "Performance regression", CheckCategory::Performance, Severity::High)
                .with_timeout_ms(120_000)
                .with_retries(1),
            probe,
            tolerance,
            baseline: Mutex::new(baseline),
        }
    }

    pub async fn baseline(&self) -> Option<f64> {
        *self.baseline.lock().await
    }
}

#[async_trait]
impl QualityCheck for PerformanceRegressionCheck {
    fn spec(&self) -> &CheckSpec {
        &self.spec
    }

    async fn run(&self, _context: &ChangeContext) -> anyhow::Result<CheckOutcome> {
        let current = self.probe.measure().await?;
        let mut baseline = self.baseline.lock().await;

        let Some(base) = *baseline else {
            info!(score = current, "performance baseline recorded");
            *baseline = Some(current);
            return Ok(CheckOutcome::pass());
        };
        if base <= 0.0 {
            return Ok(CheckOutcome::pass());
        }

        let degradation = (base - current) / base;
        let score = (current / base).clamp(0.0, 1.0);
        if degradation > self.tolerance {
            let finding = Finding::new(
                Self::ID,
                Severity::High,
                format!(
                    "benchmark score dropped {:.1}% (baseline {base:.3}, now {current:.3})",
                    degradation * 100.0
                ),
            )
            .with_suggestion("profile the changed paths against the baseline build")
            .with_impact("slower responses for every request", Effort::Medium);
            return Ok(CheckOutcome {
                passed: false,
                score,
                findings: vec![finding],
            });
        }

        Ok(CheckOutcome {
            passed: true,
            score,
            findings: Vec::new(),
        })
    }
}
