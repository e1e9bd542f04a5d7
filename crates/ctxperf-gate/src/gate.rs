//! Quality gate runner: ordering, execution, scoring and approval.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use ctxperf_core::obs::emit_gate_evaluated;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::check::{CheckOutcome, Effort, Finding, QualityCheck, Severity};
use crate::checks::{DocumentationCheck, PerformanceRegressionCheck, SecurityCheck, StructureCheck, TypeSafetyCheck};
use crate::probes::BenchmarkProbe;
use crate::context::ChangeContext;
use crate::error::{GateError, GateResult};
use crate::result::{weighted_score, CheckRecord, CheckStatus, QualityAssuranceResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Minimum overall score to pass, 0.0 - 1.0.
    pub min_score: f64,
    /// Scores below this need manual approval.
    pub auto_approve_threshold: f64,
    pub require_manual_approval: bool,
    /// Stop at the first failed critical check.
    pub strict_mode: bool,
    /// Allowed relative benchmark degradation.
    pub regression_tolerance: f64,
    /// Benchmark score to compare against; the first measurement otherwise.
    pub baseline_score: Option<f64>,
    pub max_file_lines: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            min_score: 0.8,
            auto_approve_threshold: 0.9,
            require_manual_approval: false,
            strict_mode: false,
            regression_tolerance: 0.1,
            baseline_score: None,
            max_file_lines: 1000,
        }
    }
}

/// Registered checks plus the policy that turns their results into a verdict.
pub struct QualityGate {
    config: GateConfig,
    checks: Vec<Arc<dyn QualityCheck>>,
}

impl std::fmt::Debug for QualityGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QualityGate")
            .field("config", &self.config)
            .field("checks", &self.check_ids())
            .finish()
    }
}

impl QualityGate {
    pub fn new(config: GateConfig) -> Self {
        Self {
            config,
            checks: Vec::new(),
        }
    }

    /// Gate with the static analysis checks registered: structure,
    /// type safety, security and documentation. Benchmark and integration
    /// checks need probes and are added with [`Self::add_quality_check`].
    pub fn with_default_checks(config: GateConfig) -> GateResult<Self> {
        let mut gate = Self::new(config);
        gate.add_quality_check(Arc::new(StructureCheck::new(gate.config.max_file_lines)?))?;
        gate.add_quality_check(Arc::new(TypeSafetyCheck::new()?))?;
        gate.add_quality_check(Arc::new(SecurityCheck::new()?))?;
        gate.add_quality_check(Arc::new(DocumentationCheck::new()?))?;
        Ok(gate)
    }

    /// Add a regression check against `probe`, using the configured
    /// tolerance and baseline.
    pub fn add_benchmark_check(&mut self, probe: Arc<dyn BenchmarkProbe>) -> GateResult<()> {
        let check = PerformanceRegressionCheck::new(probe, self.config.regression_tolerance, self.config.baseline_score);
        self.add_quality_check(Arc::new(check))
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn add_quality_check(&mut self, check: Arc<dyn QualityCheck>) -> GateResult<()> {
        let id = &check.spec().id;
        if self.checks.iter().any(|c| &c.spec().id == id) {
            return Err(GateError::DuplicateCheck { id: id.clone() });
        }
        debug!(check = %id, "quality check registered");
        self.checks.push(check);
        Ok(())
    }

    pub fn check_ids(&self) -> Vec<String> {
        self.checks.iter().map(|c| c.spec().id.clone()).collect()
    }

    /// Registered checks ordered so every dependency precedes its dependents.
    /// Ties keep registration order.
    pub fn execution_order(&self) -> GateResult<Vec<Arc<dyn QualityCheck>>> {
        let index: HashMap<&str, usize> = self
            .checks
            .iter()
            .enumerate()
            .map(|(i, c)| (c.spec().id.as_str(), i))
            .collect();

        for check in &self.checks {
            for dep in &check.spec().dependencies {
                if !index.contains_key(dep.as_str()) {
                    return Err(GateError::UnknownDependency {
                        check: check.spec().id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        let mut placed = vec![false; self.checks.len()];
        let mut order = Vec::with_capacity(self.checks.len());
        while order.len() < self.checks.len() {
            let next = (0..self.checks.len()).find(|&i| {
                !placed[i]
                    && self.checks[i]
                        .spec()
                        .dependencies
                        .iter()
                        .all(|d| placed[index[d.as_str()]])
            });
            match next {
                Some(i) => {
                    placed[i] = true;
                    order.push(Arc::clone(&self.checks[i]));
                }
                None => return Err(GateError::DependencyCycle { path: self.find_cycle(&placed, &index) }),
            }
        }
        Ok(order)
    }

    /// Walk unplaced dependencies from the first unplaced check until a
    /// check repeats.
    fn find_cycle(&self, placed: &[bool], index: &HashMap<&str, usize>) -> Vec<String> {
        let Some(mut current) = placed.iter().position(|p| !p) else {
            return Vec::new();
        };
        let mut path: Vec<usize> = Vec::new();
        loop {
            if let Some(pos) = path.iter().position(|&i| i == current) {
                let mut cycle: Vec<String> = path[pos..]
                    .iter()
                    .map(|&i| self.checks[i].spec().id.clone())
                    .collect();
                cycle.push(self.checks[current].spec().id.clone());
                return cycle;
            }
            path.push(current);
            let spec = self.checks[current].spec();
            match spec
                .dependencies
                .iter()
                .map(|d| index[d.as_str()])
                .find(|&i| !placed[i])
            {
                Some(next) => current = next,
                None => return path.iter().map(|&i| self.checks[i].spec().id.clone()).collect(),
            }
        }
    }

    /// Run every check against `context` and decide the change.
    pub async fn run_pre_commit_validation(&self, context: &ChangeContext) -> GateResult<QualityAssuranceResult> {
        let order = self.execution_order()?;
        let evaluation_id = Uuid::new_v4();
        info!(evaluation_id = %evaluation_id, checks = order.len(), branch = %context.branch, "quality gate started");

        let mut records: Vec<CheckRecord> = Vec::with_capacity(order.len());
        let mut statuses: HashMap<String, CheckStatus> = HashMap::new();
        let mut halted = false;

        for check in &order {
            let spec = check.spec();
            let record = if halted {
                skipped(check.as_ref(), CheckStatus::Skipped)
            } else if let Some(dep) = spec
                .dependencies
                .iter()
                .find(|d| !statuses.get(d.as_str()).is_some_and(|s| s.is_success()))
            {
                debug!(check = %spec.id, dependency = %dep, "check blocked by dependency");
                skipped(check.as_ref(), CheckStatus::Blocked)
            } else {
                execute(check.as_ref(), context).await
            };

            if self.config.strict_mode && record.status == CheckStatus::Failed && spec.severity == Severity::Critical
            {
                warn!(check = %spec.id, "critical check failed in strict mode, halting");
                halted = true;
            }
            statuses.insert(spec.id.clone(), record.status);
            records.push(record);
        }

        let result = self.decide(evaluation_id, context, records, halted);
        emit_gate_evaluated(&evaluation_id.to_string(), result.overall_score, result.passed);
        Ok(result)
    }

    fn decide(
        &self,
        evaluation_id: Uuid,
        context: &ChangeContext,
        checks: Vec<CheckRecord>,
        halted: bool,
    ) -> QualityAssuranceResult {
        let overall_score = weighted_score(&checks);
        let (blockers, warnings): (Vec<Finding>, Vec<Finding>) = checks
            .iter()
            .flat_map(|c| c.findings.iter().cloned())
            .partition(|f| f.severity.is_blocking());

        let requires_approval = self.config.require_manual_approval
            || overall_score < self.config.auto_approve_threshold
            || !blockers.is_empty();
        let approved = context.approved_by.is_some();
        let critical_blocker = blockers.iter().any(|f| f.severity == Severity::Critical);
        let critical_failed = checks
            .iter()
            .any(|c| c.severity == Severity::Critical && c.status == CheckStatus::Failed);
        let passed = overall_score >= self.config.min_score
            && !critical_blocker
            && !critical_failed
            && !halted
            && (!requires_approval || approved);

        QualityAssuranceResult {
            evaluation_id,
            timestamp: Utc::now(),
            passed,
            overall_score,
            checks,
            blockers,
            warnings,
            requires_approval,
            approved,
            approved_by: context.approved_by.clone(),
            halted,
        }
    }
}

fn skipped(check: &dyn QualityCheck, status: CheckStatus) -> CheckRecord {
    let spec = check.spec();
    CheckRecord {
        id: spec.id.clone(),
        name: spec.name.clone(),
        category: spec.category,
        severity: spec.severity,
        status,
        score: 0.0,
        findings: Vec::new(),
        attempts: 0,
        duration_ms: 0,
        error: None,
    }
}

/// Run one check with its timeout, retrying timeouts and errors.
async fn execute(check: &dyn QualityCheck, context: &ChangeContext) -> CheckRecord {
    let spec = check.spec();
    let started = Instant::now();
    let attempts_allowed = spec.retries + 1;
    let mut attempts = 0;
    let mut last_error = String::new();

    let outcome = loop {
        attempts += 1;
        match tokio::time::timeout(spec.timeout(), check.run(context)).await {
            Ok(Ok(outcome)) => break Some(outcome),
            Ok(Err(e)) => last_error = format!("{e:#}"),
            Err(_) => last_error = format!("timed out after {}ms", spec.timeout_ms),
        }
        warn!(check = %spec.id, attempt = attempts, error = %last_error, "quality check attempt failed");
        if attempts >= attempts_allowed {
            break None;
        }
    };

    let (status, score, findings, error) = match outcome {
        Some(CheckOutcome {
            passed,
            score,
            mut findings,
        }) => {
            if !passed && findings.is_empty() {
                findings.push(
                    Finding::new(&spec.id, spec.severity, format!("{} failed", spec.name))
                        .with_suggestion("inspect the check's output and fix the reported condition"),
                );
            }
            let status = match passed {
                false => CheckStatus::Failed,
                true if findings.is_empty() || findings.iter().any(|f| f.severity.is_blocking()) => CheckStatus::Passed,
                true => CheckStatus::Warning,
            };
            (status, score.clamp(0.0, 1.0), findings, None)
        }
        None => {
            let finding = Finding::new(&spec.id, Severity::Critical, format!("framework error: {last_error}"))
                .with_suggestion("make the check complete within its timeout without erroring")
                .with_impact("the change could not be validated", Effort::Medium);
            (CheckStatus::Failed, 0.0, vec![finding], Some(last_error))
        }
    };

    debug!(check = %spec.id, status = ?status, score, attempts, "quality check finished");
    CheckRecord {
        id: spec.id.clone(),
        name: spec.name.clone(),
        category: spec.category,
        severity: spec.severity,
        status,
        score,
        findings,
        attempts,
        duration_ms: started.elapsed().as_millis() as u64,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::{CheckCategory, CheckSpec};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn ids_with_status(records: &[CheckRecord], status: CheckStatus) -> HashSet<&str> {
        records
            .iter()
            .filter(|r| r.status == status)
            .map(|r| r.id.as_str())
            .collect()
    }

    struct Fixed {
        spec: CheckSpec,
        outcome: CheckOutcome,
    }

    #[async_trait]
    impl QualityCheck for Fixed {
        fn spec(&self) -> &CheckSpec {
            &self.spec
        }

        async fn run(&self, _context: &ChangeContext) -> anyhow::Result<CheckOutcome> {
            Ok(self.outcome.clone())
        }
    }

    fn fixed(id: &str, severity: Severity, passed: bool, deps: &[&str]) -> Arc<dyn QualityCheck> {
        Arc::new(Fixed {
            spec: CheckSpec::new(id, id, CheckCategory::Custom, severity).with_dependencies(deps.iter().copied()),
            outcome: CheckOutcome {
                passed,
                score: if passed { 1.0 } else { 0.0 },
                findings: Vec::new(),
            },
        })
    }

    struct Flaky {
        spec: CheckSpec,
        calls: AtomicU32,
        succeed_on: u32,
    }

    #[async_trait]
    impl QualityCheck for Flaky {
        fn spec(&self) -> &CheckSpec {
            &self.spec
        }

        async fn run(&self, _context: &ChangeContext) -> anyhow::Result<CheckOutcome> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call < self.succeed_on {
                tokio::time::sleep(Duration::from_secs(10)).await;
            }
            Ok(CheckOutcome::pass())
        }
    }

    fn context() -> ChangeContext {
        ChangeContext::new("feature/x", "dev", "change")
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut gate = QualityGate::new(GateConfig::default());
        gate.add_quality_check(fixed("a", Severity::Low, true, &[])).unwrap();
        let err = gate.add_quality_check(fixed("a", Severity::Low, true, &[])).unwrap_err();
        assert!(matches!(err, GateError::DuplicateCheck { .. }));
    }

    #[test]
    fn test_order_respects_dependencies() {
        let mut gate = QualityGate::new(GateConfig::default());
        gate.add_quality_check(fixed("c", Severity::Low, true, &["b"])).unwrap();
        gate.add_quality_check(fixed("a", Severity::Low, true, &[])).unwrap();
        gate.add_quality_check(fixed("b", Severity::Low, true, &["a"])).unwrap();
        let order: Vec<String> = gate
            .execution_order()
            .unwrap()
            .iter()
            .map(|c| c.spec().id.clone())
            .collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_unknown_dependency_and_cycle() {
        let mut gate = QualityGate::new(GateConfig::default());
        gate.add_quality_check(fixed("a", Severity::Low, true, &["ghost"])).unwrap();
        assert!(matches!(gate.execution_order(), Err(GateError::UnknownDependency { .. })));

        let mut gate = QualityGate::new(GateConfig::default());
        gate.add_quality_check(fixed("a", Severity::Low, true, &["b"])).unwrap();
        gate.add_quality_check(fixed("b", Severity::Low, true, &["a"])).unwrap();
        match gate.execution_order().err() {
            Some(GateError::DependencyCycle { path }) => assert_eq!(path, vec!["a", "b", "a"]),
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failed_dependency_blocks_dependent() {
        let mut gate = QualityGate::new(GateConfig::default());
        gate.add_quality_check(fixed("base", Severity::Medium, false, &[])).unwrap();
        gate.add_quality_check(fixed("child", Severity::High, true, &["base"])).unwrap();

        let result = gate.run_pre_commit_validation(&context()).await.unwrap();
        assert_eq!(result.check("child").unwrap().status, CheckStatus::Blocked);
        assert_eq!(result.overall_score, 0.0);
        assert_eq!(result.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_warning_dependency_lets_dependent_run() {
        let mut gate = QualityGate::new(GateConfig::default());
        gate.add_quality_check(Arc::new(Fixed {
            spec: CheckSpec::new("lint", "Lint", CheckCategory::Custom, Severity::Medium),
            outcome: CheckOutcome::from_findings(vec![Finding::new("lint", Severity::Low, "style")], 0.1),
        }))
        .unwrap();
        gate.add_quality_check(fixed("tests", Severity::High, true, &["lint"])).unwrap();

        let result = gate.run_pre_commit_validation(&context()).await.unwrap();
        assert_eq!(result.check("lint").unwrap().status, CheckStatus::Warning);
        assert_eq!(result.check("tests").unwrap().status, CheckStatus::Passed);
        assert!(result.passed);
    }

    #[tokio::test]
    async fn test_failed_critical_check_fails_gate() {
        let mut gate = QualityGate::new(GateConfig::default());
        gate.add_quality_check(Arc::new(Fixed {
            spec: CheckSpec::new("policy", "Policy", CheckCategory::Custom, Severity::Critical),
            outcome: CheckOutcome {
                passed: false,
                score: 0.95,
                findings: vec![Finding::new("policy", Severity::Low, "minor")],
            },
        }))
        .unwrap();

        let result = gate.run_pre_commit_validation(&context()).await.unwrap();
        assert!(result.blockers.is_empty());
        assert!(!result.passed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeouts_retried_then_framework_error() {
        let mut gate = QualityGate::new(GateConfig::default());
        gate.add_quality_check(Arc::new(Flaky {
            spec: CheckSpec::new("flaky", "Flaky", CheckCategory::Custom, Severity::Low)
                .with_timeout_ms(100)
                .with_retries(1),
            calls: AtomicU32::new(0),
            succeed_on: 5,
        }))
        .unwrap();

        let result = gate.run_pre_commit_validation(&context()).await.unwrap();
        let record = result.check("flaky").unwrap();
        assert_eq!(record.status, CheckStatus::Failed);
        assert_eq!(record.attempts, 2);
        assert!(record.error.as_deref().unwrap().contains("timed out"));
        assert!(result.has_critical_blocker());
        assert!(!result.passed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers() {
        let mut gate = QualityGate::new(GateConfig::default());
        gate.add_quality_check(Arc::new(Flaky {
            spec: CheckSpec::new("flaky", "Flaky", CheckCategory::Custom, Severity::Low)
                .with_timeout_ms(100)
                .with_retries(2),
            calls: AtomicU32::new(0),
            succeed_on: 2,
        }))
        .unwrap();

        let result = gate.run_pre_commit_validation(&context()).await.unwrap();
        let record = result.check("flaky").unwrap();
        assert_eq!(record.status, CheckStatus::Passed);
        assert_eq!(record.attempts, 2);
        assert!(result.passed);
    }

    #[tokio::test]
    async fn test_strict_mode_halts_after_critical_failure() {
        let mut gate = QualityGate::new(GateConfig {
            strict_mode: true,
            ..Default::default()
        });
        gate.add_quality_check(fixed("secrets", Severity::Critical, false, &[])).unwrap();
        gate.add_quality_check(fixed("docs", Severity::Low, true, &[])).unwrap();

        let result = gate.run_pre_commit_validation(&context()).await.unwrap();
        assert!(result.halted);
        assert_eq!(result.check("docs").unwrap().status, CheckStatus::Skipped);
        assert_eq!(ids_with_status(&result.checks, CheckStatus::Failed).len(), 1);
    }

    #[tokio::test]
    async fn test_approval_rules() {
        let mut gate = QualityGate::new(GateConfig::default());
        gate.add_quality_check(fixed("good", Severity::High, true, &[])).unwrap();
        gate.add_quality_check(fixed("meh", Severity::Low, false, &[])).unwrap();

        // 0.8 / 1.2 is below auto-approval and below the minimum
        let result = gate.run_pre_commit_validation(&context()).await.unwrap();
        assert!(result.requires_approval);
        assert!(!result.passed);

        let mut gate = QualityGate::new(GateConfig {
            require_manual_approval: true,
            ..Default::default()
        });
        gate.add_quality_check(fixed("good", Severity::High, true, &[])).unwrap();
        let unapproved = gate.run_pre_commit_validation(&context()).await.unwrap();
        assert!(unapproved.requires_approval);
        assert!(!unapproved.passed);

        let approved = gate
            .run_pre_commit_validation(&context().approved_by("lead"))
            .await
            .unwrap();
        assert!(approved.passed);
        assert_eq!(approved.approved_by.as_deref(), Some("lead"));
    }
}
