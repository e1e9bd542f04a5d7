//! Gate scenarios through the public API.

use std::sync::Arc;

use async_trait::async_trait;
use ctxperf_core::{EngineConfig, PerformanceOptimizer};
use ctxperf_gate::{
    ChangeContext, ChangedFile, CheckCategory, CheckOutcome, CheckSpec, CheckStatus, DocumentationCheck, Finding,
    GateConfig, IntegrationCheck, IntegrationSuite, IntegrationTest, OptimizerBenchmark,
    QualityCheck, QualityGate, SecurityCheck, Severity, TestRun, TypeSafetyCheck,
};

struct AlwaysFails {
    spec: CheckSpec,
}

#[async_trait]
impl QualityCheck for AlwaysFails {
    fn spec(&self) -> &CheckSpec {
        &self.spec
    }

    async fn run(&self, _context: &ChangeContext) -> anyhow::Result<CheckOutcome> {
        Ok(CheckOutcome {
            passed: false,
            score: 0.0,
            findings: vec![Finding::new(&self.spec.id, Severity::Critical, "release blocker")
                .with_suggestion("fix it")],
        })
    }
}

/// Fails while reporting only a minor finding and a high score.
struct FailsQuietly {
    spec: CheckSpec,
}

#[async_trait]
impl QualityCheck for FailsQuietly {
    fn spec(&self) -> &CheckSpec {
        &self.spec
    }

    async fn run(&self, _context: &ChangeContext) -> anyhow::Result<CheckOutcome> {
        Ok(CheckOutcome {
            passed: false,
            score: 0.95,
            findings: vec![Finding::new(&self.spec.id, Severity::Low, "license header missing")],
        })
    }
}

struct Broken;

#[async_trait]
impl QualityCheck for Broken {
    fn spec(&self) -> &CheckSpec {
        static SPEC: std::sync::OnceLock<CheckSpec> = std::sync::OnceLock::new();
        SPEC.get_or_init(|| {
            CheckSpec::new("broken", "Broken", CheckCategory::Custom, Severity::Low).with_retries(2)
        })
    }

    async fn run(&self, _context: &ChangeContext) -> anyhow::Result<CheckOutcome> {
        anyhow::bail!("lint binary missing")
    }
}

struct PassingSuite;

#[async_trait]
impl IntegrationSuite for PassingSuite {
    async fn run(&self, test: &IntegrationTest) -> anyhow::Result<TestRun> {
        Ok(TestRun {
            name: test.name.clone(),
            passed: true,
            exit_code: 0,
            duration_ms: 3,
            output: String::new(),
        })
    }
}

fn clean_change() -> ChangeContext {
    ChangeContext::new("feature/cache", "dev", "tune cache eviction")
        .with_file(ChangedFile::modified(
            "src/cache/store.rs",
            "/// Evict a batch.\npub fn evict_batch(n: usize) -> usize {\n    n / 10\n}\n",
        ))
        .with_file(ChangedFile::modified("docs/cache.md", "Eviction runs in batches."))
}

#[tokio::test]
async fn test_critical_failure_blocks_the_change() {
    let mut gate = QualityGate::new(GateConfig::default());
    gate.add_quality_check(Arc::new(AlwaysFails {
        spec: CheckSpec::new("release", "Release", CheckCategory::Custom, Severity::Critical),
    }))
    .unwrap();

    let result = gate.run_pre_commit_validation(&clean_change()).await.unwrap();
    assert!(!result.passed);
    assert_eq!(result.blockers.len(), 1);
    assert_eq!(result.blockers[0].check_id, "release");
    assert_eq!(result.blockers[0].suggestion, "fix it");
    assert!(result.requires_approval);
}

#[tokio::test]
async fn test_failed_critical_check_fails_despite_high_score() {
    let mut gate = QualityGate::new(GateConfig::default());
    gate.add_quality_check(Arc::new(FailsQuietly {
        spec: CheckSpec::new("compliance", "Compliance", CheckCategory::Custom, Severity::Critical),
    }))
    .unwrap();

    let result = gate.run_pre_commit_validation(&clean_change()).await.unwrap();
    assert_eq!(result.check("compliance").unwrap().status, CheckStatus::Failed);
    assert!((result.overall_score - 0.95).abs() < 1e-9);
    assert!(result.blockers.is_empty());
    assert!(!result.passed);
}

#[tokio::test]
async fn test_undocumented_pub_fn_is_a_warning() {
    let gate = QualityGate::with_default_checks(GateConfig::default()).unwrap();
    let change = clean_change().with_file(ChangedFile::added("src/api.rs", "pub fn bare() {}\n"));

    let result = gate.run_pre_commit_validation(&change).await.unwrap();
    let docs = result.check(DocumentationCheck::ID).unwrap();
    assert_eq!(docs.status, CheckStatus::Warning);
    assert_eq!(docs.findings.len(), 1);
    assert_eq!(result.warnings.len(), 1);
    assert!(result.passed);
}

#[tokio::test]
async fn test_same_input_same_verdict() {
    let gate = QualityGate::with_default_checks(GateConfig::default()).unwrap();
    let change = clean_change().with_file(ChangedFile::added("src/util.rs", "let x = y.unwrap();\n"));

    let first = gate.run_pre_commit_validation(&change).await.unwrap();
    let second = gate.run_pre_commit_validation(&change).await.unwrap();
    assert_eq!(first.passed, second.passed);
    assert_eq!(first.overall_score, second.overall_score);
    assert_eq!(first.warnings, second.warnings);
    assert_ne!(first.evaluation_id, second.evaluation_id);
}

#[tokio::test]
async fn test_clean_change_auto_approves() {
    let gate = QualityGate::with_default_checks(GateConfig::default()).unwrap();
    let result = gate.run_pre_commit_validation(&clean_change()).await.unwrap();

    assert_eq!(result.overall_score, 1.0);
    assert!(!result.requires_approval);
    assert!(result.passed);
    assert_eq!(result.checks.len(), 4);
}

#[tokio::test]
async fn test_leaked_secret_fails_even_when_approved() {
    let gate = QualityGate::with_default_checks(GateConfig::default()).unwrap();
    let change = clean_change()
        .with_file(ChangedFile::added("src/keys.rs", "let password = \"hunter2hunter2\";\n"))
        .approved_by("lead");

    let result = gate.run_pre_commit_validation(&change).await.unwrap();
    assert!(result.approved);
    assert!(result.has_critical_blocker());
    assert!(!result.passed);
    assert_eq!(result.check(SecurityCheck::ID).unwrap().status, CheckStatus::Failed);
}

#[tokio::test]
async fn test_framework_error_after_retries() {
    let mut gate = QualityGate::new(GateConfig::default());
    gate.add_quality_check(Arc::new(Broken)).unwrap();

    let result = gate.run_pre_commit_validation(&clean_change()).await.unwrap();
    let record = result.check("broken").unwrap();
    assert_eq!(record.attempts, 3);
    assert_eq!(record.error.as_deref(), Some("lint binary missing"));
    assert!(result.blockers[0].message.starts_with("framework error"));
    assert!(!result.passed);
}

#[tokio::test]
async fn test_integration_blocked_by_failed_type_safety() {
    let mut gate = QualityGate::new(GateConfig::default());
    gate.add_quality_check(Arc::new(
        IntegrationCheck::new(Arc::new(PassingSuite), vec![IntegrationTest::new("all", ["true"])])
            .with_dependencies([TypeSafetyCheck::ID]),
    ))
    .unwrap();
    gate.add_quality_check(Arc::new(TypeSafetyCheck::new().unwrap())).unwrap();

    let unsafe_change = clean_change().with_file(ChangedFile::added("src/ffi.rs", "unsafe { libc::abort() }\n"));
    let result = gate.run_pre_commit_validation(&unsafe_change).await.unwrap();

    assert_eq!(result.checks[0].id, TypeSafetyCheck::ID);
    assert_eq!(result.check(IntegrationCheck::ID).unwrap().status, CheckStatus::Blocked);
    assert!(!result.passed);

    let result = gate.run_pre_commit_validation(&clean_change()).await.unwrap();
    assert_eq!(result.check(IntegrationCheck::ID).unwrap().status, CheckStatus::Passed);
    assert!(result.passed);
}

#[tokio::test]
async fn test_benchmark_check_against_engine() {
    let optimizer = Arc::new(PerformanceOptimizer::new(EngineConfig::default()));
    let mut gate = QualityGate::new(GateConfig {
        regression_tolerance: 1.0,
        ..Default::default()
    });
    gate.add_benchmark_check(Arc::new(OptimizerBenchmark::new(optimizer))).unwrap();

    // first run records the baseline
    let result = gate.run_pre_commit_validation(&clean_change()).await.unwrap();
    assert!(result.passed);
    let result = gate.run_pre_commit_validation(&clean_change()).await.unwrap();
    assert!(result.passed);
}
