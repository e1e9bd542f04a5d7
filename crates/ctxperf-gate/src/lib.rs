//! ctxperf-gate: pre-commit quality gate
//!
//! Runs registered quality checks over a change in dependency order, folds
//! their scores into a severity-weighted overall score and decides whether
//! the change passes, needs approval, or is blocked.

pub mod check;
pub mod checks;
pub mod context;
pub mod error;
pub mod gate;
pub mod probes;
pub mod result;

pub use check::{CheckCategory, CheckOutcome, CheckSpec, Effort, Finding, QualityCheck, Severity};
pub use checks::{
    DocumentationCheck, IntegrationCheck, PerformanceRegressionCheck, SecurityCheck, StructureCheck,
    TypeSafetyCheck,
};
pub use context::{ChangeContext, ChangedFile, FileStatus};
pub use error::{GateError, GateResult};
pub use gate::{GateConfig, QualityGate};
pub use probes::{BenchmarkProbe, CommandSuite, IntegrationSuite, IntegrationTest, OptimizerBenchmark, TestRun};
pub use result::{weighted_score, CheckRecord, CheckStatus, QualityAssuranceResult};
