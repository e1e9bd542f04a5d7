//! Optimization Orchestrator.
//!
//! [`PerformanceOptimizer`] owns the cache, compactor, loader and monitor and
//! runs full cycles over them: benchmark, retune each area, re-sample
//! metrics, recommend, benchmark again. Only one cycle runs at a time.

pub mod benchmark;
pub mod error;
pub mod orchestrator;
pub mod probe;

pub use benchmark::{composite_score, BenchmarkResult};
pub use error::{OptimizerError, OptimizerResult};
pub use orchestrator::{
    recommend, Improvement, OptimizationArea, OptimizationResult, OptimizationStatus, OptimizerConfig,
    OptimizerStatistics, PerformanceOptimizer, RecommendationThresholds,
};
pub use probe::EngineProbe;
