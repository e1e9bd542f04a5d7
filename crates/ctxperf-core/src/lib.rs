//! ctxperf Core Library
//!
//! Performance engine for assistant context: a tunable cache, a token
//! compactor, a dependency-aware lazy loader, a metrics monitor and the
//! orchestrator that runs optimization cycles across them.

pub mod cache;
pub mod compactor;
pub mod config;
pub mod error;
pub mod loader;
pub mod monitor;
pub mod obs;
pub mod optimizer;
pub mod schedule;
pub mod telemetry;

pub use cache::{CacheConfig, CacheError, CacheStats, CacheStore, EntryMetadata, EvictionStrategy};

pub use compactor::{
    CompactorConfig, CompactorMetrics, ContextCompactor, ContextFragment, FragmentKind,
    TokenOptimization,
};

pub use config::EngineConfig;
pub use error::{EngineError, Result};

pub use loader::{
    LazyLoader, LoadContext, LoaderConfig, LoaderError, LoaderMetrics, Resource, ViewportContext,
};

pub use monitor::{
    Alert, AlertSeverity, AlertThresholds, CoordinationTracker, HealthStatus, MetricKind,
    MetricsMonitor, MetricsProvider, MetricsSnapshot, MonitorConfig, MonitorError,
    PerformanceReport, SystemProbe,
};

pub use optimizer::{
    BenchmarkResult, OptimizationArea, OptimizationResult, OptimizerConfig, OptimizerError,
    OptimizerStatistics, PerformanceOptimizer,
};

pub use schedule::ScheduledTask;
pub use telemetry::{init_tracing, LogFormat};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
