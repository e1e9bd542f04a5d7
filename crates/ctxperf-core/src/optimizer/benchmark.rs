//! Benchmark results and scoring.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One benchmark run.
///
/// Cache throughput is measured on a scratch store so live entries and hit
/// counters are left alone; the remaining figures are read from the live
/// engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: f64,
    pub operations: usize,
    /// Scratch-store operations per second.
    pub throughput: f64,
    pub avg_op_ms: f64,
    /// Live cache hit rate, or `None` before any lookup.
    pub cache_hit_rate: Option<f64>,
    pub token_efficiency: f64,
    pub avg_load_ms: f64,
    pub health_score: f64,
    /// Composite 0 - 100.
    pub score: f64,
}

/// `0.4 * health + 30 * hit rate + 30 * token efficiency`.
///
/// An undefined hit rate counts as perfect.
pub fn composite_score(health_score: f64, cache_hit_rate: Option<f64>, token_efficiency: f64) -> f64 {
    let hit = cache_hit_rate.unwrap_or(1.0).clamp(0.0, 1.0);
    let tokens = token_efficiency.clamp(0.0, 1.0);
    (0.4 * health_score.clamp(0.0, 100.0) + 30.0 * hit + 30.0 * tokens).clamp(0.0, 100.0)
}
