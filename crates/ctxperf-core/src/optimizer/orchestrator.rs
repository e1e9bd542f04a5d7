//! Full optimization cycles across cache, loader and compactor.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use super::benchmark::{composite_score, BenchmarkResult};
use super::error::{OptimizerError, OptimizerResult};
use super::probe::EngineProbe;
use crate::cache::{CacheConfig, CacheOptimization, CacheStore};
use crate::compactor::{ContextCompactor, TokenOptimization};
use crate::config::EngineConfig;
use crate::loader::{LazyLoader, LoadingOptimization};
use crate::monitor::{CoordinationTracker, MetricsMonitor, MetricsProvider, MetricsSnapshot, SystemProbe};
use crate::obs::{cycle_span, emit_optimization_finished};

/// Limits past which a cycle adds a canned recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationThresholds {
    pub response_time_ms: f64,
    pub memory_usage_mb: f64,
    pub cache_hit_rate_min: f64,
    pub token_efficiency_min: f64,
    pub coordination_latency_ms: f64,
}

impl Default for RecommendationThresholds {
    fn default() -> Self {
        Self {
            response_time_ms: 1000.0,
            memory_usage_mb: 512.0,
            cache_hit_rate_min: 0.7,
            token_efficiency_min: 0.6,
            coordination_latency_ms: 200.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub enable_cache_optimization: bool,
    pub enable_loading_optimization: bool,
    pub enable_token_optimization: bool,
    pub enable_monitoring: bool,
    /// Results kept for history and statistics.
    pub history_size: usize,
    /// Scratch-store sets and gets per benchmark.
    pub benchmark_operations: usize,
    /// Period of scheduled cycles in a host process.
    pub optimization_interval_ms: u64,
    pub thresholds: RecommendationThresholds,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            enable_cache_optimization: true,
            enable_loading_optimization: true,
            enable_token_optimization: true,
            enable_monitoring: true,
            history_size: 50,
            benchmark_operations: 500,
            optimization_interval_ms: 600_000,
            thresholds: RecommendationThresholds::default(),
        }
    }
}

impl OptimizerConfig {
    pub fn optimization_interval(&self) -> Duration {
        Duration::from_millis(self.optimization_interval_ms)
    }
}

/// Areas a cycle can be switched on or off for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationArea {
    Cache,
    Loading,
    Tokens,
    Monitoring,
}

impl fmt::Display for OptimizationArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cache => "cache",
            Self::Loading => "loading",
            Self::Tokens => "tokens",
            Self::Monitoring => "monitoring",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationStatus {
    Succeeded,
    Failed,
}

/// A concrete change applied during a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Improvement {
    pub area: OptimizationArea,
    pub description: String,
    pub impact: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub status: OptimizationStatus,
    pub error: Option<String>,
    pub improvements: Vec<Improvement>,
    pub cache: Option<CacheOptimization>,
    pub loading: Option<LoadingOptimization>,
    pub tokens: Option<TokenOptimization>,
    pub metrics: Option<MetricsSnapshot>,
    pub recommendations: Vec<String>,
    pub benchmark_before: Option<BenchmarkResult>,
    pub benchmark_after: Option<BenchmarkResult>,
    /// Benchmark score delta, after minus before.
    pub overall_improvement: f64,
}

impl OptimizationResult {
    pub fn succeeded(&self) -> bool {
        self.status == OptimizationStatus::Succeeded
    }

    pub fn tokens_saved(&self) -> usize {
        self.tokens.as_ref().map_or(0, |t| t.tokens_saved)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizerStatistics {
    pub total_runs: usize,
    pub successful_runs: usize,
    pub average_improvement: f64,
    pub average_duration_ms: f64,
    pub total_tokens_saved: usize,
    pub last_run: Option<DateTime<Utc>>,
}

/// Clears the in-flight flag when a cycle ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> OptimizerResult<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| Self(flag))
            .map_err(|_| OptimizerError::AlreadyRunning)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Partial outcome of a cycle, kept when a later step fails.
#[derive(Default)]
struct CycleOutcome {
    improvements: Vec<Improvement>,
    cache: Option<CacheOptimization>,
    loading: Option<LoadingOptimization>,
    tokens: Option<TokenOptimization>,
    metrics: Option<MetricsSnapshot>,
    recommendations: Vec<String>,
    benchmark_before: Option<BenchmarkResult>,
    benchmark_after: Option<BenchmarkResult>,
}

/// Coordinates the engine components through optimization cycles.
pub struct PerformanceOptimizer {
    config: Mutex<OptimizerConfig>,
    cache: Arc<CacheStore>,
    compactor: Arc<Mutex<ContextCompactor>>,
    loader: LazyLoader,
    tracker: Arc<CoordinationTracker>,
    monitor: Arc<MetricsMonitor>,
    history: Mutex<VecDeque<OptimizationResult>>,
    running: AtomicBool,
}

impl fmt::Debug for PerformanceOptimizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PerformanceOptimizer")
            .field("running", &self.running.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl PerformanceOptimizer {
    /// Build the engine with the process probe as system source.
    pub fn new(config: EngineConfig) -> Self {
        let tracker = Arc::new(CoordinationTracker::default());
        let base = Arc::new(SystemProbe::new().with_tracker(Arc::clone(&tracker)));
        Self::with_provider(config, base, tracker)
    }

    /// Build the engine around a custom system and coordination source.
    pub fn with_provider(
        config: EngineConfig,
        base: Arc<dyn MetricsProvider>,
        tracker: Arc<CoordinationTracker>,
    ) -> Self {
        let cache = Arc::new(CacheStore::new(config.cache));
        let compactor = Arc::new(Mutex::new(ContextCompactor::new(config.compactor)));
        let loader = LazyLoader::new(config.loader);
        let probe = EngineProbe::new(base, Arc::clone(&cache), Arc::clone(&compactor), loader.clone());
        let monitor = Arc::new(MetricsMonitor::new(config.monitor, Arc::new(probe)));

        Self {
            config: Mutex::new(config.optimizer),
            cache,
            compactor,
            loader,
            tracker,
            monitor,
            history: Mutex::new(VecDeque::new()),
            running: AtomicBool::new(false),
        }
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn compactor(&self) -> &Arc<Mutex<ContextCompactor>> {
        &self.compactor
    }

    pub fn loader(&self) -> &LazyLoader {
        &self.loader
    }

    pub fn monitor(&self) -> &Arc<MetricsMonitor> {
        &self.monitor
    }

    pub fn tracker(&self) -> &Arc<CoordinationTracker> {
        &self.tracker
    }

    pub async fn get_config(&self) -> OptimizerConfig {
        self.config.lock().await.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run one full cycle.
    ///
    /// Fails only when another cycle is in flight. Failures inside the cycle
    /// are reported through the result's status and error.
    pub async fn optimize(&self) -> OptimizerResult<OptimizationResult> {
        let _guard = InFlight::acquire(&self.running)?;
        let id = Uuid::new_v4();
        let span = cycle_span(&id.to_string());

        async {
            let started_at = Utc::now();
            let started = Instant::now();
            info!("optimization cycle started");

            let mut outcome = CycleOutcome::default();
            let error = self.run_cycle(&mut outcome).await.err();
            let duration_ms = started.elapsed().as_millis() as u64;

            let status = match &error {
                None => OptimizationStatus::Succeeded,
                Some(e) => {
                    warn!(error = %e, "optimization cycle failed");
                    OptimizationStatus::Failed
                }
            };
            let overall_improvement = match (&outcome.benchmark_before, &outcome.benchmark_after) {
                (Some(before), Some(after)) => after.score - before.score,
                _ => 0.0,
            };

            let result = OptimizationResult {
                id,
                started_at,
                duration_ms,
                status,
                error: error.map(|e| e.to_string()),
                improvements: outcome.improvements,
                cache: outcome.cache,
                loading: outcome.loading,
                tokens: outcome.tokens,
                metrics: outcome.metrics,
                recommendations: outcome.recommendations,
                benchmark_before: outcome.benchmark_before,
                benchmark_after: outcome.benchmark_after,
                overall_improvement,
            };

            emit_optimization_finished(
                &id.to_string(),
                duration_ms,
                result.improvements.len(),
                result.succeeded(),
            );
            self.remember(result.clone()).await;
            Ok(result)
        }
        .instrument(span)
        .await
    }

    async fn run_cycle(&self, outcome: &mut CycleOutcome) -> OptimizerResult<()> {
        let config = self.get_config().await;
        outcome.benchmark_before = Some(self.run_benchmark("pre-optimization").await);

        if config.enable_cache_optimization {
            let cache = self.cache.optimize().await;
            if cache.changed() {
                outcome.improvements.push(Improvement {
                    area: OptimizationArea::Cache,
                    description: format!(
                        "cache retuned: strategy {} -> {}, max size {} -> {}, ttl {}ms -> {}ms",
                        cache.previous_strategy,
                        cache.strategy,
                        cache.previous_max_size,
                        cache.max_size,
                        cache.previous_ttl_ms,
                        cache.ttl_ms
                    ),
                    impact: cache.estimated_improvement,
                });
            }
            outcome.cache = Some(cache);
        }

        if config.enable_loading_optimization {
            let loading = self.loader.optimize_loading_strategy().await;
            if loading.chunk_size != loading.previous_chunk_size
                || loading.prefetch_distance != loading.previous_prefetch_distance
            {
                outcome.improvements.push(Improvement {
                    area: OptimizationArea::Loading,
                    description: format!(
                        "loading retuned: chunk size {} -> {}, prefetch distance {} -> {}",
                        loading.previous_chunk_size,
                        loading.chunk_size,
                        loading.previous_prefetch_distance,
                        loading.prefetch_distance
                    ),
                    impact: loading.improvement,
                });
            }
            outcome.loading = Some(loading);
        }

        if config.enable_token_optimization {
            let tokens = self.compactor.lock().await.optimize();
            if tokens.tokens_saved > 0 {
                outcome.improvements.push(Improvement {
                    area: OptimizationArea::Tokens,
                    description: format!(
                        "context reduced by {} tokens ({} -> {})",
                        tokens.tokens_saved, tokens.original_tokens, tokens.final_tokens
                    ),
                    impact: tokens.improvement_ratio,
                });
            }
            outcome.recommendations.extend(tokens.recommendations.iter().cloned());
            outcome.tokens = Some(tokens);
        }

        let metrics = self.monitor.get_current_metrics().await?;
        let mut recommendations = recommend(&metrics, &config.thresholds);
        recommendations.append(&mut outcome.recommendations);
        recommendations.dedup();
        outcome.recommendations = recommendations;
        outcome.metrics = Some(metrics);

        outcome.benchmark_after = Some(self.run_benchmark("post-optimization").await);
        Ok(())
    }

    async fn remember(&self, result: OptimizationResult) {
        let limit = self.config.lock().await.history_size.max(1);
        let mut history = self.history.lock().await;
        history.push_back(result);
        while history.len() > limit {
            history.pop_front();
        }
    }

    /// Sample current metrics through the monitor.
    pub async fn get_current_metrics(&self) -> OptimizerResult<MetricsSnapshot> {
        Ok(self.monitor.get_current_metrics().await?)
    }

    /// Past results, oldest first. `None` returns the whole history.
    pub async fn get_optimization_history(&self, limit: Option<usize>) -> Vec<OptimizationResult> {
        let history = self.history.lock().await;
        let skip = limit.map_or(0, |n| history.len().saturating_sub(n));
        history.iter().skip(skip).cloned().collect()
    }

    /// Measure cache throughput on a scratch store and read live efficiency
    /// figures.
    pub async fn run_benchmark(&self, name: &str) -> BenchmarkResult {
        let operations = self.config.lock().await.benchmark_operations.max(1);
        let scratch = CacheStore::new(CacheConfig {
            max_size: operations,
            compression_enabled: false,
            auto_optimize: false,
            ..self.cache.get_config().await
        });

        let started = Instant::now();
        for i in 0..operations {
            scratch.set(&format!("bench:{i}"), json!({ "i": i }), None).await;
        }
        for i in 0..operations {
            let _ = scratch.get(&format!("bench:{i}")).await;
        }
        let elapsed = started.elapsed();
        let total_ops = operations * 2;
        let secs = elapsed.as_secs_f64().max(1e-6);

        let stats = self.cache.get_stats().await;
        let cache_hit_rate = (stats.hits + stats.misses > 0).then_some(stats.hit_rate);
        let token_efficiency = self.compactor.lock().await.token_efficiency();
        let avg_load_ms = self.loader.get_metrics().await.avg_load_ms;
        let health_score = self.monitor.assess_health().await.score;

        BenchmarkResult {
            name: name.to_string(),
            timestamp: Utc::now(),
            duration_ms: elapsed.as_secs_f64() * 1000.0,
            operations: total_ops,
            throughput: total_ops as f64 / secs,
            avg_op_ms: elapsed.as_secs_f64() * 1000.0 / total_ops as f64,
            cache_hit_rate,
            token_efficiency,
            avg_load_ms,
            health_score,
            score: composite_score(health_score, cache_hit_rate, token_efficiency),
        }
    }

    /// Switch an area on or off. Toggling monitoring starts or stops the
    /// periodic sampler.
    pub async fn toggle_optimization(&self, area: OptimizationArea, enabled: bool) -> OptimizerResult<()> {
        {
            let mut config = self.config.lock().await;
            match area {
                OptimizationArea::Cache => config.enable_cache_optimization = enabled,
                OptimizationArea::Loading => config.enable_loading_optimization = enabled,
                OptimizationArea::Tokens => config.enable_token_optimization = enabled,
                OptimizationArea::Monitoring => config.enable_monitoring = enabled,
            }
        }

        if area == OptimizationArea::Monitoring {
            if enabled {
                if !self.monitor.is_monitoring().await {
                    self.monitor.start_monitoring().await?;
                }
            } else {
                self.monitor.stop_monitoring().await;
            }
        }
        info!(area = %area, enabled, "optimization toggled");
        Ok(())
    }

    /// Aggregates over the retained history.
    pub async fn statistics(&self) -> OptimizerStatistics {
        let history = self.history.lock().await;
        let total_runs = history.len();
        if total_runs == 0 {
            return OptimizerStatistics::default();
        }
        let n = total_runs as f64;
        OptimizerStatistics {
            total_runs,
            successful_runs: history.iter().filter(|r| r.succeeded()).count(),
            average_improvement: history.iter().map(|r| r.overall_improvement).sum::<f64>() / n,
            average_duration_ms: history.iter().map(|r| r.duration_ms as f64).sum::<f64>() / n,
            total_tokens_saved: history.iter().map(OptimizationResult::tokens_saved).sum(),
            last_run: history.back().map(|r| r.started_at),
        }
    }
}

/// Canned advice for every breached threshold.
pub fn recommend(metrics: &MetricsSnapshot, thresholds: &RecommendationThresholds) -> Vec<String> {
    let mut out = Vec::new();
    if metrics.coordination.response_time_ms > thresholds.response_time_ms {
        out.push(format!(
            "Response time {:.0}ms exceeds {:.0}ms: cache hot lookups and batch coordination calls",
            metrics.coordination.response_time_ms, thresholds.response_time_ms
        ));
    }
    if metrics.system.memory_usage_mb > thresholds.memory_usage_mb {
        out.push(format!(
            "Memory usage {:.0}MB exceeds {:.0}MB: shrink cache capacity or enable compression",
            metrics.system.memory_usage_mb, thresholds.memory_usage_mb
        ));
    }
    if let Some(rate) = metrics.resources.cache_hit_rate {
        if rate < thresholds.cache_hit_rate_min {
            out.push(format!(
                "Cache hit rate {:.0}% is below {:.0}%: raise capacity or extend TTL for reused keys",
                rate * 100.0,
                thresholds.cache_hit_rate_min * 100.0
            ));
        }
    }
    if let Some(efficiency) = metrics.resources.token_efficiency {
        if efficiency < thresholds.token_efficiency_min {
            out.push(format!(
                "Token efficiency {:.2} is below {:.2}: prune stale fragments and deduplicate context",
                efficiency, thresholds.token_efficiency_min
            ));
        }
    }
    if metrics.coordination.coordination_latency_ms > thresholds.coordination_latency_ms {
        out.push(format!(
            "Coordination latency {:.0}ms exceeds {:.0}ms: reduce hops between components",
            metrics.coordination.coordination_latency_ms, thresholds.coordination_latency_ms
        ));
    }
    out
}
