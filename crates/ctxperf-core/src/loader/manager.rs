//! Lazy loading with bounded concurrency, dependency resolution and
//! predictive prefetch.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::error::{LoaderError, LoaderResult};
use super::prediction::{Prediction, PredictionModel};
use super::resource::{LoadContext, Resource, ResourceStats, ViewportContext};

/// Loader configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Preferred transfer chunk, in bytes.
    pub chunk_size: usize,
    /// Maximum predicted resources prefetched after one load.
    pub prefetch_distance: usize,
    pub max_prefetch_distance: usize,
    /// Simultaneous loader invocations.
    pub max_concurrent: usize,
    pub timeout_ms: u64,
    pub prediction_enabled: bool,
    /// Minimum confidence for a prediction to be prefetched.
    pub prediction_threshold: f64,
    pub history_size: usize,
    /// Grace period after the expected access time when scoring a prediction.
    pub prediction_window_ms: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: 64 * 1024,
            prefetch_distance: 3,
            max_prefetch_distance: 10,
            max_concurrent: 4,
            timeout_ms: 30_000,
            prediction_enabled: true,
            prediction_threshold: 0.7,
            history_size: 1000,
            prediction_window_ms: 5_000,
        }
    }
}

const MIN_CHUNK_SIZE: usize = 4 * 1024;
const MAX_CHUNK_SIZE: usize = 1024 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoaderMetrics {
    pub registered: usize,
    pub requests: u64,
    pub loads: u64,
    pub cache_hits: u64,
    pub prefetch_hits: u64,
    pub prefetched: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub avg_load_ms: f64,
    /// Requests served from the load or prefetch cache.
    pub cache_hit_rate: f64,
    /// Share of prefetched resources that were later requested.
    pub prefetch_efficiency: f64,
    pub prediction_accuracy: f64,
    pub prefetch_distance: usize,
    pub chunk_size: usize,
}

/// Outcome of [`LazyLoader::optimize_loading_strategy`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadingOptimization {
    pub previous_chunk_size: usize,
    pub chunk_size: usize,
    pub previous_prefetch_distance: usize,
    pub prefetch_distance: usize,
    pub avg_load_ms: f64,
    pub cache_hit_rate: f64,
    pub prefetch_efficiency: f64,
    pub prediction_accuracy: f64,
    /// `0.4 * load-time + 0.3 * cache-hit + 0.3 * accuracy` change since the
    /// previous pass.
    pub improvement: f64,
}

#[derive(Debug, Default)]
struct Counters {
    requests: u64,
    loads: u64,
    cache_hits: u64,
    prefetch_hits: u64,
    prefetched: u64,
    failures: u64,
    timeouts: u64,
    load_time: Duration,
}

#[derive(Debug, Clone, Copy, Default)]
struct Baseline {
    avg_load_ms: f64,
    cache_hit_rate: f64,
    prediction_accuracy: f64,
}

#[derive(Debug)]
struct LoaderState {
    config: LoaderConfig,
    registry: HashMap<String, Resource>,
    loaded: HashMap<String, Value>,
    prefetched: HashMap<String, Value>,
    stats: HashMap<String, ResourceStats>,
    model: PredictionModel,
    viewport: ViewportContext,
    counters: Counters,
    baseline: Option<Baseline>,
}

impl LoaderState {
    fn avg_load_ms(&self) -> f64 {
        if self.counters.loads == 0 {
            0.0
        } else {
            self.counters.load_time.as_secs_f64() * 1000.0 / self.counters.loads as f64
        }
    }

    fn cache_hit_rate(&self) -> f64 {
        if self.counters.requests == 0 {
            0.0
        } else {
            self.counters.cache_hits as f64 / self.counters.requests as f64
        }
    }

    fn prefetch_efficiency(&self) -> f64 {
        if self.counters.prefetched == 0 {
            0.0
        } else {
            self.counters.prefetch_hits as f64 / self.counters.prefetched as f64
        }
    }

    /// Walk declared dependencies from `id`, failing on the first cycle.
    fn check_acyclic(&self, id: &str) -> LoaderResult<()> {
        fn visit(
            registry: &HashMap<String, Resource>,
            id: &str,
            path: &mut Vec<String>,
            done: &mut HashSet<String>,
        ) -> LoaderResult<()> {
            if let Some(pos) = path.iter().position(|p| p == id) {
                let mut cycle = path[pos..].to_vec();
                cycle.push(id.to_string());
                return Err(LoaderError::DependencyCycle { path: cycle });
            }
            if done.contains(id) {
                return Ok(());
            }
            if let Some(resource) = registry.get(id) {
                path.push(id.to_string());
                for dep in &resource.dependencies {
                    visit(registry, dep, path, done)?;
                }
                path.pop();
            }
            done.insert(id.to_string());
            Ok(())
        }
        visit(&self.registry, id, &mut Vec::new(), &mut HashSet::new())
    }
}

/// Why a value is being looked up; decides hit accounting and promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lookup {
    Request,
    Dependency,
    Prefetch,
}

impl Lookup {
    /// Lookup mode for dependencies and for re-checks after waiting.
    fn nested(self) -> Self {
        match self {
            Self::Prefetch => Self::Prefetch,
            _ => Self::Dependency,
        }
    }
}

struct Inner {
    state: Mutex<LoaderState>,
    semaphore: Semaphore,
    in_flight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

/// On-demand resource loader. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct LazyLoader {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for LazyLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyLoader")
            .field("available_permits", &self.inner.semaphore.available_permits())
            .finish_non_exhaustive()
    }
}

impl Default for LazyLoader {
    fn default() -> Self {
        Self::new(LoaderConfig::default())
    }
}

impl LazyLoader {
    pub fn new(config: LoaderConfig) -> Self {
        let model = PredictionModel::new(
            config.history_size,
            Duration::from_millis(config.prediction_window_ms),
        );
        let permits = config.max_concurrent.max(1);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(LoaderState {
                    config,
                    registry: HashMap::new(),
                    loaded: HashMap::new(),
                    prefetched: HashMap::new(),
                    stats: HashMap::new(),
                    model,
                    viewport: ViewportContext::default(),
                    counters: Counters::default(),
                    baseline: None,
                }),
                semaphore: Semaphore::new(permits),
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Register (or replace) a resource. Replacing drops any cached value.
    pub async fn register_resource(&self, resource: Resource) {
        let mut state = self.inner.state.lock().await;
        let id = resource.id.clone();
        state.loaded.remove(&id);
        state.prefetched.remove(&id);
        state.stats.entry(id.clone()).or_default();
        state.registry.insert(id.clone(), resource);
        debug!(id = %id, "resource registered");
    }

    pub async fn is_registered(&self, id: &str) -> bool {
        self.inner.state.lock().await.registry.contains_key(id)
    }

    /// Whether a value for `id` is held in the load cache.
    pub async fn is_loaded(&self, id: &str) -> bool {
        self.inner.state.lock().await.loaded.contains_key(id)
    }

    /// Whether a value for `id` is waiting in the prefetch cache.
    pub async fn is_prefetched(&self, id: &str) -> bool {
        self.inner.state.lock().await.prefetched.contains_key(id)
    }

    pub async fn resource_stats(&self, id: &str) -> Option<ResourceStats> {
        self.inner.state.lock().await.stats.get(id).cloned()
    }

    pub async fn load_resource(&self, id: &str) -> LoaderResult<Value> {
        self.load_resource_with(id, LoadContext::default()).await
    }

    /// Load `id`, resolving its dependencies first. Served from cache when
    /// possible; otherwise the loader runs under the concurrency gate and
    /// the configured timeout.
    pub async fn load_resource_with(&self, id: &str, context: LoadContext) -> LoaderResult<Value> {
        let prediction_enabled = {
            let mut state = self.inner.state.lock().await;
            if !state.registry.contains_key(id) {
                return Err(LoaderError::ResourceNotFound { id: id.to_string() });
            }
            state.counters.requests += 1;
            let now = Instant::now();
            state.model.record(id, now, context.source);
            let stats = state.stats.entry(id.to_string()).or_default();
            stats.access_count += 1;
            stats.last_access = Some(Utc::now());
            state.check_acyclic(id)?;
            state.config.prediction_enabled
        };

        let value = self.resolve(id.to_string(), Lookup::Request).await?;
        if prediction_enabled {
            self.predictive_pass(id).await;
        }
        Ok(value)
    }

    /// Cached value for `id`. A prefetch hit outside a prefetch pass is
    /// promoted into the load cache.
    async fn cached(&self, id: &str, lookup: Lookup) -> Option<Value> {
        let mut state = self.inner.state.lock().await;
        if let Some(value) = state.loaded.get(id).cloned() {
            if lookup == Lookup::Request {
                state.counters.cache_hits += 1;
            }
            return Some(value);
        }
        if lookup == Lookup::Prefetch {
            return state.prefetched.get(id).cloned();
        }
        let value = state.prefetched.remove(id)?;
        state.loaded.insert(id.to_string(), value.clone());
        state.counters.prefetch_hits += 1;
        if lookup == Lookup::Request {
            state.counters.cache_hits += 1;
        }
        debug!(id = %id, "prefetch hit promoted");
        Some(value)
    }

    fn resolve(&self, id: String, lookup: Lookup) -> BoxFuture<'_, LoaderResult<Value>> {
        async move {
            if let Some(value) = self.cached(&id, lookup).await {
                return Ok(value);
            }

            let resource = {
                let state = self.inner.state.lock().await;
                state.registry.get(&id).cloned()
            }
            .ok_or_else(|| LoaderError::ResourceNotFound { id: id.clone() })?;

            let flight = {
                let mut in_flight = self.inner.in_flight.lock().await;
                Arc::clone(in_flight.entry(id.clone()).or_default())
            };
            let _flight = flight.lock().await;

            // another caller may have finished the load while we waited
            if let Some(value) = self.cached(&id, lookup.nested()).await {
                return Ok(value);
            }

            let result = self.load_uncached(&resource, lookup).await;
            self.inner.in_flight.lock().await.remove(&id);
            result
        }
        .boxed()
    }

    /// Resolve every dependency, then run the resource's own loader.
    async fn load_uncached(&self, resource: &Resource, lookup: Lookup) -> LoaderResult<Value> {
        for dependency in &resource.dependencies {
            self.resolve(dependency.clone(), lookup.nested())
                .await
                .map_err(|e| LoaderError::DependencyFailed {
                    id: resource.id.clone(),
                    dependency: dependency.clone(),
                    source: Box::new(e),
                })?;
        }
        self.invoke(resource, lookup == Lookup::Prefetch).await
    }

    async fn invoke(&self, resource: &Resource, prefetch: bool) -> LoaderResult<Value> {
        let limit = {
            let state = self.inner.state.lock().await;
            Duration::from_millis(state.config.timeout_ms)
        };
        let _permit = self
            .inner
            .semaphore
            .acquire()
            .await
            .map_err(|e| LoaderError::LoadFailed {
                id: resource.id.clone(),
                reason: e.to_string(),
            })?;

        let started = Instant::now();
        let outcome = tokio::time::timeout(limit, (resource.loader)()).await;
        let elapsed = started.elapsed();

        let mut state = self.inner.state.lock().await;
        match outcome {
            Ok(Ok(value)) => {
                state.counters.loads += 1;
                state.counters.load_time += elapsed;
                if prefetch {
                    state.counters.prefetched += 1;
                    state.prefetched.insert(resource.id.clone(), value.clone());
                } else {
                    state.loaded.insert(resource.id.clone(), value.clone());
                }
                let stats = state.stats.entry(resource.id.clone()).or_default();
                stats.load_count += 1;
                stats.last_loaded = Some(Utc::now());
                stats.last_load_ms = Some(elapsed.as_millis() as u64);
                debug!(id = %resource.id, elapsed_ms = elapsed.as_millis() as u64, prefetch, "resource loaded");
                Ok(value)
            }
            Ok(Err(e)) => {
                state.counters.failures += 1;
                warn!(id = %resource.id, error = %e, "resource load failed");
                Err(LoaderError::LoadFailed {
                    id: resource.id.clone(),
                    reason: format!("{e:#}"),
                })
            }
            Err(_) => {
                state.counters.failures += 1;
                state.counters.timeouts += 1;
                let limit_ms = limit.as_millis() as u64;
                warn!(id = %resource.id, limit_ms, "resource load timed out");
                Err(LoaderError::Timeout {
                    id: resource.id.clone(),
                    limit_ms,
                })
            }
        }
    }

    /// Queue confident successors of `id` for prefetch in the background.
    async fn predictive_pass(&self, id: &str) {
        let targets: Vec<String> = {
            let mut state = self.inner.state.lock().await;
            let threshold = state.config.prediction_threshold;
            let distance = state.config.prefetch_distance;
            let predictions: Vec<Prediction> = state
                .model
                .predict(id)
                .into_iter()
                .filter(|p| p.confidence > threshold)
                .take(distance)
                .collect();
            state.model.track(&predictions, Instant::now());
            predictions
                .into_iter()
                .map(|p| p.id)
                .filter(|p| {
                    !state.loaded.contains_key(p)
                        && !state.prefetched.contains_key(p)
                        && state.registry.contains_key(p)
                })
                .collect()
        };
        if targets.is_empty() {
            return;
        }
        debug!(from = %id, targets = ?targets, "predictive prefetch queued");
        let loader = self.clone();
        tokio::spawn(async move {
            loader.prefetch_resources(&targets).await;
        });
    }

    /// Best-effort prefetch into the prefetch cache. Errors are logged, never
    /// returned. Returns the number of resources now available.
    pub async fn prefetch_resources(&self, ids: &[String]) -> usize {
        let fetches = ids.iter().map(|id| {
            let id = id.clone();
            async move {
                let acyclic = {
                    let state = self.inner.state.lock().await;
                    state.check_acyclic(&id)
                };
                let result = match acyclic {
                    Ok(()) => self.resolve(id.clone(), Lookup::Prefetch).await,
                    Err(e) => Err(e),
                };
                match result {
                    Ok(_) => true,
                    Err(e) => {
                        warn!(id = %id, error = %e, "prefetch failed");
                        false
                    }
                }
            }
        });
        join_all(fetches).await.into_iter().filter(|ok| *ok).count()
    }

    /// Record the current viewport and prefetch the nearest upcoming
    /// resources within the prefetch distance.
    pub async fn update_viewport_context(&self, viewport: ViewportContext) -> usize {
        let targets: Vec<String> = {
            let mut state = self.inner.state.lock().await;
            let distance = state.config.prefetch_distance;
            let targets = viewport
                .upcoming
                .iter()
                .filter(|id| !viewport.visible.contains(id))
                .take(distance)
                .cloned()
                .collect();
            state.viewport = viewport;
            targets
        };
        self.prefetch_resources(&targets).await
    }

    pub async fn viewport(&self) -> ViewportContext {
        self.inner.state.lock().await.viewport.clone()
    }

    /// Likely successors of `id` according to the access history.
    pub async fn predict_next(&self, id: &str) -> Vec<Prediction> {
        self.inner.state.lock().await.model.predict(id)
    }

    /// Drop both caches. Registrations and statistics are kept.
    pub async fn clear_cache(&self) {
        let mut state = self.inner.state.lock().await;
        state.loaded.clear();
        state.prefetched.clear();
        info!("loader caches cleared");
    }

    pub async fn get_config(&self) -> LoaderConfig {
        self.inner.state.lock().await.config.clone()
    }

    pub async fn get_metrics(&self) -> LoaderMetrics {
        let mut state = self.inner.state.lock().await;
        state.model.evaluate(Instant::now());
        LoaderMetrics {
            registered: state.registry.len(),
            requests: state.counters.requests,
            loads: state.counters.loads,
            cache_hits: state.counters.cache_hits,
            prefetch_hits: state.counters.prefetch_hits,
            prefetched: state.counters.prefetched,
            failures: state.counters.failures,
            timeouts: state.counters.timeouts,
            avg_load_ms: state.avg_load_ms(),
            cache_hit_rate: state.cache_hit_rate(),
            prefetch_efficiency: state.prefetch_efficiency(),
            prediction_accuracy: state.model.accuracy(),
            prefetch_distance: state.config.prefetch_distance,
            chunk_size: state.config.chunk_size,
        }
    }

    /// Retune chunk size and prefetch distance from observed behaviour.
    pub async fn optimize_loading_strategy(&self) -> LoadingOptimization {
        let mut state = self.inner.state.lock().await;
        state.model.evaluate(Instant::now());

        let previous_chunk_size = state.config.chunk_size;
        let previous_prefetch_distance = state.config.prefetch_distance;

        let sized: Vec<usize> = state
            .registry
            .values()
            .map(|r| r.size_hint)
            .filter(|s| *s > 0)
            .collect();
        if !sized.is_empty() {
            let avg = sized.iter().sum::<usize>() / sized.len();
            state.config.chunk_size = avg.next_power_of_two().clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE);
        }

        let efficiency = state.prefetch_efficiency();
        if state.counters.prefetched > 0 {
            if efficiency < 0.3 {
                state.config.prefetch_distance = state.config.prefetch_distance.saturating_sub(1).max(1);
            } else if efficiency > 0.8 {
                state.config.prefetch_distance =
                    (state.config.prefetch_distance + 1).min(state.config.max_prefetch_distance);
            }
        }

        let current = Baseline {
            avg_load_ms: state.avg_load_ms(),
            cache_hit_rate: state.cache_hit_rate(),
            prediction_accuracy: state.model.accuracy(),
        };
        let previous = state.baseline.unwrap_or_default();
        let load_delta = if previous.avg_load_ms > 0.0 {
            (previous.avg_load_ms - current.avg_load_ms) / previous.avg_load_ms
        } else {
            0.0
        };
        let improvement = 0.4 * load_delta
            + 0.3 * (current.cache_hit_rate - previous.cache_hit_rate)
            + 0.3 * (current.prediction_accuracy - previous.prediction_accuracy);
        state.baseline = Some(current);

        info!(
            chunk_size = state.config.chunk_size,
            prefetch_distance = state.config.prefetch_distance,
            efficiency,
            improvement,
            "loading strategy optimized"
        );

        LoadingOptimization {
            previous_chunk_size,
            chunk_size: state.config.chunk_size,
            previous_prefetch_distance,
            prefetch_distance: state.config.prefetch_distance,
            avg_load_ms: current.avg_load_ms,
            cache_hit_rate: current.cache_hit_rate,
            prefetch_efficiency: efficiency,
            prediction_accuracy: current.prediction_accuracy,
            improvement,
        }
    }
}
