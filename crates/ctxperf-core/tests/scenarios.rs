//! End-to-end scenarios across the engine's public API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use ctxperf_core::monitor::{
    AlertKind, CoordinationMetrics, ManualProvider, ResourceMetrics, SystemMetrics,
};
use ctxperf_core::{
    CacheConfig, CacheStore, CompactorConfig, ContextCompactor, ContextFragment,
    CoordinationTracker, EngineConfig, EvictionStrategy, FragmentKind, LazyLoader, LoaderConfig,
    MetricKind, MetricsMonitor, MetricsProvider, MetricsSnapshot, MonitorConfig, OptimizerError,
    PerformanceOptimizer, Resource,
};
use futures::future::join_all;
use serde_json::json;

fn snapshot(response_time_ms: f64) -> MetricsSnapshot {
    MetricsSnapshot::new(
        SystemMetrics {
            cpu_usage: 10.0,
            memory_usage_mb: 128.0,
            memory_total_mb: 8192.0,
        },
        CoordinationMetrics {
            response_time_ms,
            throughput: 25.0,
            ..Default::default()
        },
        ResourceMetrics::default(),
    )
}

// ---------------------------------------------------------------------------
// Cache Store
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_cache_churn_fifo() {
    let cache = CacheStore::new(CacheConfig {
        max_size: 3,
        strategy: EvictionStrategy::Fifo,
        ..Default::default()
    });
    for key in ["A", "B", "C", "D"] {
        assert!(cache.set(key, json!(key), None).await);
    }

    assert_eq!(cache.get("A").await, None);
    assert_eq!(cache.get("D").await, Some(json!("D")));
    assert!(cache.len().await <= 3);
}

#[tokio::test]
async fn test_lru_evicts_least_recently_accessed() {
    let cache = CacheStore::new(CacheConfig {
        max_size: 3,
        strategy: EvictionStrategy::Lru,
        ..Default::default()
    });
    for key in ["a", "b", "c"] {
        cache.set(key, json!(key), None).await;
    }
    cache.get("a").await;
    cache.get("c").await;
    cache.set("d", json!("d"), None).await;

    assert_eq!(cache.keys().await, vec!["a", "c", "d"]);
}

#[tokio::test]
async fn test_size_ceiling_holds_for_every_strategy() {
    for strategy in [
        EvictionStrategy::Lru,
        EvictionStrategy::Lfu,
        EvictionStrategy::Fifo,
        EvictionStrategy::Adaptive,
    ] {
        let cache = CacheStore::new(CacheConfig {
            max_size: 5,
            strategy,
            ..Default::default()
        });
        for i in 0..40 {
            cache.set(&format!("k{i}"), json!(i), None).await;
            if i % 3 == 0 {
                cache.get(&format!("k{}", i / 2)).await;
            }
            assert!(cache.len().await <= 5, "{strategy} exceeded max size");
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_expired_entry_is_a_miss() {
    let cache = CacheStore::new(CacheConfig {
        ttl_ms: 1_000,
        ..Default::default()
    });
    cache.set("session", json!({"user": 7}), None).await;
    tokio::time::advance(Duration::from_millis(1_001)).await;

    assert_eq!(cache.get("session").await, None);
    let stats = cache.get_stats().await;
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 0);
}

#[tokio::test]
async fn test_hit_rate_accounting() {
    let cache = CacheStore::new(CacheConfig::default());
    for i in 0..5 {
        cache.set(&format!("k{i}"), json!(i), None).await;
    }
    for i in 0..7 {
        assert!(cache.get(&format!("k{}", i % 5)).await.is_some());
    }
    for i in 0..3 {
        assert!(cache.get(&format!("absent{i}")).await.is_none());
    }

    let stats = cache.get_stats().await;
    assert_eq!(stats.hits, 7);
    assert_eq!(stats.misses, 3);
    assert_eq!(stats.hit_rate, 7.0 / 10.0);
}

// ---------------------------------------------------------------------------
// Context Compactor
// ---------------------------------------------------------------------------

const BODY: &str = "Project notes: the build pipeline runs lint, unit tests and packaging in sequence.";

#[test]
fn test_identical_low_priority_fragments_collapse() {
    let mut compactor = ContextCompactor::new(CompactorConfig::default());
    for i in 0..3 {
        compactor.add_fragment(
            ContextFragment::new(format!("note-{i}"), BODY, FragmentKind::Context).with_priority(0.1),
        );
    }
    let before = compactor.total_tokens();

    let result = compactor.optimize();
    assert!(compactor.total_tokens() < before);
    assert!(result.tokens_saved > 0);
    let verbatim = compactor.fragments().iter().filter(|f| f.content == BODY).count();
    assert!(verbatim <= 1);
}

#[test]
fn test_second_pass_saves_nothing() {
    let mut compactor = ContextCompactor::new(CompactorConfig::default());
    compactor.add_fragment(ContextFragment::new("sys", "You are a careful reviewer.", FragmentKind::System));
    for i in 0..4 {
        compactor.add_fragment(
            ContextFragment::new(
                format!("ctx-{i}"),
                format!("{BODY}  Additional   detail number {i}   with   extra   spacing."),
                FragmentKind::Context,
            )
            .with_priority(0.4),
        );
    }

    compactor.optimize();
    let second = compactor.optimize();
    assert_eq!(second.tokens_saved, 0);
}

#[test]
fn test_important_fragment_survives_pruning() {
    let mut compactor = ContextCompactor::new(CompactorConfig {
        max_age_ms: 1,
        preservation_threshold: 0.75,
        ..Default::default()
    });
    let old = chrono::Utc::now() - chrono::Duration::hours(2);
    compactor.add_fragment(
        ContextFragment::new("rules", "Never commit secrets to the repository.", FragmentKind::System)
            .with_priority(1.0)
            .with_timestamp(old),
    );
    compactor.add_fragment(
        ContextFragment::new("chatter", "ok, thanks", FragmentKind::Generated)
            .with_priority(0.0)
            .with_timestamp(old),
    );

    let importance = compactor.fragment("rules").map(|f| f.importance).unwrap();
    assert!(importance >= compactor.config().preservation_threshold);

    compactor.optimize();
    assert!(compactor.fragment("rules").is_some());
    assert!(compactor.fragment("chatter").is_none());
}

// ---------------------------------------------------------------------------
// Resource Loader
// ---------------------------------------------------------------------------

fn recording(id: &str, log: Arc<StdMutex<Vec<String>>>, delay_ms: u64) -> Resource {
    let name = id.to_string();
    Resource::new(id, "doc", move || {
        let log = Arc::clone(&log);
        let name = name.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            log.lock().unwrap().push(name.clone());
            Ok(json!(name))
        }
    })
}

#[tokio::test]
async fn test_dependencies_resolve_before_dependent() {
    let loader = LazyLoader::default();
    let log = Arc::new(StdMutex::new(Vec::new()));
    loader.register_resource(recording("config", Arc::clone(&log), 30)).await;
    loader.register_resource(recording("theme", Arc::clone(&log), 10)).await;
    loader
        .register_resource(recording("app", Arc::clone(&log), 0).with_dependencies(["config", "theme"]))
        .await;

    loader.load_resource("app").await.unwrap();

    let order = log.lock().unwrap().clone();
    assert_eq!(order.len(), 3);
    assert_eq!(order.last().map(String::as_str), Some("app"));
}

#[tokio::test]
async fn test_concurrency_ceiling() {
    const K: usize = 2;
    let loader = LazyLoader::new(LoaderConfig {
        max_concurrent: K,
        prediction_enabled: false,
        ..Default::default()
    });
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    for i in 0..=K {
        let in_flight = Arc::clone(&in_flight);
        let peak = Arc::clone(&peak);
        loader
            .register_resource(Resource::new(format!("r{i}"), "doc", move || {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(40)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(json!(null))
                }
            }))
            .await;
    }

    let ids: Vec<String> = (0..=K).map(|i| format!("r{i}")).collect();
    let results = join_all(ids.iter().map(|id| loader.load_resource(id))).await;
    assert!(results.iter().all(Result::is_ok));
    assert!(peak.load(Ordering::SeqCst) <= K);
    assert_eq!(loader.get_metrics().await.loads, (K + 1) as u64);
}

// ---------------------------------------------------------------------------
// Metrics Monitor
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_alert_raised_once_and_cleared_only_by_acknowledgement() {
    let provider = Arc::new(ManualProvider::new());
    let mut config = MonitorConfig::default();
    config.thresholds.response_time_ms = 1000.0;
    let monitor = MetricsMonitor::new(config, provider.clone());

    provider.set(snapshot(1500.0)).await;
    monitor.get_current_metrics().await.unwrap();
    let alerts = monitor.get_alerts(false).await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].kind, AlertKind::Threshold);
    assert_eq!(alerts[0].metric, MetricKind::ResponseTime);

    provider.set(snapshot(500.0)).await;
    monitor.get_current_metrics().await.unwrap();
    assert_eq!(monitor.get_alerts(false).await.len(), 1);

    monitor.acknowledge_alert(alerts[0].id).await.unwrap();
    assert!(monitor.get_alerts(false).await.is_empty());
}

// ---------------------------------------------------------------------------
// Optimization Orchestrator
// ---------------------------------------------------------------------------

/// Provider whose coordination sample takes a while.
struct SlowProvider {
    inner: ManualProvider,
    delay: Duration,
}

#[async_trait]
impl MetricsProvider for SlowProvider {
    async fn system(&self) -> anyhow::Result<SystemMetrics> {
        self.inner.system().await
    }

    async fn coordination(&self) -> anyhow::Result<CoordinationMetrics> {
        tokio::time::sleep(self.delay).await;
        self.inner.coordination().await
    }

    async fn resources(&self) -> anyhow::Result<ResourceMetrics> {
        self.inner.resources().await
    }
}

#[tokio::test]
async fn test_overlapping_cycles_are_rejected() {
    let inner = ManualProvider::new();
    inner.set(snapshot(50.0)).await;
    let provider = Arc::new(SlowProvider {
        inner,
        delay: Duration::from_millis(50),
    });
    let mut config = EngineConfig::default();
    config.optimizer.benchmark_operations = 10;
    let optimizer = PerformanceOptimizer::with_provider(
        config,
        provider,
        Arc::new(CoordinationTracker::default()),
    );

    let (first, second) = tokio::join!(optimizer.optimize(), optimizer.optimize());
    assert!(first.unwrap().succeeded());
    assert!(matches!(second, Err(OptimizerError::AlreadyRunning)));

    // the flag is released once the cycle ends
    assert!(optimizer.optimize().await.unwrap().succeeded());
    assert_eq!(optimizer.statistics().await.total_runs, 2);
}
