//! In-process key/value store with pluggable eviction, TTL and compression.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::compression::{compress, decompress, savings_ratio};
use super::entry::{CacheEntry, EntryMetadata, StoredValue};
use super::error::{CacheError, CacheResult};
use super::strategy::{select_victims, EvictionStrategy};
use super::tuning::{
    classify_pattern, estimate_improvement, intervals_ms, recommend_capacity, recommend_strategy,
    recommend_ttl, AccessPattern, PatternSummary, PerformanceSnapshot,
};
use crate::obs::emit_cache_evicted;
use crate::schedule::ScheduledTask;

/// Cache store configuration. Every field has a default, so a partial
/// object deserializes cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of entries.
    pub max_size: usize,
    /// Entry time-to-live (milliseconds).
    pub ttl_ms: u64,
    pub strategy: EvictionStrategy,
    pub compression_enabled: bool,
    /// Values at or above this serialized size are considered for compression.
    pub compression_threshold_bytes: usize,
    /// Minimum fraction saved for the compressed form to be kept.
    pub min_compression_savings: f64,
    /// Values above this serialized size are rejected.
    pub max_entry_bytes: usize,
    /// Maintenance evicts a batch when total usage exceeds this.
    pub memory_threshold_bytes: usize,
    /// Fraction of `max_size` evicted per batch.
    pub eviction_batch_ratio: f64,
    /// Access count at which a key counts as frequently used.
    pub frequency_threshold: u64,
    /// Access timestamps retained per key for pattern analysis.
    pub access_samples_per_key: usize,
    pub maintenance_interval_ms: u64,
    /// Re-run [`CacheStore::optimize`] from the maintenance task.
    pub auto_optimize: bool,
    pub optimization_interval_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            ttl_ms: 3_600_000,
            strategy: EvictionStrategy::Adaptive,
            compression_enabled: true,
            compression_threshold_bytes: 1024,
            min_compression_savings: 0.3,
            max_entry_bytes: 10 * 1024 * 1024,
            memory_threshold_bytes: 100 * 1024 * 1024,
            eviction_batch_ratio: 0.1,
            frequency_threshold: 10,
            access_samples_per_key: 32,
            maintenance_interval_ms: 60_000,
            auto_optimize: true,
            optimization_interval_ms: 300_000,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    fn eviction_batch(&self) -> usize {
        ((self.max_size as f64 * self.eviction_batch_ratio).ceil() as usize).max(1)
    }
}

/// Cache usage statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub entries: usize,
    pub memory_usage_bytes: usize,
    pub evictions: u64,
    pub expirations: u64,
    pub rejected_sets: u64,
    pub compressed_entries: usize,
    pub avg_access_ms: f64,
    pub strategy: EvictionStrategy,
    pub max_size: usize,
    pub ttl_ms: u64,
}

/// Outcome of a self-tuning pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheOptimization {
    pub previous_strategy: EvictionStrategy,
    pub strategy: EvictionStrategy,
    pub previous_max_size: usize,
    pub max_size: usize,
    pub previous_ttl_ms: u64,
    pub ttl_ms: u64,
    pub patterns: PatternSummary,
    pub before: PerformanceSnapshot,
    pub after: PerformanceSnapshot,
    /// Weighted change in hit rate, latency and memory (positive is better).
    pub estimated_improvement: f64,
}

impl CacheOptimization {
    /// Whether the pass changed any setting.
    pub fn changed(&self) -> bool {
        self.previous_strategy != self.strategy
            || self.previous_max_size != self.max_size
            || self.previous_ttl_ms != self.ttl_ms
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
    rejected_sets: u64,
    accesses: u64,
    access_time: Duration,
}

#[derive(Debug)]
struct CacheState {
    config: CacheConfig,
    entries: HashMap<String, CacheEntry>,
    access_log: HashMap<String, VecDeque<Instant>>,
    counters: Counters,
    memory_usage: usize,
    seq: u64,
    last_optimized: Instant,
}

impl CacheState {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn recompute_memory(&mut self) {
        self.memory_usage = self.entries.values().map(|e| e.size_bytes).sum();
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        self.access_log.remove(key);
        self.entries.remove(key)
    }

    fn record_access(&mut self, key: &str, now: Instant) {
        let cap = self.config.access_samples_per_key.max(2);
        let log = self.access_log.entry(key.to_string()).or_default();
        log.push_back(now);
        while log.len() > cap {
            log.pop_front();
        }
    }

    fn record_latency(&mut self, started: Instant) {
        self.counters.accesses += 1;
        self.counters.access_time += started.elapsed();
    }

    fn hit_rate(&self) -> f64 {
        let total = self.counters.hits + self.counters.misses;
        if total == 0 {
            0.0
        } else {
            self.counters.hits as f64 / total as f64
        }
    }

    fn avg_access_ms(&self) -> f64 {
        if self.counters.accesses == 0 {
            0.0
        } else {
            self.counters.access_time.as_secs_f64() * 1000.0 / self.counters.accesses as f64
        }
    }

    fn snapshot(&self) -> PerformanceSnapshot {
        PerformanceSnapshot {
            hit_rate: self.hit_rate(),
            avg_access_ms: self.avg_access_ms(),
            memory_bytes: self.memory_usage,
        }
    }

    /// Evict `count` entries with the active strategy.
    fn evict(&mut self, count: usize, now: Instant) -> usize {
        let strategy = self.config.strategy;
        let victims = select_victims(self.entries.values(), strategy, count, now);
        for key in &victims {
            self.remove(key);
        }
        self.counters.evictions += victims.len() as u64;
        self.recompute_memory();
        if !victims.is_empty() {
            emit_cache_evicted(&strategy.to_string(), victims.len(), self.entries.len());
        }
        victims.len()
    }

    /// Evict until the store holds at most `limit` entries.
    fn evict_to(&mut self, limit: usize, now: Instant) -> usize {
        if self.entries.len() <= limit {
            return 0;
        }
        let excess = self.entries.len() - limit;
        self.evict(excess, now)
    }

    fn purge_expired(&mut self, now: Instant) -> usize {
        let ttl = self.config.ttl();
        let expired: Vec<String> = self
            .entries
            .values()
            .filter(|e| e.is_expired(now, ttl))
            .map(|e| e.key.clone())
            .collect();
        for key in &expired {
            self.remove(key);
        }
        self.counters.expirations += expired.len() as u64;
        if !expired.is_empty() {
            self.recompute_memory();
        }
        expired.len()
    }

    fn summarize(&self, now: Instant) -> PatternSummary {
        let active_window = self.config.ttl() / 2;
        let mut summary = PatternSummary {
            total_keys: self.entries.len(),
            ..Default::default()
        };
        let mut all_intervals = Vec::new();

        for entry in self.entries.values() {
            if entry.access_count >= self.config.frequency_threshold {
                summary.frequent += 1;
            }
            if entry.idle_for(now) <= active_window {
                summary.active += 1;
            }
            let Some(samples) = self.access_log.get(&entry.key) else {
                continue;
            };
            if let Some(pattern) = classify_pattern(samples) {
                summary.analyzed_keys += 1;
                match pattern {
                    AccessPattern::Temporal => summary.temporal += 1,
                    AccessPattern::Sequential => summary.sequential += 1,
                    AccessPattern::Random => summary.random += 1,
                }
            }
            all_intervals.extend(intervals_ms(samples));
        }

        if !all_intervals.is_empty() {
            summary.mean_interval_ms =
                Some(all_intervals.iter().sum::<f64>() / all_intervals.len() as f64);
        }
        summary
    }
}

enum Lookup {
    Missing,
    Expired,
    Present,
}

/// Generic key/value store with hot-swappable eviction strategy.
///
/// All operations serialize on one async mutex; `optimize` works on the
/// state it observes when it takes the lock, so concurrent writers never see
/// a size or TTL violation.
#[derive(Debug)]
pub struct CacheStore {
    state: Mutex<CacheState>,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl CacheStore {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            state: Mutex::new(CacheState {
                config,
                entries: HashMap::new(),
                access_log: HashMap::new(),
                counters: Counters::default(),
                memory_usage: 0,
                seq: 0,
                last_optimized: Instant::now(),
            }),
        }
    }

    /// Look up `key`. Expired entries are removed and count as misses.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let started = Instant::now();
        let mut state = self.state.lock().await;
        let now = Instant::now();
        let ttl = state.config.ttl();

        let lookup = match state.entries.get(key) {
            None => Lookup::Missing,
            Some(entry) if entry.is_expired(now, ttl) => Lookup::Expired,
            Some(_) => Lookup::Present,
        };

        match lookup {
            Lookup::Missing => {
                state.counters.misses += 1;
                state.record_latency(started);
                None
            }
            Lookup::Expired => {
                state.remove(key);
                state.counters.expirations += 1;
                state.counters.misses += 1;
                state.recompute_memory();
                state.record_latency(started);
                debug!(key = %key, "cache entry expired on read");
                None
            }
            Lookup::Present => {
                let seq = state.next_seq();
                state.record_access(key, now);
                let stored = match state.entries.get_mut(key) {
                    Some(entry) => {
                        entry.touch(now, seq);
                        entry.value.clone()
                    }
                    None => return None,
                };
                state.counters.hits += 1;
                state.record_latency(started);
                drop(state);
                Some(materialize(key, stored))
            }
        }
    }

    /// Whether `key` is present and unexpired. Does not touch statistics.
    pub async fn contains(&self, key: &str) -> bool {
        let state = self.state.lock().await;
        let ttl = state.config.ttl();
        state
            .entries
            .get(key)
            .is_some_and(|e| !e.is_expired(Instant::now(), ttl))
    }

    /// Store `value` under `key`. Returns `false` when the write is rejected;
    /// the store is left unchanged in that case.
    pub async fn set(&self, key: &str, value: Value, metadata: Option<EntryMetadata>) -> bool {
        let mut state = self.state.lock().await;
        match prepare(&state.config, key, value) {
            Ok((stored, size_bytes)) => {
                let now = Instant::now();
                if !state.entries.contains_key(key) && state.entries.len() >= state.config.max_size
                {
                    let batch = state.config.eviction_batch();
                    state.evict(batch, now);
                }
                let seq = state.next_seq();
                let entry = CacheEntry::new(
                    key.to_string(),
                    stored,
                    size_bytes,
                    metadata.unwrap_or_default(),
                    now,
                    seq,
                );
                state.entries.insert(key.to_string(), entry);
                state.record_access(key, now);
                state.recompute_memory();
                true
            }
            Err(e) => {
                state.counters.rejected_sets += 1;
                warn!(key = %key, error = %e, "cache set rejected");
                false
            }
        }
    }

    /// Remove `key`. Returns whether an entry was removed.
    pub async fn delete(&self, key: &str) -> bool {
        let mut state = self.state.lock().await;
        let removed = state.remove(key).is_some();
        if removed {
            state.recompute_memory();
        }
        removed
    }

    /// Drop every entry. Statistics are kept.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.entries.clear();
        state.access_log.clear();
        state.recompute_memory();
        info!("cache cleared");
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.entries.is_empty()
    }

    /// Keys currently held, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let state = self.state.lock().await;
        let mut keys: Vec<String> = state.entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn get_stats(&self) -> CacheStats {
        let state = self.state.lock().await;
        CacheStats {
            hits: state.counters.hits,
            misses: state.counters.misses,
            hit_rate: state.hit_rate(),
            entries: state.entries.len(),
            memory_usage_bytes: state.memory_usage,
            evictions: state.counters.evictions,
            expirations: state.counters.expirations,
            rejected_sets: state.counters.rejected_sets,
            compressed_entries: state.entries.values().filter(|e| e.compressed).count(),
            avg_access_ms: state.avg_access_ms(),
            strategy: state.config.strategy,
            max_size: state.config.max_size,
            ttl_ms: state.config.ttl_ms,
        }
    }

    pub async fn get_config(&self) -> CacheConfig {
        self.state.lock().await.config.clone()
    }

    /// Mutate the configuration in place. Shrinking `max_size` evicts down to
    /// the new ceiling immediately.
    pub async fn update_config<F>(&self, update: F)
    where
        F: FnOnce(&mut CacheConfig),
    {
        let mut state = self.state.lock().await;
        update(&mut state.config);
        let limit = state.config.max_size;
        state.evict_to(limit, Instant::now());
        debug!(config = ?state.config, "cache config updated");
    }

    /// Hot-swap the eviction strategy.
    pub async fn set_strategy(&self, strategy: EvictionStrategy) {
        self.update_config(|c| c.strategy = strategy).await;
    }

    /// Remove every expired entry. Returns the number removed.
    pub async fn purge_expired(&self) -> usize {
        let mut state = self.state.lock().await;
        state.purge_expired(Instant::now())
    }

    /// Analyse access patterns and retune strategy, capacity and TTL.
    pub async fn optimize(&self) -> CacheOptimization {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        let before = state.snapshot();
        let patterns = state.summarize(now);

        let previous_strategy = state.config.strategy;
        let previous_max_size = state.config.max_size;
        let previous_ttl_ms = state.config.ttl_ms;

        let strategy = recommend_strategy(&patterns, previous_strategy);
        let max_size = recommend_capacity(&patterns, previous_max_size);
        let ttl = recommend_ttl(&patterns, state.config.ttl());

        state.config.strategy = strategy;
        state.config.max_size = max_size;
        state.config.ttl_ms = ttl.as_millis() as u64;
        state.purge_expired(now);
        state.evict_to(max_size, now);
        state.last_optimized = now;

        let after = state.snapshot();
        let optimization = CacheOptimization {
            previous_strategy,
            strategy,
            previous_max_size,
            max_size,
            previous_ttl_ms,
            ttl_ms: state.config.ttl_ms,
            patterns,
            before,
            after,
            estimated_improvement: estimate_improvement(&before, &after),
        };

        info!(
            from = %previous_strategy,
            to = %strategy,
            max_size = max_size,
            ttl_ms = optimization.ttl_ms,
            improvement = optimization.estimated_improvement,
            "cache optimized"
        );
        optimization
    }

    /// One maintenance pass: purge expired entries, relieve memory pressure
    /// and re-run tuning when it is due.
    pub async fn run_maintenance(&self) {
        let due_for_tuning = {
            let mut state = self.state.lock().await;
            let now = Instant::now();
            state.purge_expired(now);
            if state.memory_usage > state.config.memory_threshold_bytes {
                let batch = state.config.eviction_batch();
                warn!(
                    memory_bytes = state.memory_usage,
                    threshold = state.config.memory_threshold_bytes,
                    "cache memory above threshold"
                );
                state.evict(batch, now);
            }
            state.config.auto_optimize
                && now.saturating_duration_since(state.last_optimized)
                    >= Duration::from_millis(state.config.optimization_interval_ms)
        };
        if due_for_tuning {
            self.optimize().await;
        }
    }

    /// Start the periodic maintenance task. Stop it (or drop it) on shutdown.
    pub async fn start_maintenance(self: &Arc<Self>) -> ScheduledTask {
        let period = Duration::from_millis(self.get_config().await.maintenance_interval_ms);
        let store = Arc::clone(self);
        ScheduledTask::every("cache-maintenance", period, move || {
            let store = Arc::clone(&store);
            async move { store.run_maintenance().await }
        })
    }
}

/// Size the value and pick raw or compressed storage.
fn prepare(config: &CacheConfig, key: &str, value: Value) -> CacheResult<(StoredValue, usize)> {
    let bytes = serde_json::to_vec(&value)?;
    if bytes.len() > config.max_entry_bytes {
        return Err(CacheError::EntryTooLarge {
            key: key.to_string(),
            size: bytes.len(),
            limit: config.max_entry_bytes,
        });
    }

    if config.compression_enabled && bytes.len() >= config.compression_threshold_bytes {
        match compress(&bytes) {
            Ok(packed) if savings_ratio(bytes.len(), packed.len()) >= config.min_compression_savings => {
                let size = packed.len();
                return Ok((StoredValue::Compressed(packed), size));
            }
            Ok(_) => {}
            Err(e) => warn!(key = %key, error = %e, "compression failed, storing raw"),
        }
    }

    Ok((StoredValue::Raw(value), bytes.len()))
}

/// Turn a stored value back into a payload. A payload that cannot be
/// inflated is returned in its encoded form (hex) rather than failing the read.
fn materialize(key: &str, stored: StoredValue) -> Value {
    match stored {
        StoredValue::Raw(value) => value,
        StoredValue::Compressed(bytes) => {
            match decompress(&bytes).and_then(|raw| Ok(serde_json::from_slice::<Value>(&raw)?)) {
                Ok(value) => value,
                Err(e) => {
                    warn!(key = %key, error = %e, "decompression failed, returning encoded payload");
                    Value::String(hex::encode(bytes))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::tuning::MIN_CAPACITY;
    use serde_json::json;

    fn small(max_size: usize, strategy: EvictionStrategy) -> CacheStore {
        CacheStore::new(CacheConfig {
            max_size,
            strategy,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let cache = CacheStore::default();
        assert!(cache.set("a", json!({"x": 1}), None).await);
        assert_eq!(cache.get("a").await, Some(json!({"x": 1})));
        assert!(cache.get("missing").await.is_none());

        let stats = cache.get_stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
        assert!(stats.memory_usage_bytes > 0);
    }

    #[tokio::test]
    async fn test_large_repetitive_value_is_compressed() {
        let cache = CacheStore::default();
        let body = "the same sentence again and again. ".repeat(200);
        assert!(cache.set("doc", json!(body), None).await);

        let stats = cache.get_stats().await;
        assert_eq!(stats.compressed_entries, 1);
        assert!(stats.memory_usage_bytes < body.len() / 2);
        assert_eq!(cache.get("doc").await, Some(json!(body)));
    }

    #[tokio::test]
    async fn test_compression_disabled_stores_raw() {
        let cache = CacheStore::new(CacheConfig {
            compression_enabled: false,
            ..Default::default()
        });
        let body = "x".repeat(4096);
        cache.set("doc", json!(body), None).await;
        assert_eq!(cache.get_stats().await.compressed_entries, 0);
    }

    #[tokio::test]
    async fn test_oversized_value_is_rejected_without_change() {
        let cache = CacheStore::new(CacheConfig {
            max_entry_bytes: 16,
            ..Default::default()
        });
        assert!(cache.set("ok", json!("tiny"), None).await);
        assert!(!cache.set("big", json!("a string well over sixteen bytes"), None).await);
        assert_eq!(cache.keys().await, vec!["ok".to_string()]);
        assert_eq!(cache.get_stats().await.rejected_sets, 1);
    }

    #[tokio::test]
    async fn test_corrupt_compressed_entry_returns_encoded_payload() {
        let cache = CacheStore::default();
        {
            let mut state = cache.state.lock().await;
            let now = Instant::now();
            let entry = CacheEntry::new(
                "broken".into(),
                StoredValue::Compressed(vec![1, 2, 3]),
                3,
                EntryMetadata::default(),
                now,
                1,
            );
            state.entries.insert("broken".into(), entry);
        }
        assert_eq!(cache.get("broken").await, Some(json!("010203")));
    }

    #[tokio::test]
    async fn test_capacity_batch_eviction() {
        let cache = small(10, EvictionStrategy::Fifo);
        for i in 0..10 {
            cache.set(&format!("k{i}"), json!(i), None).await;
        }
        cache.set("k10", json!(10), None).await;
        // 10% of 10 is one entry per batch
        assert_eq!(cache.len().await, 10);
        assert!(!cache.contains("k0").await);
        assert!(cache.contains("k10").await);
    }

    #[tokio::test]
    async fn test_overwrite_does_not_evict() {
        let cache = small(2, EvictionStrategy::Fifo);
        cache.set("a", json!(1), None).await;
        cache.set("b", json!(2), None).await;
        cache.set("a", json!(3), None).await;
        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.get("a").await, Some(json!(3)));
    }

    #[tokio::test]
    async fn test_shrinking_max_size_evicts() {
        let cache = small(5, EvictionStrategy::Lru);
        for i in 0..5 {
            cache.set(&format!("k{i}"), json!(i), None).await;
        }
        cache.update_config(|c| c.max_size = 2).await;
        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.keys().await, vec!["k3".to_string(), "k4".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let cache = CacheStore::default();
        cache.set("a", json!(1), None).await;
        cache.set("b", json!(2), None).await;
        assert!(cache.delete("a").await);
        assert!(!cache.delete("a").await);
        cache.clear().await;
        assert!(cache.is_empty().await);
        assert_eq!(cache.get_stats().await.memory_usage_bytes, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_optimize_switches_to_lru_for_regular_access() {
        let cache = small(100, EvictionStrategy::Adaptive);
        for i in 0..4 {
            cache.set(&format!("k{i}"), json!(i), None).await;
        }
        for _ in 0..5 {
            tokio::time::advance(Duration::from_millis(100)).await;
            for i in 0..4 {
                cache.get(&format!("k{i}")).await;
            }
        }

        let result = cache.optimize().await;
        assert_eq!(result.previous_strategy, EvictionStrategy::Adaptive);
        assert_eq!(result.strategy, EvictionStrategy::Lru);
        assert_eq!(result.patterns.temporal, 4);
        assert!(result.changed());
        assert_eq!(cache.get_stats().await.strategy, EvictionStrategy::Lru);
    }

    #[tokio::test]
    async fn test_repeated_optimize_keeps_capacity_floor() {
        let cache = small(100, EvictionStrategy::Lru);
        cache.set("only", json!(1), None).await;
        cache.get("only").await;

        for _ in 0..10 {
            cache.optimize().await;
        }
        assert_eq!(cache.get_stats().await.max_size, MIN_CAPACITY);
        assert_eq!(cache.get("only").await, Some(json!(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_maintenance_purges_expired() {
        let cache = Arc::new(CacheStore::new(CacheConfig {
            ttl_ms: 1_000,
            maintenance_interval_ms: 500,
            auto_optimize: false,
            ..Default::default()
        }));
        cache.set("a", json!(1), None).await;
        let task = cache.start_maintenance().await;

        tokio::time::sleep(Duration::from_millis(1_600)).await;
        assert!(cache.is_empty().await);
        assert_eq!(cache.get_stats().await.expirations, 1);
        task.stop().await;
    }

    #[tokio::test]
    async fn test_maintenance_relieves_memory_pressure() {
        let cache = CacheStore::new(CacheConfig {
            memory_threshold_bytes: 1,
            compression_enabled: false,
            max_size: 10,
            auto_optimize: false,
            ..Default::default()
        });
        for i in 0..5 {
            cache.set(&format!("k{i}"), json!(i), None).await;
        }
        cache.run_maintenance().await;
        assert_eq!(cache.len().await, 4);
    }
}
