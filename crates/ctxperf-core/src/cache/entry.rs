//! Cache entries and their bookkeeping.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;

/// Caller-supplied metadata stored alongside a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryMetadata {
    pub source: Option<String>,
    /// 0.0 - 1.0
    pub priority: f64,
    pub tags: Vec<String>,
    pub dependencies: Vec<String>,
    pub version: u32,
}

impl Default for EntryMetadata {
    fn default() -> Self {
        Self {
            source: None,
            priority: 0.5,
            tags: Vec::new(),
            dependencies: Vec::new(),
            version: 1,
        }
    }
}

impl EntryMetadata {
    pub fn from_source(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            ..Self::default()
        }
    }

    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = priority.clamp(0.0, 1.0);
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

/// Stored representation of a value.
#[derive(Debug, Clone)]
pub(crate) enum StoredValue {
    Raw(Value),
    Compressed(Vec<u8>),
}

/// A single cache entry.
///
/// `insert_seq` and `access_seq` are a logical clock that orders FIFO and LRU
/// eviction even when two operations share the same `Instant`.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub(crate) value: StoredValue,
    pub created_at: Instant,
    pub last_accessed: Instant,
    pub access_count: u64,
    pub size_bytes: usize,
    pub compressed: bool,
    pub metadata: EntryMetadata,
    pub(crate) insert_seq: u64,
    pub(crate) access_seq: u64,
}

impl CacheEntry {
    pub(crate) fn new(
        key: String,
        value: StoredValue,
        size_bytes: usize,
        metadata: EntryMetadata,
        now: Instant,
        seq: u64,
    ) -> Self {
        let compressed = matches!(value, StoredValue::Compressed(_));
        Self {
            key,
            value,
            created_at: now,
            last_accessed: now,
            access_count: 0,
            size_bytes,
            compressed,
            metadata,
            insert_seq: seq,
            access_seq: seq,
        }
    }

    /// True once the entry has outlived `ttl`.
    pub fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.created_at) > ttl
    }

    /// Time since the entry was last read (or written).
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_accessed)
    }

    pub(crate) fn touch(&mut self, now: Instant, seq: u64) {
        self.last_accessed = now;
        self.access_count += 1;
        self.access_seq = seq;
    }
}
