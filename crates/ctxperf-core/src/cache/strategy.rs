//! Eviction strategies and victim selection.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::entry::CacheEntry;

/// Rule used to pick which entries leave the store when it is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionStrategy {
    /// Least recently accessed first.
    Lru,
    /// Least frequently accessed first.
    Lfu,
    /// Oldest insertion first.
    Fifo,
    /// Weighted blend of idle time and access frequency.
    #[default]
    Adaptive,
}

impl fmt::Display for EvictionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Lru => "lru",
            Self::Lfu => "lfu",
            Self::Fifo => "fifo",
            Self::Adaptive => "adaptive",
        };
        f.write_str(name)
    }
}

const ADAPTIVE_IDLE_WEIGHT: f64 = 0.6;
const ADAPTIVE_FREQUENCY_WEIGHT: f64 = 0.4;

/// Adaptive eviction score; higher means evict sooner.
///
/// `0.6 * idle / max_idle + 0.4 * 1 / (access_count + 1)`
pub fn adaptive_score(entry: &CacheEntry, now: Instant, max_idle_secs: f64) -> f64 {
    let idle = entry.idle_for(now).as_secs_f64();
    let normalized_idle = if max_idle_secs > 0.0 {
        idle / max_idle_secs
    } else {
        0.0
    };
    ADAPTIVE_IDLE_WEIGHT * normalized_idle
        + ADAPTIVE_FREQUENCY_WEIGHT * (1.0 / (entry.access_count as f64 + 1.0))
}

/// Pick up to `count` keys to evict under `strategy`.
///
/// Ties are broken by the logical access/insert clock and then by key so the
/// result is deterministic.
pub fn select_victims<'a, I>(
    entries: I,
    strategy: EvictionStrategy,
    count: usize,
    now: Instant,
) -> Vec<String>
where
    I: IntoIterator<Item = &'a CacheEntry>,
{
    let mut candidates: Vec<&CacheEntry> = entries.into_iter().collect();
    if count == 0 || candidates.is_empty() {
        return Vec::new();
    }

    match strategy {
        EvictionStrategy::Lru => {
            candidates.sort_by(|a, b| a.access_seq.cmp(&b.access_seq).then_with(|| a.key.cmp(&b.key)))
        }
        EvictionStrategy::Lfu => candidates.sort_by(|a, b| {
            a.access_count
                .cmp(&b.access_count)
                .then_with(|| a.access_seq.cmp(&b.access_seq))
                .then_with(|| a.key.cmp(&b.key))
        }),
        EvictionStrategy::Fifo => {
            candidates.sort_by(|a, b| a.insert_seq.cmp(&b.insert_seq).then_with(|| a.key.cmp(&b.key)))
        }
        EvictionStrategy::Adaptive => {
            let max_idle = candidates
                .iter()
                .map(|e| e.idle_for(now).as_secs_f64())
                .fold(0.0_f64, f64::max);
            let mut scored: Vec<(f64, &CacheEntry)> = candidates
                .iter()
                .map(|e| (adaptive_score(e, now, max_idle), *e))
                .collect();
            scored.sort_by(|(sa, a), (sb, b)| {
                sb.partial_cmp(sa)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.access_seq.cmp(&b.access_seq))
                    .then_with(|| a.key.cmp(&b.key))
            });
            candidates = scored.into_iter().map(|(_, e)| e).collect();
        }
    }

    candidates
        .into_iter()
        .take(count)
        .map(|e| e.key.clone())
        .collect()
}
