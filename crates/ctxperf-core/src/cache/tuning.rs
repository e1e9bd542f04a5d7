//! Access-pattern analysis and self-tuning recommendations.
//!
//! Everything here is a pure function of an access summary so strategy
//! switching stays out of the `get`/`set` hot path and can be tested alone.

use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::strategy::EvictionStrategy;

/// Coefficient of variation below which inter-access gaps count as regular.
const TEMPORAL_CV_LIMIT: f64 = 0.3;
/// Coefficient of variation below which gaps count as sequential.
const SEQUENTIAL_CV_LIMIT: f64 = 1.0;
/// Minimum samples before a key is classified.
const MIN_SAMPLES: usize = 3;
/// Capacity tuning never shrinks below this, or below a smaller configured size.
pub const MIN_CAPACITY: usize = 16;

/// Observed access shape of a single key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessPattern {
    /// Regular, evenly spaced re-reads.
    Temporal,
    /// Moderately regular bursts.
    Sequential,
    /// No usable regularity.
    Random,
}

/// Classify a key from its access timestamps using the variance of the
/// inter-access intervals. Returns `None` with too few samples.
pub fn classify_pattern(samples: &VecDeque<Instant>) -> Option<AccessPattern> {
    if samples.len() < MIN_SAMPLES {
        return None;
    }
    let intervals = intervals_ms(samples);
    let mean = intervals.iter().sum::<f64>() / intervals.len() as f64;
    if mean <= 0.0 {
        // a burst of same-instant reads is as regular as it gets
        return Some(AccessPattern::Temporal);
    }
    let variance =
        intervals.iter().map(|i| (i - mean).powi(2)).sum::<f64>() / intervals.len() as f64;
    let cv = variance.sqrt() / mean;

    Some(if cv < TEMPORAL_CV_LIMIT {
        AccessPattern::Temporal
    } else if cv < SEQUENTIAL_CV_LIMIT {
        AccessPattern::Sequential
    } else {
        AccessPattern::Random
    })
}

/// Gaps between consecutive samples in milliseconds.
pub fn intervals_ms(samples: &VecDeque<Instant>) -> Vec<f64> {
    samples
        .iter()
        .zip(samples.iter().skip(1))
        .map(|(a, b)| b.saturating_duration_since(*a).as_secs_f64() * 1000.0)
        .collect()
}

/// Aggregate view of all keys' access behaviour.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternSummary {
    pub total_keys: usize,
    pub analyzed_keys: usize,
    pub temporal: usize,
    pub sequential: usize,
    pub random: usize,
    /// Keys whose access count reached the frequency threshold.
    pub frequent: usize,
    /// Keys read within the activity window.
    pub active: usize,
    pub mean_interval_ms: Option<f64>,
}

impl PatternSummary {
    fn share(part: usize, whole: usize) -> f64 {
        if whole == 0 {
            0.0
        } else {
            part as f64 / whole as f64
        }
    }

    pub fn temporal_share(&self) -> f64 {
        Self::share(self.temporal, self.analyzed_keys)
    }

    pub fn random_share(&self) -> f64 {
        Self::share(self.random, self.analyzed_keys)
    }

    pub fn frequent_share(&self) -> f64 {
        Self::share(self.frequent, self.total_keys)
    }
}

/// Choose a strategy for the observed access mix.
///
/// LRU when most keys are temporal, LFU when a large share is hot, FIFO when
/// most are random, Adaptive otherwise. With nothing analysed the current
/// strategy is kept.
pub fn recommend_strategy(summary: &PatternSummary, current: EvictionStrategy) -> EvictionStrategy {
    if summary.analyzed_keys == 0 && summary.frequent == 0 {
        return current;
    }
    if summary.temporal_share() > 0.5 {
        EvictionStrategy::Lru
    } else if summary.frequent_share() > 0.3 {
        EvictionStrategy::Lfu
    } else if summary.random_share() > 0.5 {
        EvictionStrategy::Fifo
    } else {
        EvictionStrategy::Adaptive
    }
}

/// Advisable TTL: 2.5x the mean inter-access gap, clamped to
/// `[0.5x, 2x]` of the current TTL.
pub fn recommend_ttl(summary: &PatternSummary, current: Duration) -> Duration {
    let Some(mean_ms) = summary.mean_interval_ms else {
        return current;
    };
    let target_ms = mean_ms * 2.5;
    let current_ms = current.as_secs_f64() * 1000.0;
    let clamped = target_ms.clamp(current_ms * 0.5, current_ms * 2.0);
    Duration::from_millis(clamped.round() as u64)
}

/// Advisable capacity scaled to the active key count with 50% headroom,
/// kept within `[current / 2, current * 2]` and never below
/// [`MIN_CAPACITY`] (or `current`, when that is already smaller).
pub fn recommend_capacity(summary: &PatternSummary, current: usize) -> usize {
    if summary.total_keys == 0 {
        return current;
    }
    let target = (summary.active as f64 * 1.5).ceil() as usize;
    let floor = (current / 2).max(MIN_CAPACITY.min(current)).max(1);
    let ceiling = current.saturating_mul(2).max(floor);
    target.clamp(floor, ceiling)
}

/// Point-in-time cache performance used to score a tuning pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub hit_rate: f64,
    pub avg_access_ms: f64,
    pub memory_bytes: usize,
}

/// Weighted improvement between two snapshots.
///
/// `0.5 * hit-rate delta + 0.3 * relative latency drop + 0.2 * relative
/// memory drop`. Positive means better.
pub fn estimate_improvement(before: &PerformanceSnapshot, after: &PerformanceSnapshot) -> f64 {
    let hit = after.hit_rate - before.hit_rate;
    let latency = if before.avg_access_ms > 0.0 {
        (before.avg_access_ms - after.avg_access_ms) / before.avg_access_ms
    } else {
        0.0
    };
    let memory = if before.memory_bytes > 0 {
        (before.memory_bytes as f64 - after.memory_bytes as f64) / before.memory_bytes as f64
    } else {
        0.0
    };
    0.5 * hit + 0.3 * latency + 0.2 * memory
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(gaps_ms: &[u64]) -> VecDeque<Instant> {
        let mut at = Instant::now();
        let mut out = VecDeque::from([at]);
        for gap in gaps_ms {
            at += Duration::from_millis(*gap);
            out.push_back(at);
        }
        out
    }

    #[test]
    fn test_regular_gaps_are_temporal() {
        assert_eq!(
            classify_pattern(&samples(&[100, 100, 100, 100])),
            Some(AccessPattern::Temporal)
        );
    }

    #[test]
    fn test_erratic_gaps_are_random() {
        assert_eq!(
            classify_pattern(&samples(&[1, 1, 1, 5000])),
            Some(AccessPattern::Random)
        );
    }

    #[test]
    fn test_too_few_samples_unclassified() {
        assert_eq!(classify_pattern(&samples(&[100])), None);
    }

    #[test]
    fn test_strategy_choice() {
        let temporal = PatternSummary {
            total_keys: 10,
            analyzed_keys: 10,
            temporal: 8,
            random: 2,
            ..Default::default()
        };
        assert_eq!(
            recommend_strategy(&temporal, EvictionStrategy::Adaptive),
            EvictionStrategy::Lru
        );

        let hot = PatternSummary {
            total_keys: 10,
            analyzed_keys: 2,
            random: 1,
            sequential: 1,
            frequent: 5,
            ..Default::default()
        };
        assert_eq!(
            recommend_strategy(&hot, EvictionStrategy::Adaptive),
            EvictionStrategy::Lfu
        );

        let random = PatternSummary {
            total_keys: 10,
            analyzed_keys: 10,
            random: 7,
            temporal: 3,
            ..Default::default()
        };
        assert_eq!(
            recommend_strategy(&random, EvictionStrategy::Lru),
            EvictionStrategy::Fifo
        );

        let empty = PatternSummary::default();
        assert_eq!(
            recommend_strategy(&empty, EvictionStrategy::Lfu),
            EvictionStrategy::Lfu
        );
    }

    #[test]
    fn test_ttl_is_clamped() {
        let current = Duration::from_secs(100);
        let fast = PatternSummary {
            mean_interval_ms: Some(1_000.0),
            ..Default::default()
        };
        assert_eq!(recommend_ttl(&fast, current), Duration::from_secs(50));

        let slow = PatternSummary {
            mean_interval_ms: Some(1_000_000.0),
            ..Default::default()
        };
        assert_eq!(recommend_ttl(&slow, current), Duration::from_secs(200));

        let middle = PatternSummary {
            mean_interval_ms: Some(40_000.0),
            ..Default::default()
        };
        assert_eq!(recommend_ttl(&middle, current), Duration::from_secs(100));
    }

    #[test]
    fn test_capacity_tracks_active_keys() {
        let summary = PatternSummary {
            total_keys: 50,
            active: 40,
            ..Default::default()
        };
        assert_eq!(recommend_capacity(&summary, 100), 60);
        assert_eq!(recommend_capacity(&summary, 20), 40);
        assert_eq!(recommend_capacity(&PatternSummary::default(), 100), 100);
    }

    #[test]
    fn test_capacity_never_shrinks_below_floor() {
        let idle = PatternSummary {
            total_keys: 2,
            active: 1,
            ..Default::default()
        };
        let mut capacity = 1000;
        for _ in 0..20 {
            capacity = recommend_capacity(&idle, capacity);
        }
        assert_eq!(capacity, MIN_CAPACITY);

        // a cache configured smaller than the floor keeps its size
        assert_eq!(recommend_capacity(&idle, 8), 8);
    }

    #[test]
    fn test_improvement_rewards_hit_rate_and_memory() {
        let before = PerformanceSnapshot {
            hit_rate: 0.5,
            avg_access_ms: 2.0,
            memory_bytes: 1000,
        };
        let after = PerformanceSnapshot {
            hit_rate: 0.7,
            avg_access_ms: 1.0,
            memory_bytes: 500,
        };
        let score = estimate_improvement(&before, &after);
        assert!((score - (0.1 + 0.15 + 0.1)).abs() < 1e-9);
    }
}
