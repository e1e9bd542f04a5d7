//! Successor-frequency prediction over the access history.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// One observed access.
#[derive(Debug, Clone)]
pub struct AccessRecord {
    pub id: String,
    pub at: Instant,
    pub source: Option<String>,
}

/// A resource expected to be requested soon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub id: String,
    /// Share of observed successors that were this resource.
    pub probability: f64,
    /// Probability discounted by sample size: `p * n / (n + 1)`.
    pub confidence: f64,
    /// Mean observed gap before the successor was requested.
    pub expected_in_ms: u64,
}

#[derive(Debug, Clone)]
struct Pending {
    id: String,
    made_at: Instant,
    deadline: Instant,
}

/// Bounded access history plus the bookkeeping needed to score past
/// predictions.
#[derive(Debug)]
pub struct PredictionModel {
    history: VecDeque<AccessRecord>,
    capacity: usize,
    pending: Vec<Pending>,
    window: Duration,
    hits: u64,
    misses: u64,
}

impl PredictionModel {
    pub fn new(capacity: usize, window: Duration) -> Self {
        Self {
            history: VecDeque::new(),
            capacity: capacity.max(2),
            pending: Vec::new(),
            window,
            hits: 0,
            misses: 0,
        }
    }

    pub fn record(&mut self, id: &str, at: Instant, source: Option<String>) {
        self.history.push_back(AccessRecord {
            id: id.to_string(),
            at,
            source,
        });
        while self.history.len() > self.capacity {
            self.history.pop_front();
        }
        self.evaluate(at);
    }

    pub fn history(&self) -> impl Iterator<Item = &AccessRecord> {
        self.history.iter()
    }

    /// Successors of `id`, most confident first.
    pub fn predict(&self, id: &str) -> Vec<Prediction> {
        let mut followers: HashMap<&str, (usize, Duration)> = HashMap::new();
        let mut n = 0usize;
        for (prev, next) in self.history.iter().zip(self.history.iter().skip(1)) {
            if prev.id != id || next.id == id {
                continue;
            }
            n += 1;
            let slot = followers.entry(next.id.as_str()).or_default();
            slot.0 += 1;
            slot.1 += next.at.saturating_duration_since(prev.at);
        }
        if n == 0 {
            return Vec::new();
        }

        let mut out: Vec<Prediction> = followers
            .into_iter()
            .map(|(next, (count, gap))| {
                let probability = count as f64 / n as f64;
                Prediction {
                    id: next.to_string(),
                    probability,
                    confidence: probability * n as f64 / (n as f64 + 1.0),
                    expected_in_ms: (gap / count as u32).as_millis() as u64,
                }
            })
            .collect();
        out.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| a.id.cmp(&b.id))
        });
        out
    }

    /// Remember predictions so they can be scored when they come due.
    pub fn track(&mut self, predictions: &[Prediction], now: Instant) {
        for p in predictions {
            self.pending.push(Pending {
                id: p.id.clone(),
                made_at: now,
                deadline: now + Duration::from_millis(p.expected_in_ms) + self.window,
            });
        }
    }

    /// Score pending predictions: a hit when the resource was accessed
    /// before its deadline, a miss once the deadline passes without one.
    pub fn evaluate(&mut self, now: Instant) {
        let history = &self.history;
        let mut hits = 0;
        let mut misses = 0;
        self.pending.retain(|p| {
            let materialized = history
                .iter()
                .any(|r| r.id == p.id && r.at > p.made_at && r.at <= p.deadline);
            if materialized {
                hits += 1;
                false
            } else if now > p.deadline {
                misses += 1;
                false
            } else {
                true
            }
        });
        self.hits += hits;
        self.misses += misses;
    }

    /// Share of scored predictions that came true; zero before any scoring.
    pub fn accuracy(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
