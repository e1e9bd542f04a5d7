//! Context fragments, token estimation and importance scoring.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Average characters per token used for every estimate.
pub const CHARS_PER_TOKEN: usize = 4;

/// Estimate the token count of `text`.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Origin of a fragment. The variant order mirrors its base weight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentKind {
    System,
    Function,
    #[default]
    Context,
    User,
    Generated,
}

impl FragmentKind {
    /// Base contribution to importance.
    pub fn weight(self) -> f64 {
        match self {
            Self::System => 0.5,
            Self::Function => 0.4,
            Self::Context => 0.3,
            Self::User => 0.2,
            Self::Generated => 0.1,
        }
    }
}

impl fmt::Display for FragmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::System => "system",
            Self::Function => "function",
            Self::Context => "context",
            Self::User => "user",
            Self::Generated => "generated",
        };
        f.write_str(name)
    }
}

/// Importance of a fragment at `now`.
///
/// `kind weight + 0.3 * priority + 0.2 * recency`, where recency decays
/// linearly from 1 to 0 over `horizon_ms`. Clamped to `[0, 1]`.
pub fn compute_importance(
    kind: FragmentKind,
    priority: f64,
    timestamp: DateTime<Utc>,
    now: DateTime<Utc>,
    horizon_ms: u64,
) -> f64 {
    let age_ms = (now - timestamp).num_milliseconds().max(0) as f64;
    let recency = if horizon_ms == 0 {
        0.0
    } else {
        (1.0 - age_ms / horizon_ms as f64).max(0.0)
    };
    (kind.weight() + 0.3 * priority.clamp(0.0, 1.0) + 0.2 * recency).clamp(0.0, 1.0)
}

/// A single labeled unit of context text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextFragment {
    pub id: String,
    pub content: String,
    pub kind: FragmentKind,
    /// Caller-assigned priority, 0.0 - 1.0.
    pub priority: f64,
    /// Derived when the fragment is added.
    pub importance: f64,
    pub tokens: usize,
    pub timestamp: DateTime<Utc>,
    pub dependencies: Vec<String>,
    pub compressed: bool,
    /// Phrase table for dictionary-compressed content; see [`super::expand`].
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dictionary: Vec<String>,
}

impl ContextFragment {
    pub fn new(id: impl Into<String>, content: impl Into<String>, kind: FragmentKind) -> Self {
        let content = content.into();
        let tokens = estimate_tokens(&content);
        Self {
            id: id.into(),
            content,
            kind,
            priority: 0.5,
            importance: 0.0,
            tokens,
            timestamp: Utc::now(),
            dependencies: Vec::new(),
            compressed: false,
            dictionary: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = priority.clamp(0.0, 1.0);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Replace the content and refresh the token estimate.
    pub(crate) fn replace_content(&mut self, content: String, dictionary: Vec<String>) {
        self.tokens = estimate_tokens(&content);
        self.content = content;
        self.dictionary = dictionary;
        self.compressed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_token_estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn test_importance_orders_kinds() {
        let now = Utc::now();
        let system = compute_importance(FragmentKind::System, 0.5, now, now, 3_600_000);
        let generated = compute_importance(FragmentKind::Generated, 0.5, now, now, 3_600_000);
        assert!(system > generated);
        assert!((system - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_recency_decays_to_zero_at_horizon() {
        let now = Utc::now();
        let old = now - Duration::hours(2);
        let half = now - Duration::minutes(30);
        let stale = compute_importance(FragmentKind::User, 0.0, old, now, 3_600_000);
        let midway = compute_importance(FragmentKind::User, 0.0, half, now, 3_600_000);
        assert!((stale - 0.2).abs() < 1e-9);
        assert!((midway - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_importance_is_clamped() {
        let now = Utc::now();
        let score = compute_importance(FragmentKind::System, 5.0, now, now, 3_600_000);
        assert!(score <= 1.0);
    }
}
