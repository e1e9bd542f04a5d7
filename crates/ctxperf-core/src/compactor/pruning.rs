//! Removal candidate selection.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::analysis::RedundancyReport;
use super::fragment::ContextFragment;

/// Rule that nominates fragments for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PruningStrategy {
    /// Importance below the priority threshold.
    ImportanceThreshold,
    /// Older than the configured maximum age.
    MaxAge,
    /// Duplicate of a more important or earlier fragment.
    Redundancy,
}

/// Inputs shared by every strategy.
#[derive(Debug, Clone)]
pub struct PruningPolicy<'a> {
    pub strategies: &'a [PruningStrategy],
    pub priority_threshold: f64,
    pub max_age_ms: u64,
    pub preserve_important: bool,
    pub preservation_threshold: f64,
    pub now: DateTime<Utc>,
}

/// Outcome of a pruning pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PruningResult {
    /// Every nominated fragment, before preservation.
    pub candidates: Vec<String>,
    /// Nominated but kept for importance.
    pub preserved: Vec<String>,
    pub removed: Vec<String>,
    /// Removed to fit the context budget.
    pub budget_removed: Vec<String>,
    pub tokens_reclaimed: usize,
}

fn nominated_by(
    strategy: PruningStrategy,
    fragment: &ContextFragment,
    policy: &PruningPolicy<'_>,
    redundant: &BTreeSet<&str>,
) -> bool {
    match strategy {
        PruningStrategy::ImportanceThreshold => fragment.importance < policy.priority_threshold,
        PruningStrategy::MaxAge => {
            let age_ms = (policy.now - fragment.timestamp).num_milliseconds();
            age_ms > policy.max_age_ms as i64
        }
        PruningStrategy::Redundancy => redundant.contains(fragment.id.as_str()),
    }
}

/// Union of every strategy's candidates, split into removals and
/// preserved fragments. Returned ids follow fragment order.
pub fn select_for_removal(
    fragments: &[ContextFragment],
    redundancy: &RedundancyReport,
    policy: &PruningPolicy<'_>,
) -> (Vec<String>, Vec<String>, Vec<String>) {
    let redundant: BTreeSet<&str> = redundancy.redundant_ids.iter().map(String::as_str).collect();
    let mut candidates = Vec::new();
    let mut preserved = Vec::new();
    let mut removed = Vec::new();

    for fragment in fragments {
        let nominated = policy
            .strategies
            .iter()
            .any(|s| nominated_by(*s, fragment, policy, &redundant));
        if !nominated {
            continue;
        }
        candidates.push(fragment.id.clone());
        if policy.preserve_important && fragment.importance >= policy.preservation_threshold {
            preserved.push(fragment.id.clone());
        } else {
            removed.push(fragment.id.clone());
        }
    }
    (candidates, preserved, removed)
}

/// Fragments to drop so the total fits `budget`: non-preserved ones in
/// ascending importance first, preserved ones only if still over.
pub fn select_for_budget(
    fragments: &[ContextFragment],
    budget: usize,
    preservation_threshold: f64,
) -> Vec<String> {
    let mut total: usize = fragments.iter().map(|f| f.tokens).sum();
    if total <= budget {
        return Vec::new();
    }

    let mut order: Vec<&ContextFragment> = fragments.iter().collect();
    order.sort_by(|a, b| {
        let a_kept = a.importance >= preservation_threshold;
        let b_kept = b.importance >= preservation_threshold;
        a_kept
            .cmp(&b_kept)
            .then_with(|| a.importance.total_cmp(&b.importance))
            .then_with(|| a.timestamp.cmp(&b.timestamp))
    });

    let mut out = Vec::new();
    for fragment in order {
        if total <= budget {
            break;
        }
        total -= fragment.tokens;
        out.push(fragment.id.clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compactor::fragment::FragmentKind;
    use chrono::Duration;

    fn frag(id: &str, importance: f64, age_hours: i64) -> ContextFragment {
        let mut f = ContextFragment::new(id, "some text here", FragmentKind::Context)
            .with_timestamp(Utc::now() - Duration::hours(age_hours));
        f.importance = importance;
        f
    }

    fn policy(strategies: &[PruningStrategy]) -> PruningPolicy<'_> {
        PruningPolicy {
            strategies,
            priority_threshold: 0.3,
            max_age_ms: 24 * 3_600_000,
            preserve_important: true,
            preservation_threshold: 0.8,
            now: Utc::now(),
        }
    }

    #[test]
    fn test_union_of_strategies() {
        let fragments = vec![frag("low", 0.1, 0), frag("old", 0.5, 48), frag("fine", 0.5, 1)];
        let strategies = [PruningStrategy::ImportanceThreshold, PruningStrategy::MaxAge];
        let (candidates, preserved, removed) =
            select_for_removal(&fragments, &RedundancyReport::default(), &policy(&strategies));
        assert_eq!(candidates, vec!["low".to_string(), "old".to_string()]);
        assert!(preserved.is_empty());
        assert_eq!(removed, candidates);
    }

    #[test]
    fn test_important_candidates_are_preserved() {
        let fragments = vec![frag("old-but-vital", 0.9, 48)];
        let strategies = [PruningStrategy::MaxAge];
        let (candidates, preserved, removed) =
            select_for_removal(&fragments, &RedundancyReport::default(), &policy(&strategies));
        assert_eq!(candidates.len(), 1);
        assert_eq!(preserved, vec!["old-but-vital".to_string()]);
        assert!(removed.is_empty());
    }

    #[test]
    fn test_budget_removes_unpreserved_first() {
        let fragments = vec![frag("vital", 0.9, 0), frag("minor", 0.4, 0), frag("mid", 0.6, 0)];
        let per = fragments[0].tokens;
        let dropped = select_for_budget(&fragments, per * 2, 0.8);
        assert_eq!(dropped, vec!["minor".to_string()]);

        let dropped = select_for_budget(&fragments, 0, 0.8);
        assert_eq!(dropped.last().map(String::as_str), Some("vital"));
        assert_eq!(dropped.len(), 3);
    }
}
