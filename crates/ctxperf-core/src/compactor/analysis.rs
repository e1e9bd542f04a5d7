//! Phrase frequency and redundancy analysis over a fragment set.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::fragment::ContextFragment;

/// Shortest and longest phrase, in words.
pub const MIN_PHRASE_WORDS: usize = 2;
pub const MAX_PHRASE_WORDS: usize = 5;
/// A phrase must occur at least this often to be worth a dictionary slot.
pub const COMPRESSIBLE_MIN_FREQUENCY: usize = 5;
/// A phrase must be at least this long (characters) to be worth a slot.
pub const COMPRESSIBLE_MIN_CHARS: usize = 20;

/// A repeated multi-word phrase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhrasePattern {
    pub phrase: String,
    pub frequency: usize,
    /// Fragments the phrase occurs in, sorted.
    pub fragments: BTreeSet<String>,
    pub compressible: bool,
}

/// Count every 2-5 word phrase across `fragments`. Only phrases seen more
/// than once are returned, most frequent first.
pub fn extract_phrases(fragments: &[ContextFragment]) -> Vec<PhrasePattern> {
    let mut counts: HashMap<String, (usize, BTreeSet<String>)> = HashMap::new();

    for fragment in fragments {
        let words: Vec<&str> = fragment.content.split_whitespace().collect();
        for n in MIN_PHRASE_WORDS..=MAX_PHRASE_WORDS {
            for window in words.windows(n) {
                let slot = counts.entry(window.join(" ")).or_default();
                slot.0 += 1;
                slot.1.insert(fragment.id.clone());
            }
        }
    }

    let mut phrases: Vec<PhrasePattern> = counts
        .into_iter()
        .filter(|(_, (frequency, _))| *frequency > 1)
        .map(|(phrase, (frequency, fragments))| PhrasePattern {
            compressible: frequency >= COMPRESSIBLE_MIN_FREQUENCY
                && phrase.chars().count() >= COMPRESSIBLE_MIN_CHARS,
            phrase,
            frequency,
            fragments,
        })
        .collect();
    phrases.sort_by(|a, b| {
        b.frequency
            .cmp(&a.frequency)
            .then_with(|| b.phrase.len().cmp(&a.phrase.len()))
            .then_with(|| a.phrase.cmp(&b.phrase))
    });
    phrases
}

/// The `limit` compressible phrases with the largest character savings.
pub fn dictionary_candidates(phrases: &[PhrasePattern], limit: usize) -> Vec<String> {
    let mut compressible: Vec<&PhrasePattern> = phrases.iter().filter(|p| p.compressible).collect();
    compressible.sort_by(|a, b| {
        let gain_a = a.frequency * a.phrase.chars().count();
        let gain_b = b.frequency * b.phrase.chars().count();
        gain_b.cmp(&gain_a).then_with(|| a.phrase.cmp(&b.phrase))
    });
    compressible
        .into_iter()
        .take(limit)
        .map(|p| p.phrase.clone())
        .collect()
}

/// Lowercased alphanumeric word set used for similarity.
pub fn word_set(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Jaccard similarity of two word sets. Two empty sets are identical.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

/// How a redundant fragment relates to the copy that is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateKind {
    Exact,
    Near,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicatePair {
    pub kept: String,
    pub redundant: String,
    pub kind: DuplicateKind,
    pub similarity: f64,
}

/// Exact and near-duplicate fragments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RedundancyReport {
    pub pairs: Vec<DuplicatePair>,
    /// Fragments that duplicate a kept one, in fragment order.
    pub redundant_ids: Vec<String>,
    /// Share of fragments that are redundant.
    pub score: f64,
}

impl RedundancyReport {
    pub fn exact_duplicates(&self) -> usize {
        self.pairs
            .iter()
            .filter(|p| p.kind == DuplicateKind::Exact)
            .count()
    }

    pub fn near_duplicates(&self) -> usize {
        self.pairs
            .iter()
            .filter(|p| p.kind == DuplicateKind::Near)
            .count()
    }
}

/// Find duplicate fragments.
///
/// Fragments are visited by importance (highest first, then insertion
/// order); each one is compared to the fragments already kept and is
/// redundant if its body is identical or its word overlap exceeds
/// `similarity_threshold`.
pub fn analyze_redundancy(fragments: &[ContextFragment], similarity_threshold: f64) -> RedundancyReport {
    if fragments.is_empty() {
        return RedundancyReport::default();
    }

    let mut order: Vec<usize> = (0..fragments.len()).collect();
    order.sort_by(|&a, &b| {
        fragments[b]
            .importance
            .partial_cmp(&fragments[a].importance)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.cmp(&b))
    });

    let sets: Vec<HashSet<String>> = fragments.iter().map(|f| word_set(&f.content)).collect();
    let mut kept: Vec<usize> = Vec::new();
    let mut pairs = Vec::new();
    let mut redundant = HashSet::new();

    for idx in order {
        let fragment = &fragments[idx];
        let mut matched = None;
        for &k in &kept {
            if fragments[k].content == fragment.content {
                matched = Some((k, DuplicateKind::Exact, 1.0));
                break;
            }
            let similarity = jaccard(&sets[k], &sets[idx]);
            if similarity > similarity_threshold {
                matched = Some((k, DuplicateKind::Near, similarity));
                break;
            }
        }
        match matched {
            Some((k, kind, similarity)) => {
                pairs.push(DuplicatePair {
                    kept: fragments[k].id.clone(),
                    redundant: fragment.id.clone(),
                    kind,
                    similarity,
                });
                redundant.insert(idx);
            }
            None => kept.push(idx),
        }
    }

    let redundant_ids: Vec<String> = fragments
        .iter()
        .enumerate()
        .filter(|(i, _)| redundant.contains(i))
        .map(|(_, f)| f.id.clone())
        .collect();

    RedundancyReport {
        score: redundant_ids.len() as f64 / fragments.len() as f64,
        pairs,
        redundant_ids,
    }
}
