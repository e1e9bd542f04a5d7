//! Fragment compression strategies.
//!
//! Three strategies compete for every fragment and the best
//! `savings * quality` wins:
//! - dictionary: reversible phrase substitution with `§n§` tokens
//! - pattern: whitespace normalization and fixed phrase shortenings
//! - semantic: drops sentences that repeat an earlier one

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::analysis::{jaccard, word_set};
use super::fragment::estimate_tokens;

/// Marker used to delimit dictionary tokens.
pub const TOKEN_MARK: char = '§';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionStrategy {
    Dictionary,
    Pattern,
    Semantic,
}

impl CompressionStrategy {
    pub const ALL: [CompressionStrategy; 3] = [Self::Dictionary, Self::Pattern, Self::Semantic];

    /// How much of the original meaning the strategy retains.
    pub fn quality(self) -> f64 {
        match self {
            Self::Dictionary => 1.0,
            Self::Pattern => 0.9,
            Self::Semantic => 0.7,
        }
    }
}

impl fmt::Display for CompressionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Dictionary => "dictionary",
            Self::Pattern => "pattern",
            Self::Semantic => "semantic",
        };
        f.write_str(name)
    }
}

/// Output of a single strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compressed {
    pub content: String,
    /// Phrase table, only populated by dictionary compression.
    pub dictionary: Vec<String>,
}

fn dictionary_token(index: usize) -> String {
    format!("{TOKEN_MARK}{index}{TOKEN_MARK}")
}

/// Replace each phrase from `phrases` present in `content` with a
/// positional token. Content that already contains the marker is left
/// alone so [`expand`] stays exact.
pub fn dictionary_compress(content: &str, phrases: &[String]) -> Option<Compressed> {
    if content.contains(TOKEN_MARK) {
        return None;
    }
    let mut ordered: Vec<&String> = phrases.iter().collect();
    ordered.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    let mut out = content.to_string();
    let mut dictionary = Vec::new();
    for phrase in ordered {
        if phrase.is_empty() || !out.contains(phrase.as_str()) {
            continue;
        }
        out = out.replace(phrase.as_str(), &dictionary_token(dictionary.len()));
        dictionary.push(phrase.clone());
    }

    if dictionary.is_empty() {
        None
    } else {
        Some(Compressed {
            content: out,
            dictionary,
        })
    }
}

/// Reverse dictionary compression.
pub fn expand(content: &str, dictionary: &[String]) -> String {
    let mut out = content.to_string();
    for (index, phrase) in dictionary.iter().enumerate().rev() {
        out = out.replace(&dictionary_token(index), phrase);
    }
    out
}

const SHORTENINGS: &[(&str, &str)] = &[
    ("due to the fact that", "because"),
    ("at this point in time", "now"),
    ("that is to say", "i.e."),
    ("in the event that", "if"),
    ("a large number of", "many"),
    ("for example", "e.g."),
    ("in order to", "to"),
    ("with respect to", "re"),
    ("configuration", "config"),
    ("implementation", "impl"),
    ("documentation", "docs"),
    ("information", "info"),
    ("application", "app"),
    ("environment", "env"),
    ("repository", "repo"),
];

/// Collapse runs of blanks inside lines, strip trailing blanks and fold
/// repeated empty lines.
fn normalize_whitespace(content: &str) -> String {
    let mut lines = Vec::new();
    let mut previous_blank = false;
    for line in content.lines() {
        let mut collapsed = String::with_capacity(line.len());
        let mut in_gap = false;
        for c in line.chars() {
            if c == ' ' || c == '\t' {
                if !in_gap {
                    collapsed.push(' ');
                }
                in_gap = true;
            } else {
                collapsed.push(c);
                in_gap = false;
            }
        }
        let collapsed = collapsed.trim_end().to_string();
        let blank = collapsed.is_empty();
        if blank && previous_blank {
            continue;
        }
        previous_blank = blank;
        lines.push(collapsed);
    }
    lines.join("\n").trim().to_string()
}

/// Whitespace normalization plus fixed phrase shortenings.
pub fn pattern_compress(content: &str) -> Option<Compressed> {
    let mut out = normalize_whitespace(content);
    for (long, short) in SHORTENINGS {
        if out.contains(long) {
            out = out.replace(long, short);
        }
    }
    if out == content {
        None
    } else {
        Some(Compressed {
            content: out,
            dictionary: Vec::new(),
        })
    }
}

fn split_sentences(content: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = content.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            let at_boundary = chars.peek().is_none_or(|(_, next)| next.is_whitespace());
            if at_boundary {
                let end = i + c.len_utf8();
                let sentence = content[start..end].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                start = end;
            }
        }
    }
    let tail = content[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Drop sentences whose word overlap with an already kept sentence exceeds
/// `threshold`.
pub fn semantic_compress(content: &str, threshold: f64) -> Option<Compressed> {
    let sentences = split_sentences(content);
    if sentences.len() < 2 {
        return None;
    }
    let mut kept: Vec<(&str, HashSet<String>)> = Vec::new();
    for sentence in sentences.iter().copied() {
        let words = word_set(sentence);
        if kept.iter().any(|(_, k)| jaccard(k, &words) > threshold) {
            continue;
        }
        kept.push((sentence, words));
    }
    if kept.len() == sentences.len() {
        return None;
    }
    Some(Compressed {
        content: kept.into_iter().map(|(s, _)| s).collect::<Vec<_>>().join(" "),
        dictionary: Vec::new(),
    })
}

/// Winning strategy for one fragment body.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub strategy: CompressionStrategy,
    pub output: Compressed,
    /// `compressed tokens / original tokens`.
    pub ratio: f64,
    pub score: f64,
}

/// Run every enabled strategy and keep the best scoring reduction.
pub fn best_compression(
    content: &str,
    strategies: &[CompressionStrategy],
    dictionary: &[String],
    similarity_threshold: f64,
) -> Option<Candidate> {
    let original = estimate_tokens(content);
    if original == 0 {
        return None;
    }

    let mut best: Option<Candidate> = None;
    for &strategy in strategies {
        let output = match strategy {
            CompressionStrategy::Dictionary => dictionary_compress(content, dictionary),
            CompressionStrategy::Pattern => pattern_compress(content),
            CompressionStrategy::Semantic => semantic_compress(content, similarity_threshold),
        };
        let Some(output) = output else { continue };
        let compressed = estimate_tokens(&output.content);
        if compressed >= original {
            continue;
        }
        let ratio = compressed as f64 / original as f64;
        let score = (1.0 - ratio) * strategy.quality();
        if best.as_ref().is_none_or(|b| score > b.score) {
            best = Some(Candidate {
                strategy,
                output,
                ratio,
                score,
            });
        }
    }
    best
}

/// Hex sha256 of a fragment body.
pub fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Memo of compression outcomes keyed by content hash. A `None` outcome is
/// remembered too so bodies that did not compress are not retried.
#[derive(Debug, Default)]
pub(crate) struct CompressionCache {
    entries: HashMap<String, Option<Candidate>>,
    capacity: usize,
    pub(crate) hits: u64,
}

impl CompressionCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            hits: 0,
        }
    }

    pub(crate) fn get(&mut self, hash: &str) -> Option<Option<Candidate>> {
        let found = self.entries.get(hash).cloned();
        if found.is_some() {
            self.hits += 1;
        }
        found
    }

    pub(crate) fn insert(&mut self, hash: String, outcome: Option<Candidate>) {
        if self.entries.len() >= self.capacity {
            self.entries.clear();
        }
        self.entries.insert(hash, outcome);
    }
}
