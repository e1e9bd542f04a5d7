//! The context compactor: compression, pruning and batching under a token
//! budget.

use std::collections::HashSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::analysis::{analyze_redundancy, dictionary_candidates, extract_phrases, RedundancyReport};
use super::compression::{best_compression, content_hash, CompressionCache, CompressionStrategy};
use super::fragment::{compute_importance, ContextFragment};
use super::pruning::{select_for_budget, select_for_removal, PruningPolicy, PruningResult, PruningStrategy};
use crate::obs::emit_tokens_optimized;

/// Compactor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactorConfig {
    pub compression_enabled: bool,
    pub compression_strategies: Vec<CompressionStrategy>,
    /// A fragment is rewritten only when `compressed / original` tokens is
    /// at or below this ratio.
    pub compression_ratio: f64,
    /// Dictionary slots per pass.
    pub dictionary_size: usize,
    /// Sentence overlap above which semantic compression drops a sentence.
    pub semantic_similarity_threshold: f64,
    /// Fragments smaller than this are never compressed.
    pub min_compress_tokens: usize,
    pub compression_cache_size: usize,
    pub pruning_strategies: Vec<PruningStrategy>,
    /// Importance below this makes a fragment a pruning candidate.
    pub priority_threshold: f64,
    pub max_age_ms: u64,
    /// Word overlap above which two fragments are near-duplicates.
    pub redundancy_similarity: f64,
    pub preserve_important: bool,
    pub preservation_threshold: f64,
    pub batch_size: usize,
    pub max_context_tokens: usize,
    /// Recency contribution to importance reaches zero after this long.
    pub recency_horizon_ms: u64,
}

impl Default for CompactorConfig {
    fn default() -> Self {
        Self {
            compression_enabled: true,
            compression_strategies: CompressionStrategy::ALL.to_vec(),
            compression_ratio: 0.7,
            dictionary_size: 10,
            semantic_similarity_threshold: 0.8,
            min_compress_tokens: 8,
            compression_cache_size: 1024,
            pruning_strategies: vec![
                PruningStrategy::ImportanceThreshold,
                PruningStrategy::MaxAge,
                PruningStrategy::Redundancy,
            ],
            priority_threshold: 0.3,
            max_age_ms: 86_400_000,
            redundancy_similarity: 0.8,
            preserve_important: true,
            preservation_threshold: 0.8,
            batch_size: 10,
            max_context_tokens: 32_000,
            recency_horizon_ms: 3_600_000,
        }
    }
}

/// Per-fragment compression attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionResult {
    pub fragment_id: String,
    pub strategy: CompressionStrategy,
    pub original_tokens: usize,
    pub compressed_tokens: usize,
    pub ratio: f64,
    pub applied: bool,
    /// Outcome came from the content-hash memo.
    pub cached: bool,
}

/// Intra-batch duplicate estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub index: usize,
    pub fragment_ids: Vec<String>,
    pub tokens: usize,
    pub duplicate_fragments: usize,
    pub estimated_savings: usize,
}

/// Result of [`ContextCompactor::optimize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenOptimization {
    pub original_tokens: usize,
    pub final_tokens: usize,
    pub tokens_saved: usize,
    pub compression_results: Vec<CompressionResult>,
    pub pruning: PruningResult,
    pub batches: Vec<BatchResult>,
    pub redundancy_score: f64,
    /// `tokens_saved / original_tokens`.
    pub improvement_ratio: f64,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompactorMetrics {
    pub fragments: usize,
    pub current_tokens: usize,
    pub tokens_saved_total: usize,
    pub optimization_runs: u64,
    pub compression_cache_hits: u64,
    pub last_redundancy_score: f64,
    pub token_efficiency: f64,
}

/// Holds the working set of context fragments and shrinks it on demand.
#[derive(Debug)]
pub struct ContextCompactor {
    config: CompactorConfig,
    fragments: Vec<ContextFragment>,
    cache: CompressionCache,
    tokens_saved_total: usize,
    optimization_runs: u64,
    last_redundancy_score: f64,
}

impl Default for ContextCompactor {
    fn default() -> Self {
        Self::new(CompactorConfig::default())
    }
}

impl ContextCompactor {
    pub fn new(config: CompactorConfig) -> Self {
        let cache = CompressionCache::new(config.compression_cache_size);
        Self {
            config,
            fragments: Vec::new(),
            cache,
            tokens_saved_total: 0,
            optimization_runs: 0,
            last_redundancy_score: 0.0,
        }
    }

    pub fn config(&self) -> &CompactorConfig {
        &self.config
    }

    /// Add a fragment, scoring its importance. A fragment with an existing id
    /// replaces the old one in place.
    pub fn add_fragment(&mut self, mut fragment: ContextFragment) {
        fragment.importance = compute_importance(
            fragment.kind,
            fragment.priority,
            fragment.timestamp,
            Utc::now(),
            self.config.recency_horizon_ms,
        );
        debug!(id = %fragment.id, importance = fragment.importance, tokens = fragment.tokens, "fragment added");
        match self.fragments.iter_mut().find(|f| f.id == fragment.id) {
            Some(slot) => *slot = fragment,
            None => self.fragments.push(fragment),
        }
    }

    pub fn remove_fragment(&mut self, id: &str) -> Option<ContextFragment> {
        let pos = self.fragments.iter().position(|f| f.id == id)?;
        Some(self.fragments.remove(pos))
    }

    pub fn fragments(&self) -> &[ContextFragment] {
        &self.fragments
    }

    pub fn fragment(&self, id: &str) -> Option<&ContextFragment> {
        self.fragments.iter().find(|f| f.id == id)
    }

    pub fn total_tokens(&self) -> usize {
        self.fragments.iter().map(|f| f.tokens).sum()
    }

    /// Current redundancy analysis of the working set.
    pub fn redundancy(&self) -> RedundancyReport {
        analyze_redundancy(&self.fragments, self.config.redundancy_similarity)
    }

    /// `(1 - redundancy) * budget fit`, in `[0, 1]`.
    pub fn token_efficiency(&self) -> f64 {
        let total = self.total_tokens();
        let fit = if total <= self.config.max_context_tokens || total == 0 {
            1.0
        } else {
            self.config.max_context_tokens as f64 / total as f64
        };
        (1.0 - self.redundancy().score) * fit
    }

    pub fn metrics(&self) -> CompactorMetrics {
        CompactorMetrics {
            fragments: self.fragments.len(),
            current_tokens: self.total_tokens(),
            tokens_saved_total: self.tokens_saved_total,
            optimization_runs: self.optimization_runs,
            compression_cache_hits: self.cache.hits,
            last_redundancy_score: self.last_redundancy_score,
            token_efficiency: self.token_efficiency(),
        }
    }

    /// Compress, prune and batch the working set.
    pub fn optimize(&mut self) -> TokenOptimization {
        let original_tokens = self.total_tokens();
        let redundancy = self.redundancy();

        let compression_results = if self.config.compression_enabled {
            self.compress_pass()
        } else {
            Vec::new()
        };
        let pruning = self.prune_pass(&redundancy);
        let batches = self.batch_pass();

        let final_tokens = self.total_tokens();
        let tokens_saved = original_tokens.saturating_sub(final_tokens);
        let improvement_ratio = if original_tokens == 0 {
            0.0
        } else {
            tokens_saved as f64 / original_tokens as f64
        };

        self.tokens_saved_total += tokens_saved;
        self.optimization_runs += 1;
        self.last_redundancy_score = redundancy.score;

        let recommendations = self.recommend(&redundancy, &batches, final_tokens);
        emit_tokens_optimized(
            original_tokens,
            tokens_saved,
            pruning.removed.len() + pruning.budget_removed.len(),
        );

        TokenOptimization {
            original_tokens,
            final_tokens,
            tokens_saved,
            compression_results,
            pruning,
            batches,
            redundancy_score: redundancy.score,
            improvement_ratio,
            recommendations,
        }
    }

    fn compress_pass(&mut self) -> Vec<CompressionResult> {
        let phrases = extract_phrases(&self.fragments);
        let dictionary = dictionary_candidates(&phrases, self.config.dictionary_size);
        let mut results = Vec::new();

        for fragment in self.fragments.iter_mut() {
            if fragment.compressed || fragment.tokens < self.config.min_compress_tokens {
                continue;
            }
            let hash = content_hash(&fragment.content);
            let (candidate, cached) = match self.cache.get(&hash) {
                Some(memo) => (memo, true),
                None => {
                    let fresh = best_compression(
                        &fragment.content,
                        &self.config.compression_strategies,
                        &dictionary,
                        self.config.semantic_similarity_threshold,
                    );
                    self.cache.insert(hash, fresh.clone());
                    (fresh, false)
                }
            };
            let Some(candidate) = candidate else { continue };

            let original_tokens = fragment.tokens;
            let applied = candidate.ratio <= self.config.compression_ratio;
            let compressed_tokens = if applied {
                fragment.replace_content(candidate.output.content, candidate.output.dictionary);
                fragment.tokens
            } else {
                (original_tokens as f64 * candidate.ratio).round() as usize
            };
            results.push(CompressionResult {
                fragment_id: fragment.id.clone(),
                strategy: candidate.strategy,
                original_tokens,
                compressed_tokens,
                ratio: candidate.ratio,
                applied,
                cached,
            });
        }
        results
    }

    fn prune_pass(&mut self, redundancy: &RedundancyReport) -> PruningResult {
        let policy = PruningPolicy {
            strategies: &self.config.pruning_strategies,
            priority_threshold: self.config.priority_threshold,
            max_age_ms: self.config.max_age_ms,
            preserve_important: self.config.preserve_important,
            preservation_threshold: self.config.preservation_threshold,
            now: Utc::now(),
        };
        let (candidates, preserved, removed) = select_for_removal(&self.fragments, redundancy, &policy);
        let mut tokens_reclaimed = self.drop_fragments(&removed);

        let budget_removed = select_for_budget(
            &self.fragments,
            self.config.max_context_tokens,
            self.config.preservation_threshold,
        );
        tokens_reclaimed += self.drop_fragments(&budget_removed);

        PruningResult {
            candidates,
            preserved,
            removed,
            budget_removed,
            tokens_reclaimed,
        }
    }

    fn drop_fragments(&mut self, ids: &[String]) -> usize {
        if ids.is_empty() {
            return 0;
        }
        let doomed: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut reclaimed = 0;
        self.fragments.retain(|f| {
            let drop = doomed.contains(f.id.as_str());
            if drop {
                reclaimed += f.tokens;
            }
            !drop
        });
        reclaimed
    }

    fn batch_pass(&self) -> Vec<BatchResult> {
        let size = self.config.batch_size.max(1);
        self.fragments
            .chunks(size)
            .enumerate()
            .map(|(index, chunk)| {
                let mut seen = HashSet::new();
                let mut duplicate_fragments = 0;
                let mut estimated_savings = 0;
                for fragment in chunk {
                    if !seen.insert(fragment.content.as_str()) {
                        duplicate_fragments += 1;
                        estimated_savings += fragment.tokens;
                    }
                }
                BatchResult {
                    index,
                    fragment_ids: chunk.iter().map(|f| f.id.clone()).collect(),
                    tokens: chunk.iter().map(|f| f.tokens).sum(),
                    duplicate_fragments,
                    estimated_savings,
                }
            })
            .collect()
    }

    fn recommend(&self, redundancy: &RedundancyReport, batches: &[BatchResult], final_tokens: usize) -> Vec<String> {
        let mut out = Vec::new();
        if redundancy.score > 0.3 {
            out.push(format!(
                "Redundancy is {:.0}% (above 30%); enable more aggressive deduplication",
                redundancy.score * 100.0
            ));
        }
        if final_tokens as f64 > self.config.max_context_tokens as f64 * 0.9 {
            out.push(
                "Context is within 10% of the token budget; raise the priority threshold or shorten the max age"
                    .to_string(),
            );
        }
        let batch_savings: usize = batches.iter().map(|b| b.estimated_savings).sum();
        if batch_savings > 0 {
            out.push(format!(
                "Batches still hold {batch_savings} tokens of identical fragments; enable redundancy pruning"
            ));
        }
        if !self.config.compression_enabled {
            out.push("Compression is disabled; enabling it usually saves 20-40% on verbose context".to_string());
        }
        if !out.is_empty() {
            info!(count = out.len(), "compactor recommendations generated");
        }
        out
    }
}
