//! Structured observability hooks for engine lifecycle events.
//!
//! This module provides:
//! - Cycle-scoped tracing spans via [`cycle_span`]
//! - Emission functions for key events: evictions, alerts, optimization
//!   cycles and quality-gate evaluations
//!
//! Events are emitted at `info!` level unless noted; filter with `RUST_LOG`.

use tracing::{info, warn};

/// Span tagging every event of one optimization cycle.
///
/// Attach it to the cycle future with `tracing::Instrument`, since the cycle
/// awaits across subsystems:
///
/// ```ignore
/// run_cycle().instrument(cycle_span("3f2a...")).await
/// ```
pub fn cycle_span(cycle_id: &str) -> tracing::Span {
    tracing::info_span!("ctxperf.cycle", cycle_id = %cycle_id)
}

/// Emit event: a batch of cache entries was evicted.
pub fn emit_cache_evicted(strategy: &str, evicted: usize, remaining: usize) {
    info!(
        event = "cache.evicted",
        strategy = %strategy,
        evicted = evicted,
        remaining = remaining,
    );
}

/// Emit event: a threshold alert was raised (warn level).
pub fn emit_alert_raised(metric: &str, severity: &str, value: f64, threshold: f64) {
    warn!(
        event = "monitor.alert_raised",
        metric = %metric,
        severity = %severity,
        value = value,
        threshold = threshold,
    );
}

/// Emit event: an optimization cycle finished.
pub fn emit_optimization_finished(cycle_id: &str, duration_ms: u64, improvements: usize, success: bool) {
    info!(
        event = "optimizer.finished",
        cycle_id = %cycle_id,
        duration_ms = duration_ms,
        improvements = improvements,
        success = success,
    );
}

/// Emit event: a token optimization pass completed.
pub fn emit_tokens_optimized(original_tokens: usize, tokens_saved: usize, fragments_removed: usize) {
    info!(
        event = "compactor.optimized",
        original_tokens = original_tokens,
        tokens_saved = tokens_saved,
        fragments_removed = fragments_removed,
    );
}

/// Emit event: quality gate evaluation completed with score and verdict.
pub fn emit_gate_evaluated(evaluation_id: &str, overall_score: f64, passed: bool) {
    info!(
        event = "gate.evaluated",
        evaluation_id = %evaluation_id,
        overall_score = overall_score,
        passed = passed,
    );
}
