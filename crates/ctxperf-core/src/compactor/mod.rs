//! Context Compactor: keeps assembled context inside a token budget.
//!
//! Fragments are scored on entry ([`compute_importance`]). An optimization
//! pass compresses verbose fragments, prunes low-value or redundant ones,
//! enforces the budget and reports what was reclaimed.

pub mod analysis;
pub mod compression;
pub mod fragment;
pub mod optimizer;
pub mod pruning;

pub use analysis::{PhrasePattern, RedundancyReport};
pub use compression::{expand, CompressionStrategy};
pub use fragment::{compute_importance, estimate_tokens, ContextFragment, FragmentKind, CHARS_PER_TOKEN};
pub use optimizer::{
    BatchResult, CompactorConfig, CompactorMetrics, CompressionResult, ContextCompactor, TokenOptimization,
};
pub use pruning::{PruningResult, PruningStrategy};
