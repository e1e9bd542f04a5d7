//! Error types for the cache store.

/// Errors produced inside the cache. None of these escape `get`/`set`;
/// they are logged and turned into a miss-free degraded read or a rejected
/// write.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("compression failed: {0}")]
    Compression(String),

    #[error("decompression failed: {0}")]
    Decompression(String),

    #[error("entry {key} is {size} bytes, above the {limit} byte limit")]
    EntryTooLarge {
        key: String,
        size: usize,
        limit: usize,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for cache internals.
pub type CacheResult<T> = std::result::Result<T, CacheError>;
