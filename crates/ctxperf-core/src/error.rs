//! Engine-level error taxonomy.
//!
//! Capacity and expiry conditions never surface as errors; they are handled
//! inside the cache. Transformation failures degrade to the raw form and are
//! only logged. What remains is collected here so a host can hold a single
//! error type across subsystems.

use crate::cache::CacheError;
use crate::loader::LoaderError;
use crate::monitor::MonitorError;
use crate::optimizer::OptimizerError;

/// Errors produced by any engine subsystem.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("loader error: {0}")]
    Loader(#[from] LoaderError),

    #[error("monitor error: {0}")]
    Monitor(#[from] MonitorError),

    #[error("optimizer error: {0}")]
    Optimizer(#[from] OptimizerError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
