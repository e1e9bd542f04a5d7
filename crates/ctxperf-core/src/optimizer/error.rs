//! Error types for the optimization orchestrator.

use crate::monitor::MonitorError;

#[derive(Debug, thiserror::Error)]
pub enum OptimizerError {
    #[error("an optimization cycle is already running")]
    AlreadyRunning,

    #[error("monitor error: {0}")]
    Monitor(#[from] MonitorError),
}

/// Result type for orchestrator operations.
pub type OptimizerResult<T> = std::result::Result<T, OptimizerError>;
