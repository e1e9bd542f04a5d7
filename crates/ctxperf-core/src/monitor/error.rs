//! Error types for the metrics monitor.

use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("metrics provider failed: {0}")]
    Provider(String),

    #[error("monitoring is already running")]
    AlreadyRunning,

    #[error("unknown alert: {id}")]
    UnknownAlert { id: Uuid },
}

/// Result type for monitor operations.
pub type MonitorResult<T> = std::result::Result<T, MonitorError>;
