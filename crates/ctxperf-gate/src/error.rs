//! Error types for gate registration and ordering.
//!
//! Failures of the checks themselves never surface here; they become failed
//! check records with a critical finding.

#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("quality check already registered: {id}")]
    DuplicateCheck { id: String },

    #[error("check {check} depends on unknown check {dependency}")]
    UnknownDependency { check: String, dependency: String },

    #[error("check dependency cycle: {}", path.join(" -> "))]
    DependencyCycle { path: Vec<String> },

    #[error("invalid check pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Result type for gate operations.
pub type GateResult<T> = std::result::Result<T, GateError>;
