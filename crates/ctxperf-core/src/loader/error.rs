//! Error types for the resource loader.

/// Errors surfaced by [`super::LazyLoader::load_resource`].
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("resource not registered: {id}")]
    ResourceNotFound { id: String },

    #[error("dependency {dependency} of {id} failed: {source}")]
    DependencyFailed {
        id: String,
        dependency: String,
        #[source]
        source: Box<LoaderError>,
    },

    #[error("dependency cycle: {}", path.join(" -> "))]
    DependencyCycle { path: Vec<String> },

    #[error("loading {id} timed out (limit {limit_ms}ms)")]
    Timeout { id: String, limit_ms: u64 },

    #[error("loading {id} failed: {reason}")]
    LoadFailed { id: String, reason: String },
}

impl LoaderError {
    /// The innermost error, following dependency failures down.
    pub fn root_cause(&self) -> &LoaderError {
        match self {
            Self::DependencyFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.root_cause(), Self::Timeout { .. })
    }
}

/// Result type for loader operations.
pub type LoaderResult<T> = std::result::Result<T, LoaderError>;
