//! Loadable resources and their bookkeeping.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Type-erased async loader.
pub type LoaderFn = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

/// A named resource the loader can fetch on demand.
#[derive(Clone)]
pub struct Resource {
    pub id: String,
    pub category: String,
    pub dependencies: Vec<String>,
    pub priority: f64,
    /// Approximate payload size in bytes.
    pub size_hint: usize,
    pub(crate) loader: LoaderFn,
}

impl Resource {
    pub fn new<F, Fut>(id: impl Into<String>, category: impl Into<String>, loader: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Self {
            id: id.into(),
            category: category.into(),
            dependencies: Vec::new(),
            priority: 0.5,
            size_hint: 0,
            loader: Arc::new(move || loader().boxed()),
        }
    }

    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = priority.clamp(0.0, 1.0);
        self
    }

    pub fn with_size_hint(mut self, bytes: usize) -> Self {
        self.size_hint = bytes;
        self
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("id", &self.id)
            .field("category", &self.category)
            .field("dependencies", &self.dependencies)
            .field("priority", &self.priority)
            .field("size_hint", &self.size_hint)
            .finish_non_exhaustive()
    }
}

/// Per-resource access and load statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceStats {
    pub access_count: u64,
    pub load_count: u64,
    pub last_access: Option<DateTime<Utc>>,
    pub last_loaded: Option<DateTime<Utc>>,
    pub last_load_ms: Option<u64>,
}

/// Optional caller context attached to a load request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadContext {
    /// Where the request came from (a view, a command, a phase).
    pub source: Option<String>,
}

impl LoadContext {
    pub fn from_source(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
        }
    }
}

/// What is on screen now and what is likely next.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportContext {
    pub visible: Vec<String>,
    /// Ordered by how soon each resource is expected.
    pub upcoming: Vec<String>,
}
