//! Resource Loader: on-demand loading of named resources.
//!
//! Loads run under a semaphore (`max_concurrent`) and a timeout, resolve
//! declared dependencies first and feed a successor-frequency model that
//! drives background prefetch.

pub mod error;
pub mod manager;
pub mod prediction;
pub mod resource;

pub use error::{LoaderError, LoaderResult};
pub use manager::{LazyLoader, LoaderConfig, LoaderMetrics, LoadingOptimization};
pub use prediction::{AccessRecord, Prediction, PredictionModel};
pub use resource::{LoadContext, LoaderFn, Resource, ResourceStats, ViewportContext};
