//! Metrics provider wired to the live engine components.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::warn;

use crate::cache::CacheStore;
use crate::compactor::ContextCompactor;
use crate::loader::LazyLoader;
use crate::monitor::{CoordinationMetrics, MetricsProvider, ResourceMetrics, SystemMetrics};

/// Merges a base provider's system and coordination metrics with live
/// cache, compactor and loader figures.
///
/// A failing system probe degrades to zeroed system metrics so a cycle can
/// still sample the rest of the engine.
pub struct EngineProbe {
    base: Arc<dyn MetricsProvider>,
    cache: Arc<CacheStore>,
    compactor: Arc<Mutex<ContextCompactor>>,
    loader: LazyLoader,
}

impl EngineProbe {
    pub fn new(
        base: Arc<dyn MetricsProvider>,
        cache: Arc<CacheStore>,
        compactor: Arc<Mutex<ContextCompactor>>,
        loader: LazyLoader,
    ) -> Self {
        Self {
            base,
            cache,
            compactor,
            loader,
        }
    }
}

#[async_trait]
impl MetricsProvider for EngineProbe {
    async fn system(&self) -> anyhow::Result<SystemMetrics> {
        match self.base.system().await {
            Ok(metrics) => Ok(metrics),
            Err(e) => {
                warn!(error = %e, "system probe failed, reporting zeroed system metrics");
                Ok(SystemMetrics::default())
            }
        }
    }

    async fn coordination(&self) -> anyhow::Result<CoordinationMetrics> {
        self.base.coordination().await
    }

    async fn resources(&self) -> anyhow::Result<ResourceMetrics> {
        let cache = self.cache.get_stats().await;
        let loader = self.loader.get_metrics().await;
        let (fragments, tokens, efficiency) = {
            let compactor = self.compactor.lock().await;
            (compactor.fragments().len(), compactor.total_tokens(), compactor.token_efficiency())
        };

        // rates are undefined until there is traffic
        Ok(ResourceMetrics {
            cache_hit_rate: (cache.hits + cache.misses > 0).then_some(cache.hit_rate),
            token_efficiency: (fragments > 0).then_some(efficiency),
            cache_entries: Some(cache.entries),
            context_tokens: Some(tokens),
            loaded_resources: Some(loader.loads as usize),
        })
    }
}
