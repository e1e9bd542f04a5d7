//! Aggregate engine configuration.
//!
//! Every section defaults independently, so a partial TOML or JSON document
//! only needs the keys it overrides.

use serde::{Deserialize, Serialize};

use crate::cache::CacheConfig;
use crate::compactor::CompactorConfig;
use crate::error::{EngineError, Result};
use crate::loader::LoaderConfig;
use crate::monitor::MonitorConfig;
use crate::optimizer::OptimizerConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub cache: CacheConfig,
    pub compactor: CompactorConfig,
    pub loader: LoaderConfig,
    pub monitor: MonitorConfig,
    pub optimizer: OptimizerConfig,
}

impl EngineConfig {
    /// Reject settings that would stall or disable a component outright.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(EngineError::InvalidConfig(msg.to_string()));
        if self.cache.max_size == 0 {
            return invalid("cache.max_size must be positive");
        }
        if self.loader.max_concurrent == 0 {
            return invalid("loader.max_concurrent must be positive");
        }
        if self.loader.timeout_ms == 0 {
            return invalid("loader.timeout_ms must be positive");
        }
        if self.monitor.sampling_interval_ms == 0 {
            return invalid("monitor.sampling_interval_ms must be positive");
        }
        if !(0.0..=1.0).contains(&self.compactor.compression_ratio) {
            return invalid("compactor.compression_ratio must be within 0.0 - 1.0");
        }
        if self.compactor.max_context_tokens == 0 {
            return invalid("compactor.max_context_tokens must be positive");
        }
        Ok(())
    }
}
