//! Cache Store: in-process key/value cache with hot-swappable eviction.
//!
//! - [`CacheStore`]: async get/set/delete/clear with TTL, batch eviction and
//!   zlib compression of large values
//! - [`EvictionStrategy`]: LRU, LFU, FIFO and the adaptive blend
//! - [`tuning`]: pure access-pattern analysis behind [`CacheStore::optimize`]

mod compression;
pub mod entry;
pub mod error;
pub mod store;
pub mod strategy;
pub mod tuning;

pub use entry::{CacheEntry, EntryMetadata};
pub use error::{CacheError, CacheResult};
pub use store::{CacheConfig, CacheOptimization, CacheStats, CacheStore};
pub use strategy::{adaptive_score, select_victims, EvictionStrategy};
pub use tuning::{AccessPattern, PatternSummary, PerformanceSnapshot, MIN_CAPACITY};
