//! Quizcache - a layered in-process cache service
//!
//! A bounded store with TTL and pluggable eviction, a rule-based
//! invalidation engine with dependency cascades, a warming engine with
//! scheduled and predictive population, and a facade tying them
//! together behind one asynchronous contract.

pub mod config;
pub mod error;
pub mod invalidation;
pub mod metrics;
pub mod service;
pub mod store;
pub mod tasks;
pub mod warming;

pub use config::{CacheLayer, CacheServiceConfig, StoreConfig, DEFAULT_STORE_NAME};
pub use error::{CacheError, Result};
pub use invalidation::{InvalidationRule, InvalidationStrategy, KeyPattern};
pub use service::{CacheResponse, CacheService, CacheStatsReport};
pub use store::{CacheValue, EntryMetadata, EvictionPolicy};
pub use warming::{
    loader_fn, DataLoader, WarmingPriority, WarmingRule, WarmingSchedule, WarmingStrategy,
};
