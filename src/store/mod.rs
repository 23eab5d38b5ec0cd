//! Cache Store Module
//!
//! Bounded in-memory caching with TTL expiration, policy-driven
//! eviction, and lazy invalidation support.

mod entry;
mod eviction;
mod stats;
mod store;


// Re-export public types
pub use entry::{current_timestamp_ms, CacheEntry, CacheValue, EntryMetadata};
pub use eviction::{EvictionPolicy, EvictionTracker};
pub use stats::StoreStats;
pub use store::CacheStore;

/// How stores are shared with engines and background tasks.
pub type SharedStore = std::sync::Arc<tokio::sync::RwLock<CacheStore>>;

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Maximum allowed serialized value size in bytes
pub const MAX_VALUE_SIZE: usize = 1024 * 1024; // 1 MB
