//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support,
//! access tracking, and open metadata.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

/// Opaque cached payload. Anything serializable goes in as JSON.
pub type CacheValue = Value;

// == Entry Metadata ==
/// Per-entry annotations.
///
/// `depends_on` declares keys this entry was derived from; the facade
/// hands those to the invalidation engine, which owns the dependency
/// graph. `annotations` is an open bag for arbitrary caller data.
#[derive(Debug, Clone, Default)]
pub struct EntryMetadata {
    /// Where the value came from (e.g. "factory", "warming")
    pub source: Option<String>,
    /// How long the producing call took, in milliseconds
    pub cost_ms: Option<u64>,
    /// Keys this entry depends on; invalidating them cascades here
    pub depends_on: Vec<String>,
    /// Arbitrary caller annotations
    pub annotations: HashMap<String, CacheValue>,
}

impl EntryMetadata {
    /// Creates metadata declaring dependencies on the given keys.
    pub fn depending_on<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            depends_on: keys.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

// == Cache Entry ==
/// Represents a single cache entry with value, lifecycle timestamps,
/// access tracking, and metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored value
    pub value: CacheValue,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
    /// Last access timestamp (Unix milliseconds)
    pub last_accessed_at: u64,
    /// Number of reads served from this entry while live
    pub access_count: u64,
    /// Flagged stale by lazy invalidation; dropped on next access
    pub stale: bool,
    /// Caller-supplied annotations
    pub metadata: EntryMetadata,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry with optional TTL.
    ///
    /// # Arguments
    /// * `value` - The value to store
    /// * `ttl_ms` - Optional TTL in milliseconds (None = never expires)
    /// * `metadata` - Entry annotations
    pub fn new(value: CacheValue, ttl_ms: Option<u64>, metadata: EntryMetadata) -> Self {
        let now = current_timestamp_ms();
        let expires_at = ttl_ms.map(|ttl| now + ttl);

        Self {
            value,
            created_at: now,
            expires_at,
            last_accessed_at: now,
            access_count: 0,
            stale: false,
            metadata,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// Boundary condition: an entry is expired once the current time is
    /// greater than or equal to the expiration time.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires) => current_timestamp_ms() >= expires,
            None => false,
        }
    }

    // == Is Dead ==
    /// An entry is logically dead when expired or flagged stale, even if
    /// still physically present until swept.
    pub fn is_dead(&self) -> bool {
        self.stale || self.is_expired()
    }

    // == Touch ==
    /// Records a read: bumps the access count and refreshes the last
    /// access timestamp.
    pub fn touch(&mut self) {
        self.access_count += 1;
        self.last_accessed_at = current_timestamp_ms();
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, or None if no expiration
    /// is set. Returns `Some(0)` once expired.
    pub fn ttl_remaining_ms(&self) -> Option<u64> {
        self.expires_at.map(|expires| {
            let now = current_timestamp_ms();
            expires.saturating_sub(now)
        })
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis() as u64
}
