//! Cache Store Module
//!
//! Main cache engine combining HashMap storage with policy-driven
//! eviction, TTL expiration, and lazy invalidation support.

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::{CacheLayer, StoreConfig};
use crate::error::{CacheError, Result};
use crate::store::{
    CacheEntry, CacheValue, EntryMetadata, EvictionTracker, StoreStats, MAX_KEY_LENGTH,
    MAX_VALUE_SIZE,
};

// == Cache Store ==
/// Bounded key-value store with eviction, TTL, and stats.
///
/// Expired or stale entries are treated as misses and lazily purged on
/// access; a periodic sweep removes the rest.
#[derive(Debug)]
pub struct CacheStore {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// Eviction victim tracker
    tracker: EvictionTracker,
    /// Performance statistics
    stats: StoreStats,
    /// Store configuration
    config: StoreConfig,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a new CacheStore from configuration.
    ///
    /// Fails fast on configuration errors; this is the only place store
    /// operations raise for anything other than malformed requests.
    pub fn new(config: StoreConfig) -> Result<Self> {
        config.validate()?;

        if config.layer == CacheLayer::MemoryAndDisk || config.persist_to_disk {
            warn!(
                store = %config.name,
                "disk spill is configured but not implemented; running memory-only"
            );
        }
        if config.compression_enabled {
            warn!(store = %config.name, "compression is configured but no codec is wired; storing raw");
        }

        Ok(Self {
            entries: HashMap::new(),
            tracker: EvictionTracker::new(config.policy),
            stats: StoreStats::new(),
            config,
        })
    }

    /// The name of this store ("main" by default).
    pub fn name(&self) -> &str {
        &self.config.name
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// Returns the value if present and live. Expired or stale entries
    /// are removed on access and counted as misses.
    pub fn get(&mut self, key: &str) -> Option<CacheValue> {
        let dead = match self.entries.get(key) {
            None => {
                self.stats.record_miss();
                return None;
            }
            Some(entry) => entry.is_dead().then_some(entry.stale),
        };

        if let Some(was_stale) = dead {
            self.entries.remove(key);
            self.tracker.remove(key);
            if was_stale {
                self.stats.record_stale_drop();
            } else {
                self.stats.record_expiration();
            }
            self.stats.record_miss();
            self.stats.set_total_entries(self.entries.len());
            return None;
        }

        let entry = self.entries.get_mut(key)?;
        entry.touch();
        let value = entry.value.clone();
        self.tracker.on_access(key);
        self.stats.record_hit();
        Some(value)
    }

    // == Set ==
    /// Stores a key-value pair with optional TTL and metadata.
    ///
    /// Overwriting resets the TTL. If the store is at capacity, one
    /// entry is evicted per the configured policy before inserting;
    /// normal eviction is not an error.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `value` - The value to store
    /// * `ttl` - Optional TTL (falls back to the store default; both
    ///   absent means the entry never expires)
    /// * `metadata` - Entry annotations
    pub fn set(
        &mut self,
        key: String,
        value: CacheValue,
        ttl: Option<Duration>,
        metadata: EntryMetadata,
    ) -> Result<()> {
        if key.is_empty() {
            return Err(CacheError::InvalidRequest("Key cannot be empty".to_string()));
        }
        if key.len() > MAX_KEY_LENGTH {
            return Err(CacheError::InvalidRequest(format!(
                "Key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            )));
        }

        let serialized_len = serde_json::to_vec(&value)
            .map_err(|e| CacheError::Internal(format!("Value is not serializable: {}", e)))?
            .len();
        if serialized_len > MAX_VALUE_SIZE {
            return Err(CacheError::InvalidRequest(format!(
                "Value exceeds maximum size of {} bytes",
                MAX_VALUE_SIZE
            )));
        }

        let is_overwrite = self.entries.contains_key(&key);

        // At capacity and inserting a new key: evict exactly one victim
        if !is_overwrite && self.entries.len() >= self.config.max_entries {
            if let Some(victim) = self.tracker.evict(&self.entries) {
                self.entries.remove(&victim);
                self.stats.record_eviction();
                debug!(store = %self.config.name, key = %victim, "evicted entry");
            } else {
                return Err(CacheError::Internal(
                    "Store is full and eviction produced no victim".to_string(),
                ));
            }
        }

        let ttl_ms = ttl
            .map(|d| d.as_millis() as u64)
            .or_else(|| self.config.default_ttl.map(|d| d.as_millis() as u64));

        let entry = CacheEntry::new(value, ttl_ms, metadata);
        self.entries.insert(key.clone(), entry);
        self.tracker.on_insert(&key);
        self.stats.set_total_entries(self.entries.len());

        Ok(())
    }

    // == Delete ==
    /// Removes an entry by key.
    ///
    /// Returns `true` if something was removed, `false` if absent.
    pub fn delete(&mut self, key: &str) -> bool {
        if self.entries.remove(key).is_some() {
            self.tracker.remove(key);
            self.stats.set_total_entries(self.entries.len());
            true
        } else {
            false
        }
    }

    // == Mark Stale ==
    /// Flags an entry stale for lazy invalidation. The entry stays in
    /// place until the next access or sweep drops it.
    ///
    /// Returns `true` if the key was present.
    pub fn mark_stale(&mut self, key: &str) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.stale = true;
                true
            }
            None => false,
        }
    }

    // == Clear ==
    /// Removes all entries and resets statistics.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.tracker.clear();
        self.stats = StoreStats::new();
    }

    // == Stats ==
    /// Returns a snapshot of current statistics.
    pub fn stats(&self) -> StoreStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    // == Cleanup Expired ==
    /// Removes all dead (expired or stale) entries.
    ///
    /// Returns the number of entries removed. Sweep removals are not
    /// counted as misses.
    pub fn cleanup_expired(&mut self) -> usize {
        let dead_keys: Vec<(String, bool)> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_dead())
            .map(|(key, entry)| (key.clone(), entry.stale))
            .collect();

        let count = dead_keys.len();

        for (key, was_stale) in dead_keys {
            self.entries.remove(&key);
            self.tracker.remove(&key);
            if was_stale {
                self.stats.record_stale_drop();
            } else {
                self.stats.record_expiration();
            }
        }

        self.stats.set_total_entries(self.entries.len());
        count
    }

    // == Keys ==
    /// Returns all physically present keys (live or not yet swept).
    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Remaining TTL for a key in milliseconds, if it exists and has one.
    pub fn ttl_remaining_ms(&self, key: &str) -> Option<u64> {
        self.entries.get(key).and_then(|e| e.ttl_remaining_ms())
    }

    // == Length ==
    /// Returns the current number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
