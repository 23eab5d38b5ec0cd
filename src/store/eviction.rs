//! Eviction Tracker Module
//!
//! Tracks access order and selects eviction victims per policy.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::store::CacheEntry;

// == Eviction Policy ==
/// Closed set of eviction policies. LRU is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvictionPolicy {
    /// Evict the entry with the oldest last access; ties broken by
    /// oldest creation time
    Lru,
    /// Evict the entry with the lowest access count; ties broken by
    /// oldest creation time
    Lfu,
    /// Evict the oldest inserted entry
    Fifo,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        EvictionPolicy::Lru
    }
}

// == Eviction Tracker ==
/// Tracks key order for victim selection.
///
/// Keys are stored in a VecDeque where:
/// - Front = most recently used (LRU) or most recently inserted (FIFO)
/// - Back = eviction candidate
///
/// LFU ignores the deque order and scans entry access counts instead.
#[derive(Debug)]
pub struct EvictionTracker {
    policy: EvictionPolicy,
    /// Key order; interpretation depends on policy
    order: VecDeque<String>,
}

impl EvictionTracker {
    // == Constructor ==
    /// Creates a new empty tracker for the given policy.
    pub fn new(policy: EvictionPolicy) -> Self {
        Self {
            policy,
            order: VecDeque::new(),
        }
    }

    /// The policy this tracker applies.
    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    // == On Insert ==
    /// Registers a newly inserted key at the front.
    pub fn on_insert(&mut self, key: &str) {
        self.remove(key);
        self.order.push_front(key.to_string());
    }

    // == On Access ==
    /// Records a read. Only LRU reorders on access; FIFO keeps insertion
    /// order and LFU ranks by access counts held on the entries.
    pub fn on_access(&mut self, key: &str) {
        match self.policy {
            EvictionPolicy::Lru => {
                self.remove(key);
                self.order.push_front(key.to_string());
            }
            EvictionPolicy::Lfu | EvictionPolicy::Fifo => {}
        }
    }

    // == Remove ==
    /// Removes a key from the tracker.
    pub fn remove(&mut self, key: &str) {
        self.order.retain(|k| k != key);
    }

    // == Evict ==
    /// Selects, removes, and returns the eviction victim.
    ///
    /// Returns None if the tracker is empty.
    pub fn evict(&mut self, entries: &HashMap<String, CacheEntry>) -> Option<String> {
        match self.policy {
            EvictionPolicy::Lru | EvictionPolicy::Fifo => self.order.pop_back(),
            EvictionPolicy::Lfu => {
                let victim = entries
                    .iter()
                    .min_by_key(|(_, entry)| (entry.access_count, entry.created_at))
                    .map(|(key, _)| key.clone())?;
                self.remove(&victim);
                Some(victim)
            }
        }
    }

    // == Clear ==
    /// Drops all tracked keys.
    pub fn clear(&mut self) {
        self.order.clear();
    }

    // == Length ==
    /// Returns the number of tracked keys.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Checks if a key is being tracked.
    #[allow(dead_code)]
    pub fn contains(&self, key: &str) -> bool {
        self.order.iter().any(|k| k == key)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::EntryMetadata;
    use serde_json::json;

    fn entries_with_counts(counts: &[(&str, u64)]) -> HashMap<String, CacheEntry> {
        counts
            .iter()
            .map(|(key, count)| {
                let mut entry = CacheEntry::new(json!(1), None, EntryMetadata::default());
                entry.access_count = *count;
                (key.to_string(), entry)
            })
            .collect()
    }

    #[test]
    fn test_tracker_new() {
        let tracker = EvictionTracker::new(EvictionPolicy::Lru);
        assert!(tracker.is_empty());
        assert_eq!(tracker.len(), 0);
    }

    #[test]
    fn test_lru_evicts_least_recently_used() {
        let mut tracker = EvictionTracker::new(EvictionPolicy::Lru);
        let entries = entries_with_counts(&[("a", 0), ("b", 0), ("c", 0)]);

        tracker.on_insert("a");
        tracker.on_insert("b");
        tracker.on_insert("c");

        // Touch "a" so "b" becomes the oldest
        tracker.on_access("a");

        assert_eq!(tracker.evict(&entries), Some("b".to_string()));
        assert_eq!(tracker.evict(&entries), Some("c".to_string()));
        assert_eq!(tracker.evict(&entries), Some("a".to_string()));
    }

    #[test]
    fn test_fifo_ignores_access_order() {
        let mut tracker = EvictionTracker::new(EvictionPolicy::Fifo);
        let entries = entries_with_counts(&[("a", 0), ("b", 0), ("c", 0)]);

        tracker.on_insert("a");
        tracker.on_insert("b");
        tracker.on_insert("c");

        // Access must not save "a" under FIFO
        tracker.on_access("a");

        assert_eq!(tracker.evict(&entries), Some("a".to_string()));
        assert_eq!(tracker.evict(&entries), Some("b".to_string()));
    }

    #[test]
    fn test_lfu_evicts_least_frequent() {
        let mut tracker = EvictionTracker::new(EvictionPolicy::Lfu);
        let entries = entries_with_counts(&[("hot", 10), ("warm", 3), ("cold", 1)]);

        tracker.on_insert("hot");
        tracker.on_insert("warm");
        tracker.on_insert("cold");

        assert_eq!(tracker.evict(&entries), Some("cold".to_string()));
        assert!(!tracker.contains("cold"));
    }

    #[test]
    fn test_evict_empty() {
        let mut tracker = EvictionTracker::new(EvictionPolicy::Lru);
        assert_eq!(tracker.evict(&HashMap::new()), None);
    }

    #[test]
    fn test_remove() {
        let mut tracker = EvictionTracker::new(EvictionPolicy::Lru);

        tracker.on_insert("a");
        tracker.on_insert("b");
        tracker.remove("a");

        assert_eq!(tracker.len(), 1);
        assert!(!tracker.contains("a"));
        assert!(tracker.contains("b"));
    }

    #[test]
    fn test_remove_nonexistent_key() {
        let mut tracker = EvictionTracker::new(EvictionPolicy::Lru);

        tracker.on_insert("a");
        tracker.remove("missing");

        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_reinsert_deduplicates() {
        let mut tracker = EvictionTracker::new(EvictionPolicy::Lru);

        tracker.on_insert("a");
        tracker.on_insert("a");
        tracker.on_insert("a");

        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_clear() {
        let mut tracker = EvictionTracker::new(EvictionPolicy::Fifo);
        tracker.on_insert("a");
        tracker.on_insert("b");

        tracker.clear();
        assert!(tracker.is_empty());
    }
}
