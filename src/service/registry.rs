//! Cache Registry Module
//!
//! Explicit registry of named stores, constructed once and threaded to
//! consumers instead of living in a global. One store per logical cache
//! domain.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::StoreConfig;
use crate::error::{CacheError, Result};
use crate::store::{CacheStore, SharedStore};

// == Cache Registry ==
#[derive(Debug, Default)]
pub struct CacheRegistry {
    stores: HashMap<String, SharedStore>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store from configuration and registers it under its
    /// configured name. Rejects duplicate names.
    pub fn create_store(&mut self, config: StoreConfig) -> Result<SharedStore> {
        let name = config.name.clone();
        if self.stores.contains_key(&name) {
            return Err(CacheError::InvalidConfig(format!(
                "store '{}' already registered",
                name
            )));
        }

        let store: SharedStore = Arc::new(RwLock::new(CacheStore::new(config)?));
        self.stores.insert(name, store.clone());
        Ok(store)
    }

    /// Looks up a store by name.
    pub fn store(&self, name: &str) -> Option<SharedStore> {
        self.stores.get(name).cloned()
    }

    /// Registered store names.
    pub fn names(&self) -> Vec<String> {
        self.stores.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_lookup() {
        let mut registry = CacheRegistry::new();
        registry.create_store(StoreConfig::default()).unwrap();

        assert!(registry.store("main").is_some());
        assert!(registry.store("other").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = CacheRegistry::new();
        registry.create_store(StoreConfig::default()).unwrap();

        let result = registry.create_store(StoreConfig::default());
        assert!(matches!(result, Err(CacheError::InvalidConfig(_))));
    }

    #[test]
    fn test_names() {
        let mut registry = CacheRegistry::new();
        registry.create_store(StoreConfig::default()).unwrap();
        registry
            .create_store(StoreConfig {
                name: "documents".to_string(),
                ..StoreConfig::default()
            })
            .unwrap();

        let mut names = registry.names();
        names.sort();
        assert_eq!(names, vec!["documents", "main"]);
    }
}
