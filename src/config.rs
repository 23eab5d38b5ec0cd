//! Configuration Module
//!
//! Configuration structs for the cache service, with environment
//! variable overrides for the basic knobs.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};
use crate::invalidation::InvalidationRule;
use crate::store::EvictionPolicy;
use crate::warming::WarmingRule;

/// Default name for the primary store.
pub const DEFAULT_STORE_NAME: &str = "main";

// == Cache Layer ==
/// Storage layering for a store.
///
/// `MemoryAndDisk` is accepted as configuration but the disk layer is an
/// unimplemented extension point; the store runs memory-only and logs a
/// warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheLayer {
    Memory,
    MemoryAndDisk,
}

impl Default for CacheLayer {
    fn default() -> Self {
        CacheLayer::Memory
    }
}

// == Store Config ==
/// Configuration for a single cache store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Store name; one store per logical cache domain
    pub name: String,
    /// Maximum number of entries the store can hold
    pub max_entries: usize,
    /// Default TTL for entries set without one (None = never expire)
    pub default_ttl: Option<Duration>,
    /// Eviction policy (LRU by default)
    pub policy: EvictionPolicy,
    /// Storage layering
    pub layer: CacheLayer,
    /// Whether store operations emit metric records
    pub enable_metrics: bool,
    /// Compression toggle (pluggable extension point, no built-in codec)
    pub compression_enabled: bool,
    /// Disk persistence toggle (extension point, no on-disk format)
    pub persist_to_disk: bool,
}

impl StoreConfig {
    /// Validates the configuration. A zero entry bound is a programming
    /// error and fails construction.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(CacheError::InvalidConfig(
                "store name cannot be empty".to_string(),
            ));
        }
        if self.max_entries == 0 {
            return Err(CacheError::InvalidConfig(
                "max_entries must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_STORE_NAME.to_string(),
            max_entries: 1000,
            default_ttl: Some(Duration::from_secs(300)),
            policy: EvictionPolicy::Lru,
            layer: CacheLayer::Memory,
            enable_metrics: true,
            compression_enabled: false,
            persist_to_disk: false,
        }
    }
}

// == Service Config ==
/// Top-level configuration for the cache service facade.
pub struct CacheServiceConfig {
    /// Configuration for the primary store
    pub store: StoreConfig,
    /// Construct the invalidation engine
    pub enable_invalidation: bool,
    /// Construct the warming engine
    pub enable_warming: bool,
    /// Emit per-operation metric records
    pub enable_monitoring: bool,
    /// Schedule a deferred popular-content warm after startup
    pub auto_warm_popular: bool,
    /// Delay before the deferred auto-warm runs
    pub auto_warm_delay: Duration,
    /// How many popular keys the auto-warm targets
    pub auto_warm_limit: usize,
    /// Interval between background sweep ticks
    pub sweep_interval: Duration,
    /// Deadline applied to each factory invocation (None = unbounded)
    pub factory_timeout: Option<Duration>,
    /// Invalidation rules wired at initialization
    pub invalidation_rules: Vec<InvalidationRule>,
    /// Warming rules wired at initialization
    pub warming_rules: Vec<WarmingRule>,
}

impl CacheServiceConfig {
    /// Loads basic knobs from environment variables, leaving rule lists
    /// empty.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_ENTRIES` - Maximum store entries (default: 1000)
    /// - `CACHE_DEFAULT_TTL_MS` - Default TTL in milliseconds (default: 300000)
    /// - `CACHE_SWEEP_INTERVAL_MS` - Sweep cadence in milliseconds (default: 1000)
    /// - `CACHE_POLICY` - Eviction policy: lru, lfu, or fifo (default: lru)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(max_entries) = read_env("CACHE_MAX_ENTRIES") {
            config.store.max_entries = max_entries;
        }
        if let Some(ttl_ms) = read_env("CACHE_DEFAULT_TTL_MS") {
            config.store.default_ttl = Some(Duration::from_millis(ttl_ms));
        }
        if let Some(sweep_ms) = read_env("CACHE_SWEEP_INTERVAL_MS") {
            config.sweep_interval = Duration::from_millis(sweep_ms);
        }
        if let Ok(policy) = env::var("CACHE_POLICY") {
            config.store.policy = match policy.to_lowercase().as_str() {
                "lfu" => EvictionPolicy::Lfu,
                "fifo" => EvictionPolicy::Fifo,
                _ => EvictionPolicy::Lru,
            };
        }

        config
    }

    /// Validates the full configuration.
    pub fn validate(&self) -> Result<()> {
        self.store.validate()?;
        if self.auto_warm_popular && !self.enable_warming {
            return Err(CacheError::InvalidConfig(
                "auto_warm_popular requires enable_warming".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CacheServiceConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            enable_invalidation: true,
            enable_warming: true,
            enable_monitoring: true,
            auto_warm_popular: false,
            auto_warm_delay: Duration::from_secs(30),
            auto_warm_limit: 20,
            sweep_interval: Duration::from_secs(1),
            factory_timeout: None,
            invalidation_rules: Vec::new(),
            warming_rules: Vec::new(),
        }
    }
}

fn read_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}
