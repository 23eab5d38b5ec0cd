//! Cache Service Facade
//!
//! Unifies the store, the invalidation engine, and the warming engine
//! behind one get/set/get_or_set/delete/invalidate/warm contract, with
//! per-operation timing and metric records.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{CacheServiceConfig, StoreConfig};
use crate::error::{CacheError, Result};
use crate::invalidation::{
    InvalidationEngine, InvalidationRule, InvalidationStats, KeyPattern, SharedInvalidationEngine,
};
use crate::metrics::{MetricRecord, MetricsSink, NoopSink, TracingSink};
use crate::service::{CacheRegistry, CacheResponse, CacheStatsReport, Singleflight};
use crate::store::{CacheValue, EntryMetadata, SharedStore, StoreStats};
use crate::tasks::spawn_sweep_task;
use crate::warming::{
    DataLoader, JobId, JobRecord, SharedWarmingEngine, WarmingEngine, WarmingPriority, WarmingRule,
    WarmingStats,
};

// == Cache Service ==
/// The facade the rest of the application talks to.
///
/// Owns the primary store, the engines its configuration enables, and
/// every background task it spawns. Constructed once per process with
/// [`CacheService::new`]; [`CacheService::initialize`] wires configured
/// rules and starts timers, and is idempotent.
pub struct CacheService {
    store: SharedStore,
    registry: StdMutex<CacheRegistry>,
    invalidation: Option<SharedInvalidationEngine>,
    warming: Option<SharedWarmingEngine>,
    metrics: Arc<dyn MetricsSink>,
    flight: Singleflight,
    tasks: StdMutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
    /// Rules from configuration, consumed by the first initialize call
    pending_rules: StdMutex<Option<(Vec<InvalidationRule>, Vec<WarmingRule>)>>,
    sweep_interval: Duration,
    factory_timeout: Option<Duration>,
    auto_warm_popular: bool,
    auto_warm_delay: Duration,
    auto_warm_limit: usize,
}

impl CacheService {
    // == Constructor ==
    /// Builds the store and, per configuration flags, the invalidation
    /// and warming engines. Fails fast on configuration errors.
    pub fn new(config: CacheServiceConfig) -> Result<Self> {
        config.validate()?;

        let CacheServiceConfig {
            store: store_config,
            enable_invalidation,
            enable_warming,
            enable_monitoring,
            auto_warm_popular,
            auto_warm_delay,
            auto_warm_limit,
            sweep_interval,
            factory_timeout,
            invalidation_rules,
            warming_rules,
        } = config;

        let store_name = store_config.name.clone();
        let store_metrics = store_config.enable_metrics;
        let mut registry = CacheRegistry::new();
        let store = registry.create_store(store_config)?;

        let invalidation = if enable_invalidation {
            let mut engine = InvalidationEngine::new();
            engine.register_manager(store_name.clone(), store.clone());
            Some(Arc::new(Mutex::new(engine)))
        } else {
            None
        };

        let warming = if enable_warming {
            let mut engine = WarmingEngine::new();
            engine.register_manager(store_name, store.clone());
            Some(Arc::new(Mutex::new(engine)))
        } else {
            None
        };

        let metrics: Arc<dyn MetricsSink> = if enable_monitoring && store_metrics {
            Arc::new(TracingSink)
        } else {
            Arc::new(NoopSink)
        };

        Ok(Self {
            store,
            registry: StdMutex::new(registry),
            invalidation,
            warming,
            metrics,
            flight: Singleflight::new(),
            tasks: StdMutex::new(Vec::new()),
            started: AtomicBool::new(false),
            pending_rules: StdMutex::new(Some((invalidation_rules, warming_rules))),
            sweep_interval,
            factory_timeout,
            auto_warm_popular,
            auto_warm_delay,
            auto_warm_limit,
        })
    }

    /// Swaps the metrics sink; useful for tests and embedders with their
    /// own collectors.
    pub fn with_metrics_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.metrics = sink;
        self
    }

    // == Initialize ==
    /// Wires configured rules, starts the background sweep, and
    /// schedules the deferred popular auto-warm when configured.
    ///
    /// Idempotent: a second call is a no-op with a logged notice.
    pub async fn initialize(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            info!("cache service already initialized; ignoring");
            return Ok(());
        }

        let (invalidation_rules, warming_rules) = self
            .pending_rules
            .lock()
            .expect("pending rules lock poisoned")
            .take()
            .unwrap_or_default();

        match &self.invalidation {
            Some(engine) => {
                let mut guard = engine.lock().await;
                for rule in invalidation_rules {
                    guard.add_rule(rule);
                }
            }
            None if !invalidation_rules.is_empty() => {
                warn!("invalidation rules configured but invalidation is disabled; dropping them");
            }
            None => {}
        }

        match &self.warming {
            Some(engine) => {
                for rule in warming_rules {
                    WarmingEngine::add_rule(engine, rule).await;
                }
            }
            None if !warming_rules.is_empty() => {
                warn!("warming rules configured but warming is disabled; dropping them");
            }
            None => {}
        }

        let sweep = spawn_sweep_task(
            self.store.clone(),
            self.invalidation.clone(),
            self.sweep_interval,
        );
        self.push_task(sweep);

        if self.auto_warm_popular {
            if let Some(engine) = self.warming.clone() {
                let delay = self.auto_warm_delay;
                let limit = self.auto_warm_limit;
                let handle = tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    match WarmingEngine::warm_popular(&engine, limit).await {
                        Ok(job_id) => info!(job_id, "deferred popular auto-warm finished"),
                        Err(e) => warn!(error = %e, "deferred popular auto-warm skipped"),
                    }
                });
                self.push_task(handle);
            }
        }

        info!("cache service initialized");
        Ok(())
    }

    // == Get ==
    /// Reads a key. Never fails: misses and internal problems are both
    /// reported through the envelope. Records the access for predictive
    /// warming as a side effect.
    pub async fn get(&self, key: &str, user: Option<&str>) -> CacheResponse {
        let started = Instant::now();
        let key = normalize_key(key);

        self.note_access(user, &key).await;

        let result = self.store.write().await.get(&key);
        let elapsed = elapsed_ms(started);

        let response = match result {
            Some(value) => CacheResponse::hit(&key, value, elapsed),
            None => CacheResponse::miss(&key, elapsed),
        };
        self.record(elapsed, "get", if response.from_cache { "hit" } else { "miss" });
        response
    }

    // == Set ==
    /// Writes a key. Declared dependencies in the metadata are handed to
    /// the invalidation engine.
    pub async fn set(
        &self,
        key: &str,
        value: CacheValue,
        ttl: Option<Duration>,
        metadata: EntryMetadata,
    ) -> CacheResponse {
        let started = Instant::now();
        let key = normalize_key(key);
        let depends_on = metadata.depends_on.clone();

        let result = self.store.write().await.set(key.clone(), value, ttl, metadata);
        let elapsed = elapsed_ms(started);

        match result {
            Ok(()) => {
                self.track_dependencies(&key, &depends_on).await;
                self.record(elapsed, "set", "success");
                CacheResponse::ok(&key, CacheValue::Bool(true), elapsed)
            }
            Err(e) => {
                self.record(elapsed, "set", "error");
                CacheResponse::failed(&key, e, elapsed)
            }
        }
    }

    // == Get Or Set ==
    /// The cache-aside primitive: return the cached value on hit, invoke
    /// the factory on miss and store its result.
    ///
    /// Concurrent callers for the same missing key share one factory
    /// call: followers wait on the key's gate, then observe the leader's
    /// result as a hit.
    ///
    /// Factory failures (including the optional deadline elapsing)
    /// propagate to the caller; everything else is captured into the
    /// envelope.
    pub async fn get_or_set<F, Fut>(
        &self,
        key: &str,
        factory: F,
        ttl: Option<Duration>,
        metadata: EntryMetadata,
        user: Option<&str>,
    ) -> anyhow::Result<CacheResponse>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<CacheValue>>,
    {
        let started = Instant::now();
        let key = normalize_key(key);

        self.note_access(user, &key).await;

        if let Some(value) = self.store.write().await.get(&key) {
            let elapsed = elapsed_ms(started);
            self.record(elapsed, "get_or_set", "hit");
            return Ok(CacheResponse::hit(&key, value, elapsed));
        }

        let gate = self.flight.gate(&key);
        let guard = gate.lock().await;

        // Re-check: the leader may have populated the key while we
        // waited on the gate
        if let Some(value) = self.store.write().await.get(&key) {
            drop(guard);
            self.flight.release(&key, &gate);
            let elapsed = elapsed_ms(started);
            self.record(elapsed, "get_or_set", "hit");
            return Ok(CacheResponse::hit(&key, value, elapsed));
        }

        let factory_started = Instant::now();
        let produced = match self.factory_timeout {
            Some(deadline) => match tokio::time::timeout(deadline, factory()).await {
                Ok(result) => result,
                Err(_) => Err(anyhow::anyhow!("factory timed out after {:?}", deadline)),
            },
            None => factory().await,
        };

        let value = match produced {
            Ok(value) => value,
            Err(e) => {
                drop(guard);
                self.flight.release(&key, &gate);
                let elapsed = elapsed_ms(started);
                self.record(elapsed, "get_or_set", "factory_error");
                return Err(e.context(format!("factory failed for cache key '{}'", key)));
            }
        };

        let mut metadata = metadata;
        metadata.cost_ms = Some(factory_started.elapsed().as_millis() as u64);
        if metadata.source.is_none() {
            metadata.source = Some("factory".to_string());
        }
        let depends_on = metadata.depends_on.clone();

        let stored = self
            .store
            .write()
            .await
            .set(key.clone(), value.clone(), ttl, metadata);
        drop(guard);
        self.flight.release(&key, &gate);

        let elapsed = elapsed_ms(started);
        match stored {
            Ok(()) => {
                self.track_dependencies(&key, &depends_on).await;
                self.record(elapsed, "get_or_set", "miss");
                Ok(CacheResponse::ok(&key, value, elapsed))
            }
            Err(e) => {
                self.record(elapsed, "get_or_set", "error");
                Ok(CacheResponse::failed(&key, e, elapsed))
            }
        }
    }

    // == Delete ==
    /// Removes a key and cascades through its dependents.
    pub async fn delete(&self, key: &str) -> CacheResponse {
        let started = Instant::now();
        let key = normalize_key(key);

        let removed = self.store.write().await.delete(&key);

        if let Some(engine) = &self.invalidation {
            let cascaded = engine.lock().await.invalidate_dependencies(&key).await;
            if cascaded > 0 {
                debug!(key = %key, cascaded, "delete cascaded to dependents");
            }
        }

        let elapsed = elapsed_ms(started);
        self.record(elapsed, "delete", if removed { "success" } else { "miss" });
        CacheResponse::ok(&key, CacheValue::Bool(removed), elapsed)
    }

    // == Invalidate Pattern ==
    /// Removes all keys matching the pattern across registered stores.
    /// Fails fast when invalidation is disabled: that is a programming
    /// error, not a runtime condition.
    pub async fn invalidate_pattern(
        &self,
        pattern: &KeyPattern,
        reason: Option<&str>,
    ) -> Result<usize> {
        let Some(engine) = &self.invalidation else {
            return Err(CacheError::InvalidationDisabled);
        };

        let started = Instant::now();
        let removed = engine.lock().await.invalidate_pattern(pattern, reason).await;
        self.record(elapsed_ms(started), "invalidate_pattern", "success");
        Ok(removed)
    }

    // == Notify Change ==
    /// Feeds an invalidation event (e.g. "user record changed") to the
    /// rule engine. Matching rules apply their strategies in descending
    /// priority order.
    pub async fn notify_change(&self, event_key: &str, reason: Option<&str>) -> Result<usize> {
        let Some(engine) = &self.invalidation else {
            return Err(CacheError::InvalidationDisabled);
        };

        let event_key = normalize_key(event_key);
        let started = Instant::now();
        let affected = engine.lock().await.trigger(&event_key, reason).await;
        self.record(elapsed_ms(started), "notify_change", "success");
        Ok(affected)
    }

    // == Warm Cache ==
    /// On-demand warming job for explicit keys.
    pub async fn warm_cache(
        &self,
        keys: Vec<String>,
        loader: Option<DataLoader>,
        priority: WarmingPriority,
    ) -> Result<JobId> {
        let Some(engine) = &self.warming else {
            return Err(CacheError::WarmingDisabled);
        };

        let keys = keys.iter().map(|k| normalize_key(k)).collect();
        let started = Instant::now();
        let job_id = WarmingEngine::warm_keys(engine, keys, loader, priority).await?;
        self.record(elapsed_ms(started), "warm_cache", "success");
        Ok(job_id)
    }

    // == Warm Predictive ==
    /// Warms the top-ranked keys for a user from access history.
    pub async fn warm_predictive(&self, user: Option<&str>, limit: usize) -> Result<JobId> {
        let Some(engine) = &self.warming else {
            return Err(CacheError::WarmingDisabled);
        };

        let started = Instant::now();
        let job_id = WarmingEngine::warm_predictive(engine, user, limit).await?;
        self.record(elapsed_ms(started), "warm_predictive", "success");
        Ok(job_id)
    }

    // == Warm Popular ==
    /// Warms the top keys by global access count.
    pub async fn warm_popular(&self, limit: usize) -> Result<JobId> {
        let Some(engine) = &self.warming else {
            return Err(CacheError::WarmingDisabled);
        };

        let started = Instant::now();
        let job_id = WarmingEngine::warm_popular(engine, limit).await?;
        self.record(elapsed_ms(started), "warm_popular", "success");
        Ok(job_id)
    }

    /// Outcome record for a finished warming job.
    pub async fn warming_job(&self, id: JobId) -> Result<Option<JobRecord>> {
        let Some(engine) = &self.warming else {
            return Err(CacheError::WarmingDisabled);
        };
        Ok(engine.lock().await.job(id))
    }

    // == Warming Toggle ==
    /// Turns warming back on and restarts interval rule timers.
    pub async fn enable_warming(&self) -> Result<()> {
        let Some(engine) = &self.warming else {
            return Err(CacheError::WarmingDisabled);
        };
        WarmingEngine::enable(engine).await;
        Ok(())
    }

    /// Turns warming off and cancels pending rule timers without
    /// clearing already-warmed entries.
    pub async fn disable_warming(&self) -> Result<()> {
        let Some(engine) = &self.warming else {
            return Err(CacheError::WarmingDisabled);
        };
        engine.lock().await.disable();
        Ok(())
    }

    // == Stats ==
    /// Aggregates store and engine statistics and derives human-readable
    /// recommendations.
    pub async fn get_cache_stats(&self) -> CacheStatsReport {
        let store = self.store.read().await.stats();
        let invalidation = match &self.invalidation {
            Some(engine) => Some(engine.lock().await.stats()),
            None => None,
        };
        let warming = match &self.warming {
            Some(engine) => Some(engine.lock().await.stats()),
            None => None,
        };

        let recommendations =
            derive_recommendations(&store, invalidation.as_ref(), warming.as_ref());

        CacheStatsReport {
            store,
            invalidation,
            warming,
            recommendations,
            generated_at: Utc::now(),
        }
    }

    // == Register Store ==
    /// Adds another named store for a separate cache domain and makes it
    /// visible to both engines.
    pub async fn register_store(&self, config: StoreConfig) -> Result<SharedStore> {
        let name = config.name.clone();
        let store = self
            .registry
            .lock()
            .expect("registry lock poisoned")
            .create_store(config)?;

        if let Some(engine) = &self.invalidation {
            engine.lock().await.register_manager(name.clone(), store.clone());
        }
        if let Some(engine) = &self.warming {
            engine.lock().await.register_manager(name, store.clone());
        }
        Ok(store)
    }

    // == Clear All ==
    /// Drops every entry in the primary store and resets its stats.
    pub async fn clear_all(&self) {
        self.store.write().await.clear();
        info!("cache cleared");
    }

    // == Shutdown ==
    /// Aborts every background task (sweep, auto-warm, rule timers) and
    /// clears the store.
    pub async fn shutdown(&self) {
        for handle in self
            .tasks
            .lock()
            .expect("task list lock poisoned")
            .drain(..)
        {
            handle.abort();
        }

        if let Some(engine) = &self.warming {
            engine.lock().await.shutdown();
        }

        self.store.write().await.clear();
        info!("cache service shut down");
    }

    // == Internal Helpers ==
    async fn note_access(&self, user: Option<&str>, key: &str) {
        if let Some(engine) = &self.warming {
            engine.lock().await.record_access(user, key);
        }
    }

    async fn track_dependencies(&self, key: &str, depends_on: &[String]) {
        if depends_on.is_empty() {
            return;
        }
        if let Some(engine) = &self.invalidation {
            let mut guard = engine.lock().await;
            for dependency in depends_on {
                guard.register_dependency(dependency, key);
            }
        }
    }

    fn push_task(&self, handle: JoinHandle<()>) {
        self.tasks
            .lock()
            .expect("task list lock poisoned")
            .push(handle);
    }

    /// Fire-and-forget metric record; must never fail the operation.
    fn record(&self, elapsed_ms: f64, operation: &str, outcome: &str) {
        self.metrics.record(MetricRecord::timer(
            "cache_operation",
            elapsed_ms,
            operation,
            outcome,
        ));
    }
}

/// Keys are case-folded and trimmed so "  Quiz:1 " and "quiz:1" address
/// the same entry.
fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

/// Derives advice strings from aggregated stats.
fn derive_recommendations(
    store: &StoreStats,
    invalidation: Option<&InvalidationStats>,
    warming: Option<&WarmingStats>,
) -> Vec<String> {
    let mut recommendations = Vec::new();

    let requests = store.hits + store.misses;
    if requests >= 20 && store.hit_rate() < 0.7 {
        recommendations
            .push("hit rate below 70%: consider warming frequently used keys".to_string());
    }
    if store.evictions > 0 && store.evictions as usize > store.total_entries {
        recommendations
            .push("eviction pressure is high: consider raising max_entries".to_string());
    }
    if let Some(warming) = warming {
        if warming.predictive_warmed >= 10 && warming.predictive_accuracy() < 0.3 {
            recommendations
                .push("predictive accuracy below 30%: review warming rules".to_string());
        }
    }
    if let Some(invalidation) = invalidation {
        if invalidation.failed_attempts > 0 {
            recommendations.push(
                "invalidations against unknown managers recorded: check rule manager names"
                    .to_string(),
            );
        }
    }

    recommendations
}
