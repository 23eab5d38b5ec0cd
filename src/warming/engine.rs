//! Warming Engine Module
//!
//! Proactive cache population: scheduled and eager rules, on-demand
//! jobs with bounded concurrency and per-key retry, and predictive
//! ranking from access history.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::config::DEFAULT_STORE_NAME;
use crate::error::{CacheError, Result};
use crate::store::{EntryMetadata, SharedStore};
use crate::warming::{AccessHistory, DataLoader, WarmingPriority, WarmingRule, WarmingStrategy};

/// Identifier for a warming job.
pub type JobId = u64;

/// How the engine is shared with the facade and its timer tasks.
pub type SharedWarmingEngine = Arc<Mutex<WarmingEngine>>;

// == Rule Run State ==
/// Explicit per-rule run state. A scheduled tick that finds the rule
/// Running is skipped, so rule execution is never re-entrant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Idle,
    Running,
}

#[derive(Debug, Clone)]
struct RuleGuard {
    state: Arc<StdMutex<RunState>>,
}

impl RuleGuard {
    fn new() -> Self {
        Self {
            state: Arc::new(StdMutex::new(RunState::Idle)),
        }
    }

    /// Idle -> Running transition; false if already Running.
    fn try_begin(&self) -> bool {
        let mut state = self.state.lock().expect("rule state lock poisoned");
        match *state {
            RunState::Running => false,
            RunState::Idle => {
                *state = RunState::Running;
                true
            }
        }
    }

    fn finish(&self) {
        *self.state.lock().expect("rule state lock poisoned") = RunState::Idle;
    }
}

// == Warming Stats ==
/// Counters for warming activity.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WarmingStats {
    pub jobs_started: u64,
    pub jobs_completed: u64,
    pub keys_warmed: u64,
    pub keys_failed: u64,
    /// Keys populated by predictive jobs
    pub predictive_warmed: u64,
    /// Predictively-warmed keys that were later requested
    pub predictive_hits: u64,
}

impl WarmingStats {
    /// Fraction of predictively-warmed keys later actually requested.
    pub fn predictive_accuracy(&self) -> f64 {
        if self.predictive_warmed == 0 {
            0.0
        } else {
            self.predictive_hits as f64 / self.predictive_warmed as f64
        }
    }
}

// == Job Record ==
/// Outcome of a single warming job.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: JobId,
    pub priority: WarmingPriority,
    pub total_keys: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub duration_ms: u64,
}

/// Batch execution parameters, taken from the rule or engine defaults.
#[derive(Debug, Clone, Copy)]
struct BatchParams {
    max_concurrency: usize,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl Default for BatchParams {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            retry_attempts: 2,
            retry_delay: Duration::from_millis(100),
        }
    }
}

impl BatchParams {
    fn from_rule(rule: &WarmingRule) -> Self {
        Self {
            max_concurrency: rule.max_concurrency,
            retry_attempts: rule.retry_attempts,
            retry_delay: rule.retry_delay,
        }
    }
}

/// One unit of warming work before loader/store resolution.
struct WarmTask {
    key: String,
    loader: Option<DataLoader>,
    manager: String,
}

// == Warming Engine ==
/// Owns warming rules, their timers, the access history, and job
/// bookkeeping. Shared behind a mutex; batch execution happens without
/// holding the engine lock so loaders never block unrelated operations.
pub struct WarmingEngine {
    managers: HashMap<String, SharedStore>,
    rules: Vec<Arc<WarmingRule>>,
    guards: HashMap<String, RuleGuard>,
    timers: Vec<JoinHandle<()>>,
    history: AccessHistory,
    /// Predictively warmed, not yet requested
    predictive_outstanding: HashSet<String>,
    jobs: HashMap<JobId, JobRecord>,
    stats: WarmingStats,
    enabled: bool,
    next_job_id: JobId,
}

impl WarmingEngine {
    // == Constructor ==
    pub fn new() -> Self {
        Self {
            managers: HashMap::new(),
            rules: Vec::new(),
            guards: HashMap::new(),
            timers: Vec::new(),
            history: AccessHistory::new(),
            predictive_outstanding: HashSet::new(),
            jobs: HashMap::new(),
            stats: WarmingStats::default(),
            enabled: true,
            next_job_id: 0,
        }
    }

    // == Manager Registry ==
    /// Associates a named store for warming target resolution.
    pub fn register_manager(&mut self, name: impl Into<String>, store: SharedStore) {
        let name = name.into();
        debug!(manager = %name, "registered store with warming engine");
        self.managers.insert(name, store);
    }

    // == Record Access ==
    /// Feeds the predictive ranking; also settles predictive-accuracy
    /// bookkeeping when a predictively-warmed key is requested.
    pub fn record_access(&mut self, user: Option<&str>, key: &str) {
        self.history.record(user, key);
        if self.predictive_outstanding.remove(key) {
            self.stats.predictive_hits += 1;
        }
    }

    /// Whether warming is globally enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    // == Disable ==
    /// Turns warming off and cancels pending rule timers. Already-warmed
    /// entries are left in place.
    pub fn disable(&mut self) {
        self.enabled = false;
        for timer in self.timers.drain(..) {
            timer.abort();
        }
        info!("warming disabled; rule timers cancelled");
    }

    // == Enable ==
    /// Turns warming back on and restarts timers for interval rules.
    pub async fn enable(engine: &SharedWarmingEngine) {
        let interval_rules: Vec<Arc<WarmingRule>> = {
            let mut guard = engine.lock().await;
            if guard.enabled {
                return;
            }
            guard.enabled = true;
            guard
                .rules
                .iter()
                .filter(|rule| rule.enabled && rule.schedule.interval.is_some())
                .cloned()
                .collect()
        };

        for rule in interval_rules {
            let interval = rule.schedule.interval.expect("filtered on interval");
            let handle = Self::spawn_rule_timer(engine.clone(), rule, interval);
            engine.lock().await.timers.push(handle);
        }
        info!("warming enabled");
    }

    // == Add Rule ==
    /// Registers a warming rule. Runs it once immediately when the
    /// schedule says so, and starts its interval timer if configured.
    pub async fn add_rule(engine: &SharedWarmingEngine, rule: WarmingRule) {
        let rule = Arc::new(rule);
        let engine_enabled = {
            let mut guard = engine.lock().await;
            guard.guards.insert(rule.name.clone(), RuleGuard::new());
            guard.rules.push(rule.clone());
            info!(rule = %rule.name, strategy = ?rule.strategy, "warming rule added");
            guard.enabled
        };

        if !engine_enabled || !rule.enabled {
            return;
        }

        if rule.schedule.immediate {
            Self::run_rule(engine, rule.clone()).await;
        }

        if let Some(interval) = rule.schedule.interval {
            let handle = Self::spawn_rule_timer(engine.clone(), rule, interval);
            engine.lock().await.timers.push(handle);
        }
    }

    /// Spawns the single timer task for an interval rule.
    fn spawn_rule_timer(
        engine: SharedWarmingEngine,
        rule: Arc<WarmingRule>,
        interval: Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            debug!(rule = %rule.name, ?interval, "warming rule timer started");
            loop {
                tokio::time::sleep(interval).await;

                if !engine.lock().await.enabled {
                    break;
                }
                Self::run_rule(&engine, rule.clone()).await;
            }
        })
    }

    // == Run Rule ==
    /// Executes one rule run. A tick arriving while the previous run is
    /// still in flight is skipped.
    pub async fn run_rule(engine: &SharedWarmingEngine, rule: Arc<WarmingRule>) {
        let guard = { engine.lock().await.guards.get(&rule.name).cloned() };
        let Some(guard) = guard else {
            return;
        };

        if !guard.try_begin() {
            debug!(rule = %rule.name, "previous run still in flight; skipping tick");
            return;
        }

        let keys: Vec<String> = match rule.strategy {
            WarmingStrategy::Eager | WarmingStrategy::Scheduled => rule
                .seed_keys
                .iter()
                .take(rule.batch_size)
                .cloned()
                .collect(),
            WarmingStrategy::Predictive => {
                let eng = engine.lock().await;
                eng.history
                    .rank_popular(rule.batch_size.saturating_mul(4))
                    .into_iter()
                    .filter(|key| rule.pattern.matches(key))
                    .take(rule.batch_size)
                    .collect()
            }
        };

        if !keys.is_empty() {
            let tasks = keys
                .into_iter()
                .map(|key| WarmTask {
                    key,
                    loader: Some(rule.loader.clone()),
                    manager: rule.manager.clone(),
                })
                .collect();
            Self::run_job(
                engine,
                tasks,
                rule.priority,
                BatchParams::from_rule(&rule),
                false,
            )
            .await;
        }

        guard.finish();
    }

    // == Warm Keys ==
    /// On-demand warming job for explicit keys. Each key is populated
    /// via the given loader, or the first matching enabled rule's loader
    /// when omitted. Returns the job identifier once the job completes.
    pub async fn warm_keys(
        engine: &SharedWarmingEngine,
        keys: Vec<String>,
        loader: Option<DataLoader>,
        priority: WarmingPriority,
    ) -> Result<JobId> {
        if !engine.lock().await.enabled {
            return Err(CacheError::WarmingDisabled);
        }

        let tasks = keys
            .into_iter()
            .map(|key| WarmTask {
                key,
                loader: loader.clone(),
                manager: DEFAULT_STORE_NAME.to_string(),
            })
            .collect();

        Ok(Self::run_job(engine, tasks, priority, BatchParams::default(), false).await)
    }

    // == Warm Predictive ==
    /// Ranks candidate keys for a user from access history and warms the
    /// top `limit`.
    pub async fn warm_predictive(
        engine: &SharedWarmingEngine,
        user: Option<&str>,
        limit: usize,
    ) -> Result<JobId> {
        let tasks: Vec<WarmTask> = {
            let eng = engine.lock().await;
            if !eng.enabled {
                return Err(CacheError::WarmingDisabled);
            }
            eng.history
                .rank_for_user(user, limit)
                .into_iter()
                .map(|key| WarmTask {
                    key,
                    loader: None,
                    manager: DEFAULT_STORE_NAME.to_string(),
                })
                .collect()
        };

        Ok(Self::run_job(
            engine,
            tasks,
            WarmingPriority::Medium,
            BatchParams::default(),
            true,
        )
        .await)
    }

    // == Warm Popular ==
    /// Warms the top `limit` keys by global access count.
    pub async fn warm_popular(engine: &SharedWarmingEngine, limit: usize) -> Result<JobId> {
        let tasks: Vec<WarmTask> = {
            let eng = engine.lock().await;
            if !eng.enabled {
                return Err(CacheError::WarmingDisabled);
            }
            eng.history
                .rank_popular(limit)
                .into_iter()
                .map(|key| WarmTask {
                    key,
                    loader: None,
                    manager: DEFAULT_STORE_NAME.to_string(),
                })
                .collect()
        };

        Ok(Self::run_job(
            engine,
            tasks,
            WarmingPriority::Low,
            BatchParams::default(),
            false,
        )
        .await)
    }

    /// First enabled rule whose pattern matches the key supplies the
    /// fallback loader.
    fn loader_for(&self, key: &str) -> Option<DataLoader> {
        self.rules
            .iter()
            .find(|rule| rule.enabled && rule.pattern.matches(key))
            .map(|rule| rule.loader.clone())
    }

    // == Run Job ==
    /// Core batch executor. Resolves loaders and stores under the lock,
    /// then runs up to `max_concurrency` loader calls in flight, each
    /// with retry-then-skip failure handling.
    async fn run_job(
        engine: &SharedWarmingEngine,
        tasks: Vec<WarmTask>,
        priority: WarmingPriority,
        params: BatchParams,
        predictive: bool,
    ) -> JobId {
        let total = tasks.len();
        let (job_id, resolved) = {
            let mut eng = engine.lock().await;
            eng.next_job_id += 1;
            eng.stats.jobs_started += 1;
            let resolved: Vec<(String, Option<DataLoader>, Option<SharedStore>)> = tasks
                .into_iter()
                .map(|task| {
                    let loader = task.loader.or_else(|| eng.loader_for(&task.key));
                    let store = eng.managers.get(&task.manager).cloned();
                    (task.key, loader, store)
                })
                .collect();
            (eng.next_job_id, resolved)
        };

        let started = Instant::now();
        let semaphore = Arc::new(Semaphore::new(params.max_concurrency.max(1)));
        let mut set = JoinSet::new();
        let mut failed = 0usize;

        for (key, loader, store) in resolved {
            let (Some(loader), Some(store)) = (loader, store) else {
                warn!(key = %key, "no loader or store resolved for warming; skipping key");
                failed += 1;
                continue;
            };
            let semaphore = semaphore.clone();
            set.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (key, false);
                };
                load_and_store(key, loader, store, params.retry_attempts, params.retry_delay).await
            });
        }

        let mut succeeded_keys: Vec<String> = Vec::new();
        while let Some(result) = set.join_next().await {
            match result {
                Ok((key, true)) => succeeded_keys.push(key),
                _ => failed += 1,
            }
        }

        let record = JobRecord {
            id: job_id,
            priority,
            total_keys: total,
            succeeded: succeeded_keys.len(),
            failed,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        {
            let mut eng = engine.lock().await;
            eng.stats.jobs_completed += 1;
            eng.stats.keys_warmed += succeeded_keys.len() as u64;
            eng.stats.keys_failed += failed as u64;
            if predictive {
                eng.stats.predictive_warmed += succeeded_keys.len() as u64;
                eng.predictive_outstanding.extend(succeeded_keys.iter().cloned());
            }
            eng.jobs.insert(job_id, record);
        }

        info!(
            job_id,
            succeeded = succeeded_keys.len(),
            failed,
            "warming job finished"
        );
        job_id
    }

    // == Job Lookup ==
    /// Outcome record for a finished job.
    pub fn job(&self, id: JobId) -> Option<JobRecord> {
        self.jobs.get(&id).cloned()
    }

    // == Stats ==
    /// Returns a snapshot of warming counters.
    pub fn stats(&self) -> WarmingStats {
        self.stats.clone()
    }

    /// Number of distinct keys seen by the access history.
    pub fn tracked_keys(&self) -> usize {
        self.history.tracked_keys()
    }

    // == Shutdown ==
    /// Cancels all rule timers.
    pub fn shutdown(&mut self) {
        for timer in self.timers.drain(..) {
            timer.abort();
        }
    }
}

impl Default for WarmingEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Loads one key with retry-then-skip semantics and stores the result.
async fn load_and_store(
    key: String,
    loader: DataLoader,
    store: SharedStore,
    retry_attempts: u32,
    retry_delay: Duration,
) -> (String, bool) {
    let mut attempt = 0u32;
    loop {
        match loader(key.clone()).await {
            Ok(value) => {
                let metadata = EntryMetadata {
                    source: Some("warming".to_string()),
                    ..EntryMetadata::default()
                };
                let mut guard = store.write().await;
                return match guard.set(key.clone(), value, None, metadata) {
                    Ok(()) => (key, true),
                    Err(e) => {
                        warn!(key = %key, error = %e, "failed to store warmed value");
                        (key, false)
                    }
                };
            }
            Err(e) if attempt < retry_attempts => {
                attempt += 1;
                debug!(key = %key, attempt, error = %e, "loader failed; retrying");
                tokio::time::sleep(retry_delay).await;
            }
            Err(e) => {
                warn!(key = %key, error = %e, "loader failed after retries; skipping key");
                return (key, false);
            }
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::invalidation::KeyPattern;
    use crate::store::CacheStore;
    use crate::warming::{loader_fn, WarmingSchedule};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::RwLock;

    fn shared_store() -> SharedStore {
        let config = StoreConfig {
            default_ttl: None,
            ..StoreConfig::default()
        };
        Arc::new(RwLock::new(CacheStore::new(config).unwrap()))
    }

    fn engine_with_store(store: SharedStore) -> SharedWarmingEngine {
        let mut engine = WarmingEngine::new();
        engine.register_manager("main", store);
        Arc::new(Mutex::new(engine))
    }

    fn echo_loader() -> DataLoader {
        loader_fn(|key| async move { Ok(json!(format!("warmed:{}", key))) })
    }

    #[tokio::test]
    async fn test_warm_keys_populates_store() {
        let store = shared_store();
        let engine = engine_with_store(store.clone());

        let job_id = WarmingEngine::warm_keys(
            &engine,
            vec!["quiz:1".to_string(), "quiz:2".to_string()],
            Some(echo_loader()),
            WarmingPriority::High,
        )
        .await
        .unwrap();

        let mut guard = store.write().await;
        assert_eq!(guard.get("quiz:1"), Some(json!("warmed:quiz:1")));
        assert_eq!(guard.get("quiz:2"), Some(json!("warmed:quiz:2")));

        let eng = engine.lock().await;
        let job = eng.job(job_id).unwrap();
        assert_eq!(job.total_keys, 2);
        assert_eq!(job.succeeded, 2);
        assert_eq!(job.failed, 0);
        assert_eq!(job.priority, WarmingPriority::High);
    }

    #[tokio::test]
    async fn test_failing_key_is_retried_then_skipped() {
        let store = shared_store();
        let engine = engine_with_store(store.clone());

        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_in_loader = attempts.clone();
        let loader = loader_fn(move |key| {
            let attempts = attempts_in_loader.clone();
            async move {
                if key == "bad" {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    anyhow::bail!("loader exploded");
                }
                Ok(json!("ok"))
            }
        });

        let job_id = WarmingEngine::warm_keys(
            &engine,
            vec!["bad".to_string(), "good".to_string()],
            Some(loader),
            WarmingPriority::Medium,
        )
        .await
        .unwrap();

        // 1 initial attempt + 2 retries
        assert_eq!(attempts.load(Ordering::SeqCst), 3);

        let eng = engine.lock().await;
        let job = eng.job(job_id).unwrap();
        assert_eq!(job.succeeded, 1);
        assert_eq!(job.failed, 1);

        // The failing key never aborted the rest of the batch
        let mut guard = store.write().await;
        assert_eq!(guard.get("good"), Some(json!("ok")));
    }

    #[tokio::test]
    async fn test_warm_keys_while_disabled_errors() {
        let store = shared_store();
        let engine = engine_with_store(store);
        engine.lock().await.disable();

        let result = WarmingEngine::warm_keys(
            &engine,
            vec!["k".to_string()],
            Some(echo_loader()),
            WarmingPriority::Low,
        )
        .await;

        assert!(matches!(result, Err(CacheError::WarmingDisabled)));
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let store = shared_store();
        let engine = engine_with_store(store);

        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let (active_l, max_l) = (active.clone(), max_seen.clone());
        let loader = loader_fn(move |_key| {
            let active = active_l.clone();
            let max_seen = max_l.clone();
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(30)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                Ok(json!(1))
            }
        });

        let keys: Vec<String> = (0..8).map(|i| format!("k{}", i)).collect();
        WarmingEngine::warm_keys(&engine, keys, Some(loader), WarmingPriority::Medium)
            .await
            .unwrap();

        // BatchParams::default() allows 4 in flight
        assert!(max_seen.load(Ordering::SeqCst) <= 4);
    }

    #[tokio::test]
    async fn test_warm_popular_targets_most_accessed() {
        let store = shared_store();
        let engine = engine_with_store(store.clone());

        {
            let mut eng = engine.lock().await;
            for _ in 0..5 {
                eng.record_access(None, "quiz:hot");
            }
            for _ in 0..2 {
                eng.record_access(None, "quiz:mild");
            }
            eng.record_access(None, "quiz:cold");

            // Popular warming resolves loaders through matching rules
        }
        WarmingEngine::add_rule(
            &engine,
            WarmingRule::new(
                "quizzes",
                WarmingStrategy::Eager,
                KeyPattern::prefix("quiz:"),
                echo_loader(),
            ),
        )
        .await;

        WarmingEngine::warm_popular(&engine, 2).await.unwrap();

        let mut guard = store.write().await;
        assert!(guard.get("quiz:hot").is_some());
        assert!(guard.get("quiz:mild").is_some());
        assert_eq!(guard.get("quiz:cold"), None);
    }

    #[tokio::test]
    async fn test_warm_predictive_and_accuracy() {
        let store = shared_store();
        let engine = engine_with_store(store.clone());

        WarmingEngine::add_rule(
            &engine,
            WarmingRule::new(
                "quizzes",
                WarmingStrategy::Predictive,
                KeyPattern::prefix("quiz:"),
                echo_loader(),
            ),
        )
        .await;

        {
            let mut eng = engine.lock().await;
            for _ in 0..3 {
                eng.record_access(Some("u1"), "quiz:a");
            }
            eng.record_access(Some("u1"), "quiz:b");
        }

        WarmingEngine::warm_predictive(&engine, Some("u1"), 2)
            .await
            .unwrap();

        {
            let mut guard = store.write().await;
            assert!(guard.get("quiz:a").is_some());
        }

        let mut eng = engine.lock().await;
        assert_eq!(eng.stats().predictive_warmed, 2);
        assert_eq!(eng.stats().predictive_accuracy(), 0.0);

        // One of the two warmed keys is requested afterwards
        eng.record_access(Some("u1"), "quiz:a");
        assert_eq!(eng.stats().predictive_hits, 1);
        assert!((eng.stats().predictive_accuracy() - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_immediate_rule_runs_at_registration() {
        let store = shared_store();
        let engine = engine_with_store(store.clone());

        WarmingEngine::add_rule(
            &engine,
            WarmingRule::new(
                "startup",
                WarmingStrategy::Eager,
                KeyPattern::prefix("config:"),
                echo_loader(),
            )
            .with_seed_keys(["config:plans"])
            .with_schedule(WarmingSchedule::immediate()),
        )
        .await;

        let mut guard = store.write().await;
        assert_eq!(guard.get("config:plans"), Some(json!("warmed:config:plans")));
    }

    #[tokio::test]
    async fn test_interval_rule_ticks() {
        let store = shared_store();
        let engine = engine_with_store(store.clone());

        WarmingEngine::add_rule(
            &engine,
            WarmingRule::new(
                "refresher",
                WarmingStrategy::Scheduled,
                KeyPattern::prefix("feed:"),
                echo_loader(),
            )
            .with_seed_keys(["feed:today"])
            .with_schedule(WarmingSchedule::every(Duration::from_millis(30))),
        )
        .await;

        tokio::time::sleep(Duration::from_millis(90)).await;

        let mut guard = store.write().await;
        assert!(guard.get("feed:today").is_some());
    }

    #[tokio::test]
    async fn test_slow_rule_tick_is_skipped_not_stacked() {
        let store = shared_store();
        let engine = engine_with_store(store);

        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let (active_l, max_l) = (active.clone(), max_seen.clone());
        let slow_loader = loader_fn(move |_key| {
            let active = active_l.clone();
            let max_seen = max_l.clone();
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(120)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                Ok(json!(1))
            }
        });

        WarmingEngine::add_rule(
            &engine,
            WarmingRule::new(
                "slow",
                WarmingStrategy::Scheduled,
                KeyPattern::prefix("slow:"),
                slow_loader,
            )
            .with_seed_keys(["slow:1"])
            .with_schedule(WarmingSchedule::every(Duration::from_millis(20))),
        )
        .await;

        tokio::time::sleep(Duration::from_millis(250)).await;
        engine.lock().await.disable();

        // Ticks arriving mid-run were skipped, never run re-entrantly
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disable_cancels_timers_keeps_entries() {
        let store = shared_store();
        let engine = engine_with_store(store.clone());

        WarmingEngine::warm_keys(
            &engine,
            vec!["kept".to_string()],
            Some(echo_loader()),
            WarmingPriority::Medium,
        )
        .await
        .unwrap();

        engine.lock().await.disable();

        let mut guard = store.write().await;
        assert!(guard.get("kept").is_some());
    }

    #[tokio::test]
    async fn test_warm_keys_uses_rule_loader_when_omitted() {
        let store = shared_store();
        let engine = engine_with_store(store.clone());

        WarmingEngine::add_rule(
            &engine,
            WarmingRule::new(
                "quizzes",
                WarmingStrategy::Eager,
                KeyPattern::prefix("quiz:"),
                echo_loader(),
            ),
        )
        .await;

        let job_id = WarmingEngine::warm_keys(
            &engine,
            vec!["quiz:9".to_string(), "unmatched:1".to_string()],
            None,
            WarmingPriority::Medium,
        )
        .await
        .unwrap();

        let eng = engine.lock().await;
        let job = eng.job(job_id).unwrap();
        assert_eq!(job.succeeded, 1);
        assert_eq!(job.failed, 1);

        drop(eng);
        let mut guard = store.write().await;
        assert_eq!(guard.get("quiz:9"), Some(json!("warmed:quiz:9")));
        assert_eq!(guard.get("unmatched:1"), None);
    }
}
