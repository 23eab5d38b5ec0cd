//! Invalidation Engine Module
//!
//! Rule-based and dependency-based removal of stale entries across
//! registered stores.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::invalidation::{InvalidationRule, InvalidationStrategy, KeyPattern};
use crate::store::SharedStore;

/// How the engine is shared with the facade and the sweep task.
pub type SharedInvalidationEngine = std::sync::Arc<tokio::sync::Mutex<InvalidationEngine>>;

// == Invalidation Stats ==
/// Per-strategy invalidation counts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StrategyCounts {
    pub immediate: u64,
    pub lazy: u64,
    pub scheduled: u64,
    pub dependency: u64,
}

/// Counters for invalidation activity.
///
/// `total_invalidated` counts entries removed or flagged stale;
/// `failed_attempts` counts invalidations referencing unregistered store
/// names, which are reported here rather than raised.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InvalidationStats {
    pub total_invalidated: u64,
    pub failed_attempts: u64,
    pub by_rule: HashMap<String, u64>,
    pub by_strategy: StrategyCounts,
}

/// A deferred invalidation awaiting the next sweep tick.
#[derive(Debug, Clone)]
struct PendingInvalidation {
    prefix: String,
    managers: Vec<String>,
    reason: Option<String>,
}

// == Invalidation Engine ==
/// Owns the rule list, the dependency graph, and the deferred queue.
///
/// The dependency graph is an explicit adjacency structure
/// (key -> dependent keys) maintained here, so the cascade is cycle-safe
/// and each reachable key is invalidated at most once per cascade.
pub struct InvalidationEngine {
    managers: HashMap<String, SharedStore>,
    /// Rules kept sorted by descending priority
    rules: Vec<InvalidationRule>,
    /// key -> keys that must be invalidated when it changes
    dependents: HashMap<String, HashSet<String>>,
    pending: Vec<PendingInvalidation>,
    stats: InvalidationStats,
}

impl InvalidationEngine {
    // == Constructor ==
    pub fn new() -> Self {
        Self {
            managers: HashMap::new(),
            rules: Vec::new(),
            dependents: HashMap::new(),
            pending: Vec::new(),
            stats: InvalidationStats::default(),
        }
    }

    // == Manager Registry ==
    /// Associates a named store for invalidation targeting.
    pub fn register_manager(&mut self, name: impl Into<String>, store: SharedStore) {
        let name = name.into();
        debug!(manager = %name, "registered store with invalidation engine");
        self.managers.insert(name, store);
    }

    // == Add Rule ==
    /// Registers a rule, keeping the list sorted by descending priority
    /// (stable among equal priorities).
    pub fn add_rule(&mut self, rule: InvalidationRule) {
        let position = self
            .rules
            .iter()
            .position(|existing| existing.priority < rule.priority)
            .unwrap_or(self.rules.len());
        info!(rule = %rule.name, strategy = rule.strategy.as_str(), "invalidation rule added");
        self.rules.insert(position, rule);
    }

    /// Number of registered rules.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    // == Invalidate Pattern ==
    /// Scans every registered store and removes keys matching the
    /// pattern. Returns the number of entries removed.
    pub async fn invalidate_pattern(
        &mut self,
        pattern: &KeyPattern,
        reason: Option<&str>,
    ) -> usize {
        let mut removed = 0;

        for store in self.managers.values() {
            let mut guard = store.write().await;
            let matches: Vec<String> = guard
                .keys()
                .into_iter()
                .filter(|key| pattern.matches(key))
                .collect();

            for key in matches {
                if guard.delete(&key) {
                    removed += 1;
                }
            }
        }

        self.stats.total_invalidated += removed as u64;
        self.stats.by_strategy.immediate += removed as u64;
        info!(
            pattern = %pattern,
            removed,
            reason = reason.unwrap_or("unspecified"),
            "pattern invalidation"
        );
        removed
    }

    // == Dependency Graph ==
    /// Records that `dependent` must be invalidated whenever `key` is.
    pub fn register_dependency(&mut self, key: &str, dependent: &str) {
        self.dependents
            .entry(key.to_string())
            .or_default()
            .insert(dependent.to_string());
    }

    /// Invalidates everything reachable from `key` in the dependency
    /// graph. Breadth-first with a visited set, so cycles terminate and
    /// each key is invalidated at most once per cascade.
    ///
    /// The root key itself is not removed here; the caller already
    /// deleted it.
    pub async fn invalidate_dependencies(&mut self, key: &str) -> usize {
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(key.to_string());

        let mut queue: VecDeque<String> = self
            .dependents
            .get(key)
            .map(|deps| deps.iter().cloned().collect())
            .unwrap_or_default();

        let mut removed = 0;

        while let Some(dependent) = queue.pop_front() {
            if !visited.insert(dependent.clone()) {
                continue;
            }

            for store in self.managers.values() {
                let mut guard = store.write().await;
                if guard.delete(&dependent) {
                    removed += 1;
                }
            }

            if let Some(next) = self.dependents.get(&dependent) {
                queue.extend(next.iter().cloned());
            }
        }

        // Edges out of cascaded keys are spent
        for gone in visited.iter().filter(|k| k.as_str() != key) {
            self.dependents.remove(gone);
        }
        self.dependents.remove(key);

        self.stats.total_invalidated += removed as u64;
        self.stats.by_strategy.dependency += removed as u64;
        if removed > 0 {
            info!(key, removed, "dependency cascade invalidation");
        }
        removed
    }

    // == Trigger ==
    /// Applies matching enabled rules to an invalidation event, in
    /// descending priority order.
    ///
    /// The event key (e.g. "user:123" after a user record change) is
    /// used as a removal prefix so only entries under that key are
    /// affected. Dependency-based rules never fire here.
    ///
    /// Returns the number of entries removed or flagged.
    pub async fn trigger(&mut self, event_key: &str, reason: Option<&str>) -> usize {
        let matching: Vec<InvalidationRule> = self
            .rules
            .iter()
            .filter(|rule| {
                rule.enabled
                    && rule.strategy != InvalidationStrategy::DependencyBased
                    && rule.pattern.matches(event_key)
            })
            .cloned()
            .collect();

        let mut affected = 0;

        for rule in matching {
            let mut rule_affected = 0u64;

            for manager in &rule.managers {
                let Some(store) = self.managers.get(manager) else {
                    warn!(rule = %rule.name, manager = %manager, "invalidation against unknown manager");
                    self.stats.failed_attempts += 1;
                    continue;
                };

                match rule.strategy {
                    InvalidationStrategy::Immediate => {
                        let mut guard = store.write().await;
                        let keys: Vec<String> = guard
                            .keys()
                            .into_iter()
                            .filter(|k| k.starts_with(event_key))
                            .collect();
                        for key in keys {
                            if guard.delete(&key) {
                                rule_affected += 1;
                                self.stats.by_strategy.immediate += 1;
                            }
                        }
                    }
                    InvalidationStrategy::Lazy => {
                        let mut guard = store.write().await;
                        let keys: Vec<String> = guard
                            .keys()
                            .into_iter()
                            .filter(|k| k.starts_with(event_key))
                            .collect();
                        for key in keys {
                            if guard.mark_stale(&key) {
                                rule_affected += 1;
                                self.stats.by_strategy.lazy += 1;
                            }
                        }
                    }
                    InvalidationStrategy::Scheduled => {
                        self.pending.push(PendingInvalidation {
                            prefix: event_key.to_string(),
                            managers: vec![manager.clone()],
                            reason: reason.map(String::from),
                        });
                        self.stats.by_strategy.scheduled += 1;
                    }
                    InvalidationStrategy::DependencyBased => unreachable!("filtered above"),
                }
            }

            if rule_affected > 0 {
                *self.stats.by_rule.entry(rule.name.clone()).or_default() += rule_affected;
                self.stats.total_invalidated += rule_affected;
                affected += rule_affected as usize;
            }

            debug!(
                rule = %rule.name,
                event = event_key,
                affected = rule_affected,
                reason = reason.unwrap_or("unspecified"),
                "invalidation rule applied"
            );
        }

        affected
    }

    // == Scheduled Sweep ==
    /// Applies deferred invalidations queued by scheduled rules.
    /// Returns the number of entries removed.
    pub async fn run_scheduled_sweep(&mut self) -> usize {
        let pending = std::mem::take(&mut self.pending);
        if pending.is_empty() {
            return 0;
        }

        let mut removed = 0;

        for item in pending {
            for manager in &item.managers {
                let Some(store) = self.managers.get(manager) else {
                    self.stats.failed_attempts += 1;
                    continue;
                };

                let mut guard = store.write().await;
                let keys: Vec<String> = guard
                    .keys()
                    .into_iter()
                    .filter(|k| k.starts_with(&item.prefix))
                    .collect();
                for key in keys {
                    if guard.delete(&key) {
                        removed += 1;
                    }
                }
            }

            debug!(
                prefix = %item.prefix,
                reason = item.reason.as_deref().unwrap_or("unspecified"),
                "deferred invalidation applied"
            );
        }

        self.stats.total_invalidated += removed as u64;
        removed
    }

    /// Number of deferred invalidations waiting for the next sweep.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    // == Stats ==
    /// Returns a snapshot of invalidation counters.
    pub fn stats(&self) -> InvalidationStats {
        self.stats.clone()
    }
}

impl Default for InvalidationEngine {
    fn default() -> Self {
        Self::new()
    }
}
