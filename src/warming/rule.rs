//! Warming Rule Module
//!
//! Rule and loader types for proactive cache population.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::config::DEFAULT_STORE_NAME;
use crate::invalidation::KeyPattern;
use crate::store::CacheValue;

/// Boxed future alias used by loader functions.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Asynchronous factory producing the value for a key.
///
/// The cache core has no knowledge of what the loader does; it only
/// awaits the result and stores it.
pub type DataLoader = Arc<dyn Fn(String) -> BoxFuture<anyhow::Result<CacheValue>> + Send + Sync>;

/// Wraps an async closure into a [`DataLoader`].
pub fn loader_fn<F, Fut>(f: F) -> DataLoader
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<CacheValue>> + Send + 'static,
{
    Arc::new(move |key| Box::pin(f(key)))
}

// == Warming Strategy ==
/// How a rule decides what to warm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WarmingStrategy {
    /// Warm the rule's seed keys as soon as (and whenever) it runs
    Eager,
    /// Warm the top-ranked keys from access history matching the pattern
    Predictive,
    /// Warm seed keys on the configured interval only
    Scheduled,
}

// == Warming Priority ==
/// Job priority, carried into job records for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WarmingPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl Default for WarmingPriority {
    fn default() -> Self {
        WarmingPriority::Medium
    }
}

// == Warming Schedule ==
/// When a rule runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct WarmingSchedule {
    /// Run once at registration
    pub immediate: bool,
    /// Re-run on this cadence (single timer per rule, non-re-entrant)
    pub interval: Option<Duration>,
}

impl WarmingSchedule {
    pub fn immediate() -> Self {
        Self {
            immediate: true,
            interval: None,
        }
    }

    pub fn every(interval: Duration) -> Self {
        Self {
            immediate: false,
            interval: Some(interval),
        }
    }

    pub fn immediate_then_every(interval: Duration) -> Self {
        Self {
            immediate: true,
            interval: Some(interval),
        }
    }
}

// == Warming Rule ==
/// A named warming rule with its loader and batch parameters.
#[derive(Clone)]
pub struct WarmingRule {
    pub name: String,
    pub strategy: WarmingStrategy,
    pub priority: WarmingPriority,
    /// Keys this rule covers; predictive candidates are filtered by it
    pub pattern: KeyPattern,
    /// Produces the value for each warmed key
    pub loader: DataLoader,
    /// Explicit keys for eager/scheduled runs
    pub seed_keys: Vec<String>,
    pub schedule: WarmingSchedule,
    /// Upper bound on keys warmed per run
    pub batch_size: usize,
    /// In-flight loader calls per job
    pub max_concurrency: usize,
    /// Retries per key after the first failed attempt
    pub retry_attempts: u32,
    /// Delay between retries
    pub retry_delay: Duration,
    pub enabled: bool,
    /// Store this rule populates
    pub manager: String,
}

impl WarmingRule {
    /// Creates an enabled rule against the primary store with default
    /// batch parameters.
    pub fn new(
        name: impl Into<String>,
        strategy: WarmingStrategy,
        pattern: KeyPattern,
        loader: DataLoader,
    ) -> Self {
        Self {
            name: name.into(),
            strategy,
            priority: WarmingPriority::default(),
            pattern,
            loader,
            seed_keys: Vec::new(),
            schedule: WarmingSchedule::default(),
            batch_size: 32,
            max_concurrency: 4,
            retry_attempts: 2,
            retry_delay: Duration::from_millis(100),
            enabled: true,
            manager: DEFAULT_STORE_NAME.to_string(),
        }
    }

    pub fn with_priority(mut self, priority: WarmingPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_seed_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.seed_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_schedule(mut self, schedule: WarmingSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_retries(mut self, attempts: u32, delay: Duration) -> Self {
        self.retry_attempts = attempts;
        self.retry_delay = delay;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

impl fmt::Debug for WarmingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarmingRule")
            .field("name", &self.name)
            .field("strategy", &self.strategy)
            .field("priority", &self.priority)
            .field("pattern", &self.pattern)
            .field("seed_keys", &self.seed_keys)
            .field("schedule", &self.schedule)
            .field("batch_size", &self.batch_size)
            .field("max_concurrency", &self.max_concurrency)
            .field("enabled", &self.enabled)
            .field("manager", &self.manager)
            .finish_non_exhaustive()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rule_defaults() {
        let rule = WarmingRule::new(
            "popular-quizzes",
            WarmingStrategy::Eager,
            KeyPattern::prefix("quiz:"),
            loader_fn(|_key| async { Ok(json!("quiz")) }),
        );

        assert_eq!(rule.priority, WarmingPriority::Medium);
        assert_eq!(rule.manager, "main");
        assert_eq!(rule.max_concurrency, 4);
        assert!(rule.enabled);
        assert!(!rule.schedule.immediate);
        assert!(rule.schedule.interval.is_none());
    }

    #[test]
    fn test_schedule_helpers() {
        let schedule = WarmingSchedule::immediate_then_every(Duration::from_secs(60));
        assert!(schedule.immediate);
        assert_eq!(schedule.interval, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_priority_ordering() {
        assert!(WarmingPriority::Critical > WarmingPriority::High);
        assert!(WarmingPriority::Medium > WarmingPriority::Low);
    }

    #[tokio::test]
    async fn test_loader_fn_invokes_closure() {
        let loader = loader_fn(|key| async move { Ok(json!(format!("value-for-{}", key))) });
        let value = loader("abc".to_string()).await.unwrap();
        assert_eq!(value, json!("value-for-abc"));
    }
}
