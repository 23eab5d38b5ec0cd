//! Warming Module
//!
//! Proactive cache population driven by rules, schedules, and access
//! history.

mod engine;
mod history;
mod rule;

// Re-export public types
pub use engine::{JobId, JobRecord, SharedWarmingEngine, WarmingEngine, WarmingStats};
pub use history::{AccessHistory, MAX_SAMPLES_PER_KEY};
pub use rule::{
    loader_fn, BoxFuture, DataLoader, WarmingPriority, WarmingRule, WarmingSchedule,
    WarmingStrategy,
};
