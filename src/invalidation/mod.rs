//! Invalidation Module
//!
//! Rule-based and dependency-based removal of stale cache entries.

mod engine;
mod rule;

// Re-export public types
pub use engine::{
    InvalidationEngine, InvalidationStats, SharedInvalidationEngine, StrategyCounts,
};
pub use rule::{InvalidationRule, InvalidationStrategy, KeyPattern};
