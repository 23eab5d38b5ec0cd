//! Error types for the cache service
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache service.
///
/// Cache misses are never errors; they are reported through the
/// operation envelope. Errors here cover configuration problems,
/// malformed inputs, and internal failures.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Invalid configuration detected at construction time
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid key or oversized value
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Malformed invalidation key pattern
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    /// Invalidation requested while the invalidation engine is disabled
    #[error("Invalidation is disabled for this service")]
    InvalidationDisabled,

    /// Warming requested while the warming engine is disabled
    #[error("Warming is disabled for this service")]
    WarmingDisabled,

    /// Operation referenced a cache manager name that was never registered
    #[error("Unknown cache manager: {0}")]
    UnknownManager(String),

    /// Internal service error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == Result Type Alias ==
/// Convenience Result type for the cache service.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CacheError::InvalidConfig("max_entries must be > 0".to_string());
        assert!(err.to_string().contains("max_entries"));

        let err = CacheError::WarmingDisabled;
        assert_eq!(err.to_string(), "Warming is disabled for this service");
    }
}
