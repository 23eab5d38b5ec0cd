//! Operation Envelope Module
//!
//! Outcome DTOs returned by the facade: per-operation envelopes and the
//! aggregated stats report.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::invalidation::InvalidationStats;
use crate::store::{CacheValue, StoreStats};
use crate::warming::WarmingStats;

// == Cache Response ==
/// Uniform envelope wrapping every facade operation outcome.
#[derive(Debug, Clone, Serialize)]
pub struct CacheResponse {
    /// Whether the operation itself completed without internal failure
    pub success: bool,
    /// The payload (value on get, boolean on set/delete)
    pub data: Option<CacheValue>,
    /// Whether the data came out of the cache
    pub from_cache: bool,
    /// The normalized key the operation acted on
    pub cache_key: String,
    /// Wall-clock duration of the operation in milliseconds
    pub execution_time_ms: f64,
    /// Captured internal error, if any
    pub error: Option<String>,
}

impl CacheResponse {
    /// A hit carrying a cached value.
    pub fn hit(key: impl Into<String>, value: CacheValue, elapsed_ms: f64) -> Self {
        Self {
            success: true,
            data: Some(value),
            from_cache: true,
            cache_key: key.into(),
            execution_time_ms: elapsed_ms,
            error: None,
        }
    }

    /// A miss; not an error.
    pub fn miss(key: impl Into<String>, elapsed_ms: f64) -> Self {
        Self {
            success: true,
            data: None,
            from_cache: false,
            cache_key: key.into(),
            execution_time_ms: elapsed_ms,
            error: None,
        }
    }

    /// A successful non-read operation, or a fresh value produced by a
    /// factory (`from_cache` stays false).
    pub fn ok(key: impl Into<String>, data: CacheValue, elapsed_ms: f64) -> Self {
        Self {
            success: true,
            data: Some(data),
            from_cache: false,
            cache_key: key.into(),
            execution_time_ms: elapsed_ms,
            error: None,
        }
    }

    /// An internal failure captured into the envelope.
    pub fn failed(key: impl Into<String>, error: impl ToString, elapsed_ms: f64) -> Self {
        Self {
            success: false,
            data: None,
            from_cache: false,
            cache_key: key.into(),
            execution_time_ms: elapsed_ms,
            error: Some(error.to_string()),
        }
    }
}

// == Stats Report ==
/// Aggregated statistics across the store and both engines, with
/// derived recommendations.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsReport {
    pub store: StoreStats,
    pub invalidation: Option<InvalidationStats>,
    pub warming: Option<WarmingStats>,
    pub recommendations: Vec<String>,
    pub generated_at: DateTime<Utc>,
}
