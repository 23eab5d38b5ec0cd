//! Service Module
//!
//! The facade and its supporting pieces: operation envelopes, the store
//! registry, and the singleflight gate map.

mod envelope;
mod facade;
mod registry;
mod singleflight;

// Re-export public types
pub use envelope::{CacheResponse, CacheStatsReport};
pub use facade::CacheService;
pub use registry::CacheRegistry;
pub use singleflight::Singleflight;
