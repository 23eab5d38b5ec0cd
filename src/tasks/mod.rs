//! Background Tasks Module
//!
//! Tasks that run periodically while the service is up.
//!
//! # Tasks
//! - Sweep: drops expired/stale entries and applies deferred
//!   invalidations at configured intervals

mod sweep;

pub use sweep::spawn_sweep_task;
