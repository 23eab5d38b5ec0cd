//! Background Sweep Task
//!
//! Periodically removes dead (expired or stale) entries from the store
//! and applies deferred scheduled invalidations.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::invalidation::SharedInvalidationEngine;
use crate::store::SharedStore;

/// Spawns the background sweep task.
///
/// The task runs in an infinite loop, sleeping for the given interval
/// between sweeps. Each tick takes a write lock on the store to drop
/// dead entries, then runs the invalidation engine's scheduled sweep if
/// one is wired.
///
/// # Arguments
/// * `store` - Shared store to sweep
/// * `invalidation` - Optional engine whose deferred queue is drained
/// * `interval` - Time between sweep ticks
///
/// # Returns
/// A JoinHandle used to abort the task during shutdown.
pub fn spawn_sweep_task(
    store: SharedStore,
    invalidation: Option<SharedInvalidationEngine>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(?interval, "starting background sweep task");

        loop {
            tokio::time::sleep(interval).await;

            let removed = {
                let mut guard = store.write().await;
                guard.cleanup_expired()
            };

            let deferred = match &invalidation {
                Some(engine) => engine.lock().await.run_scheduled_sweep().await,
                None => 0,
            };

            if removed > 0 || deferred > 0 {
                info!(removed, deferred, "sweep removed dead entries");
            } else {
                debug!("sweep found nothing to remove");
            }
        }
    })
}
