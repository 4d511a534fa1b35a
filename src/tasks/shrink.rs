//! Overflow Shrink Task
//!
//! Background task that periodically pays back cache overflow.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::DocumentCache;

/// Spawns a background task that periodically shrinks an overflowing cache.
///
/// Documents kept alive past the limit (because they were pinned) only leave
/// when a later put or shrink finds them unpinned. This task provides the
/// shrink so overflow does not linger on an idle server.
///
/// # Arguments
/// * `cache` - shared reference to the document cache
/// * `shrink_interval_secs` - Interval in seconds between shrink runs
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
pub fn spawn_shrink_task(cache: Arc<DocumentCache>, shrink_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(shrink_interval_secs);

    tokio::spawn(async move {
        info!(
            "Starting overflow shrink task with interval of {} seconds",
            shrink_interval_secs
        );

        loop {
            // Sleep for the configured interval
            tokio::time::sleep(interval).await;

            let before = cache.overflow();
            if before == 0 {
                debug!("Overflow shrink: cache within its limit");
                continue;
            }

            match cache.shrink() {
                Ok(true) => info!("Overflow shrink: reclaimed {} units of overflow", before),
                Ok(false) => debug!(
                    "Overflow shrink: still {} units over the limit",
                    cache.overflow()
                ),
                Err(err) => warn!("Overflow shrink failed: {}", err),
            }
        }
    })
}
