//! Idle-entry eviction sweep
//!
//! Entries that go the full retention window without a request are removed.
//! Eviction is also applied lazily on access, so the background sweep only
//! bounds memory for locators nobody asks about anymore.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::service::LogoCacheService;

/// Outcome of one maintenance sweep
#[derive(Debug, Clone)]
pub struct MaintenanceStats {
    pub scanned: usize,
    pub evicted: usize,
    pub retained: usize,
    pub duration_ms: u64,
}

impl LogoCacheService {
    /// Sweep the cache, evicting entries idle past the retention window
    pub async fn run_maintenance(&self) -> MaintenanceStats {
        let start = std::time::Instant::now();
        let retention = self.config().retention;

        let mut cache = self.cache().write().await;
        let scanned = cache.len();
        cache.retain(|_, entry| !entry.is_idle_expired(retention));
        let retained = cache.len();
        drop(cache);

        let stats = MaintenanceStats {
            scanned,
            evicted: scanned - retained,
            retained,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        if stats.evicted > 0 {
            info!(
                "Logo cache maintenance completed: scanned={} evicted={} retained={} duration={}ms",
                stats.scanned, stats.evicted, stats.retained, stats.duration_ms
            );
        } else {
            debug!(
                "Logo cache maintenance completed: scanned={} nothing to evict",
                stats.scanned
            );
        }

        stats
    }

    /// Run the sweep on an interval in a background task.
    ///
    /// The returned handle aborts the task when dropped by the caller via
    /// `abort()`; the service itself keeps working without it.
    pub fn spawn_maintenance(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick completes immediately; skip the no-op sweep
            ticker.tick().await;
            loop {
                ticker.tick().await;
                service.run_maintenance().await;
            }
        })
    }
}
