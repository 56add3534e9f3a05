//! Periodic backend health monitor

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use dispatcher::CompositeDispatcher;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Backend id -> last known liveness
pub type WorkingStatus = Arc<RwLock<BTreeMap<String, bool>>>;

/// Probe every backend and refresh `status`
///
/// Returns whether any backend is alive.
pub async fn refresh_status(dispatcher: &CompositeDispatcher, status: &WorkingStatus) -> bool {
    let results = dispatcher.check_status().await;
    let mut map = status.write().unwrap_or_else(PoisonError::into_inner);
    for (id, alive) in results {
        map.insert(id, alive);
    }
    map.values().any(|alive| *alive)
}

/// Spawn the monitor; probes all backends every `interval`
pub fn spawn_health_monitor(
    dispatcher: Arc<CompositeDispatcher>,
    status: WorkingStatus,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if refresh_status(&dispatcher, &status).await {
                debug!("Backend health check passed");
            } else {
                warn!("No storage backend is alive; a reset may be required");
            }
        }
    })
}
