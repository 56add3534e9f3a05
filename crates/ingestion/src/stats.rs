//! Periodic statistics reporter
//!
//! Rates are computed over *processed* entries: everything a consumer took off
//! the queue and finished, including deletes, filtered updates and fan-outs
//! that failed on every backend. Per-backend delivery lives in
//! `CompositeDispatcher::delivered`.

use std::sync::Arc;
use std::time::Duration;

use observability::{record_queue_depth, ThroughputTracker};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::info;

use crate::queue::WorkQueue;

/// One reporter interval
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct IntervalReport {
    pub queued: usize,
    /// Entries finished during the interval
    pub processed: u64,
    pub window_rate: f64,
    pub mean_rate: f64,
    pub dropped: u64,
    pub abandoned: u64,
}

impl IntervalReport {
    pub(crate) fn collect(queue: &WorkQueue, tracker: &mut ThroughputTracker, window: Duration) -> Self {
        let stats = queue.stats();
        let sample = tracker.sample(stats.completed, window);
        Self {
            queued: stats.queued,
            processed: sample.window_count,
            window_rate: sample.window_rate,
            mean_rate: sample.mean_rate,
            dropped: stats.dropped,
            abandoned: stats.abandoned,
        }
    }
}

/// Spawn the reporter; it logs queue depth and processing rates every `interval`
pub fn spawn_reporter(queue: Arc<WorkQueue>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tracker = ThroughputTracker::new(queue.stats().completed);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // interval fires immediately once
        ticker.tick().await;
        let mut last = Instant::now();

        loop {
            ticker.tick().await;
            let now = Instant::now();
            let report = IntervalReport::collect(&queue, &mut tracker, now - last);
            last = now;

            record_queue_depth(report.queued);
            info!(
                queued = report.queued,
                processed = report.processed,
                window_rate = report.window_rate,
                mean_rate = report.mean_rate,
                dropped = report.dropped,
                abandoned = report.abandoned,
                "Ingestion statistics"
            );
        }
    })
}
