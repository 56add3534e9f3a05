//! Consumer pool draining the work queue into the dispatcher

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dispatcher::CompositeDispatcher;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::queue::{InFlight, WorkItem, WorkQueue};

/// Fixed set of consumer tasks sharing one queue
///
/// Each consumer keeps FIFO order for what it takes; with several consumers
/// the global dispatch order is not preserved.
pub struct ConsumerPool {
    stop: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl ConsumerPool {
    /// Spawn `count` consumers onto the current runtime
    #[instrument(name = "consumer_pool_spawn", skip(queue, dispatcher))]
    pub fn spawn(
        count: usize,
        queue: Arc<WorkQueue>,
        dispatcher: Arc<CompositeDispatcher>,
        idle_wait: Duration,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let handles = (0..count)
            .map(|worker| {
                tokio::spawn(consume(
                    worker,
                    queue.clone(),
                    dispatcher.clone(),
                    idle_wait,
                    stop.clone(),
                ))
            })
            .collect();

        info!(consumers = count, "Consumers started");
        Self { stop, handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Ask every consumer to exit after its current entry
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Stop and wait up to `timeout` for the consumers
    ///
    /// Consumers still running at the deadline are aborted; returns how many.
    /// The entry an aborted consumer was dispatching is counted as abandoned
    /// before this returns.
    #[instrument(name = "consumer_pool_join", skip(self))]
    pub async fn join(mut self, timeout: Duration) -> usize {
        self.request_stop();
        let deadline = Instant::now() + timeout;
        let mut aborted = 0;

        for mut handle in std::mem::take(&mut self.handles) {
            if tokio::time::timeout_at(deadline, &mut handle).await.is_err() {
                handle.abort();
                // resolves once the task future has been dropped
                let _ = handle.await;
                aborted += 1;
            }
        }

        if aborted > 0 {
            warn!(aborted, "Consumers did not stop in time and were aborted");
        } else {
            debug!("All consumers stopped");
        }
        aborted
    }
}

impl Drop for ConsumerPool {
    fn drop(&mut self) {
        self.request_stop();
        for handle in &self.handles {
            handle.abort();
        }
    }
}

async fn consume(
    worker: usize,
    queue: Arc<WorkQueue>,
    dispatcher: Arc<CompositeDispatcher>,
    idle_wait: Duration,
    stop: Arc<AtomicBool>,
) {
    debug!(worker, "Consumer started");

    while let Some(entry) = queue.dequeue_blocking(idle_wait, &stop).await {
        let in_flight = InFlight::new(&queue);
        match entry {
            WorkItem::Store(item) => {
                if let Err(e) = dispatcher.store(&item).await {
                    warn!(worker, item_id = %item.id, error = %e, "Dispatch failed");
                }
            }
            WorkItem::Delete(item_id) => {
                if let Err(e) = dispatcher.delete(&item_id).await {
                    warn!(worker, item_id = %item_id, error = %e, "Delete failed");
                }
            }
        }
        in_flight.finish();
    }

    debug!(worker, "Consumer stopped");
}
