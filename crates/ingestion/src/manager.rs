//! Ingestion Manager - storage lifecycle, work queue and consumers

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use contracts::{IngestConfig, Item, SourceError};
use dispatcher::{BackendRegistry, CompositeDispatcher};
use observability::{record_backend_status, record_reset};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use crate::consumer::ConsumerPool;
use crate::error::{IngestionError, Result};
use crate::handler::{IntakeHandle, ItemHandler};
use crate::health::{refresh_status, spawn_health_monitor, WorkingStatus};
use crate::queue::{QueueStats, WorkQueue};
use crate::stats::spawn_reporter;

/// Point-in-time counters of the pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestionSnapshot {
    /// Entries accepted at intake
    pub accepted: u64,
    /// Entries processed by consumers
    pub delivered: u64,
    /// Entries rejected by the queue limit
    pub dropped: u64,
    /// Entries lost to consumers aborted at shutdown
    pub abandoned: u64,
    /// Entries waiting
    pub queued: usize,
}

impl From<QueueStats> for IngestionSnapshot {
    fn from(stats: QueueStats) -> Self {
        Self {
            accepted: stats.accepted,
            delivered: stats.completed,
            dropped: stats.dropped,
            abandoned: stats.abandoned,
            queued: stats.queued,
        }
    }
}

/// Owns the work queue, the consumer pool and the storage layer
///
/// Producers use [`IngestionManager::handle`] (or the manager itself) to
/// push items; lifecycle calls need exclusive access.
pub struct IngestionManager {
    config: IngestConfig,
    registry: Arc<BackendRegistry>,
    queue: Arc<WorkQueue>,
    dispatcher: Arc<CompositeDispatcher>,
    working_status: WorkingStatus,
    consumers: Option<ConsumerPool>,
    /// Backends were closed by `stop` and must be rebuilt before dispatching
    storage_closed: bool,
    reporter: Option<JoinHandle<()>>,
    health_monitor: Option<JoinHandle<()>>,
}

impl IngestionManager {
    /// Build the storage layer from `config`
    ///
    /// Every backend is resolved and opened; failures are recorded as
    /// not working and never abort the others.
    #[instrument(
        name = "ingestion_manager_initialize",
        skip(config, registry),
        fields(backends = config.backends.len())
    )]
    pub async fn initialize(config: IngestConfig, registry: Arc<BackendRegistry>) -> Self {
        let queue = Arc::new(WorkQueue::with_capacity_limit(config.manager.max_queue_len));
        let (dispatcher, status) = build_storage(&config, &registry).await;

        Self {
            config,
            registry,
            queue,
            dispatcher: Arc::new(dispatcher),
            working_status: Arc::new(RwLock::new(status)),
            consumers: None,
            storage_closed: false,
            reporter: None,
            health_monitor: None,
        }
    }

    /// Launch the statistics reporter and the consumers
    ///
    /// After a `stop`, the storage layer is rebuilt first so queued entries
    /// reach live backends.
    #[instrument(name = "ingestion_manager_start", skip(self))]
    pub async fn start(&mut self) -> Result<()> {
        if self.consumers.is_some() {
            return Err(IngestionError::AlreadyRunning);
        }
        if self.storage_closed {
            self.rebuild_storage().await;
        }

        if self.reporter.is_none() {
            self.reporter = Some(spawn_reporter(
                self.queue.clone(),
                self.config.manager.stats_interval(),
            ));
        }
        self.start_consumers();
        Ok(())
    }

    fn start_consumers(&mut self) {
        let settings = &self.config.manager;
        self.consumers = Some(ConsumerPool::spawn(
            settings.consumers,
            self.queue.clone(),
            self.dispatcher.clone(),
            settings.idle_wait(),
        ));

        if let Some(interval) = settings.health_check_interval() {
            self.health_monitor = Some(spawn_health_monitor(
                self.dispatcher.clone(),
                self.working_status.clone(),
                interval,
            ));
        }
    }

    pub fn is_running(&self) -> bool {
        self.consumers.is_some()
    }

    /// Stop consumers after their current entry, then close the backends
    ///
    /// Waits at most `shutdown_timeout` for the consumers. Queued entries
    /// stay in the queue.
    #[instrument(name = "ingestion_manager_stop", skip(self))]
    pub async fn stop(&mut self) {
        if let Some(monitor) = self.health_monitor.take() {
            monitor.abort();
        }
        if let Some(consumers) = self.consumers.take() {
            consumers.join(self.config.manager.shutdown_timeout()).await;
        }
        self.dispatcher.close().await;
        self.storage_closed = true;
        info!(queued = self.queue.len(), "Ingestion stopped");
    }

    /// Stop, rebuild every backend from the original configuration, and
    /// resume consuming if the manager was running
    ///
    /// Pending queue entries are kept.
    #[instrument(name = "ingestion_manager_reset", skip(self))]
    pub async fn reset(&mut self) {
        let was_running = self.is_running();
        self.stop().await;
        self.rebuild_storage().await;
        record_reset();

        if was_running {
            self.start_consumers();
        }
        info!(queued = self.queue.len(), was_running, "Storage layer reset");
    }

    async fn rebuild_storage(&mut self) {
        let (dispatcher, status) = build_storage(&self.config, &self.registry).await;
        self.dispatcher = Arc::new(dispatcher);
        *self
            .working_status
            .write()
            .unwrap_or_else(PoisonError::into_inner) = status;
        self.storage_closed = false;
    }

    /// Producer handle onto the work queue
    pub fn handle(&self) -> IntakeHandle {
        IntakeHandle::new(self.queue.clone())
    }

    pub fn intake(&self, item: impl Into<Option<Item>>) {
        self.handle().intake(item);
    }

    pub fn intake_batch(&self, items: impl IntoIterator<Item = Item>) {
        self.handle().intake_batch(items);
    }

    pub fn notify_delete(&self, item: &Item) {
        self.handle().notify_delete(item);
    }

    pub fn notify_error(&self, error: &SourceError) {
        self.handle().notify_error(error);
    }

    /// Last known liveness per backend id
    pub fn working_backends(&self) -> BTreeMap<String, bool> {
        self.working_status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Probe every backend now and refresh the working status
    ///
    /// Returns whether any backend is alive.
    pub async fn check_backends(&self) -> bool {
        refresh_status(&self.dispatcher, &self.working_status).await
    }

    /// Wait until every accepted entry has been processed
    ///
    /// Returns `false` if `timeout` elapsed first.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let poll = self.config.manager.idle_wait();

        while !self.queue.is_drained() {
            if Instant::now() >= deadline {
                warn!(queued = self.queue.len(), "Drain timed out");
                return false;
            }
            tokio::time::sleep(poll).await;
        }
        true
    }

    pub fn snapshot(&self) -> IngestionSnapshot {
        self.queue.stats().into()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Current storage layer (replaced on reset)
    pub fn dispatcher(&self) -> &Arc<CompositeDispatcher> {
        &self.dispatcher
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }
}

impl ItemHandler for IngestionManager {
    fn intake(&self, item: Option<Item>) {
        IngestionManager::intake(self, item);
    }

    fn intake_batch(&self, items: Vec<Item>) {
        IngestionManager::intake_batch(self, items);
    }

    fn notify_delete(&self, item: &Item) {
        IngestionManager::notify_delete(self, item);
    }

    fn notify_error(&self, error: &SourceError) {
        IngestionManager::notify_error(self, error);
    }
}

impl Drop for IngestionManager {
    fn drop(&mut self) {
        for task in [self.reporter.take(), self.health_monitor.take()]
            .into_iter()
            .flatten()
        {
            task.abort();
        }
    }
}

async fn build_storage(
    config: &IngestConfig,
    registry: &BackendRegistry,
) -> (CompositeDispatcher, BTreeMap<String, bool>) {
    let (dispatcher, failed) = CompositeDispatcher::from_configs(&config.backends, registry);

    let mut status = BTreeMap::new();
    for (id, _) in failed {
        record_backend_status(&id, false);
        status.insert(id, false);
    }
    for (id, opened) in dispatcher.open_all().await {
        if !opened {
            warn!(backend = %id, "Backend is not working");
        }
        status.insert(id, opened);
    }

    info!(
        registered = dispatcher.len(),
        working = status.values().filter(|alive| **alive).count(),
        "Storage layer initialised"
    );
    (dispatcher, status)
}
