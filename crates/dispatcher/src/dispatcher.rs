//! CompositeDispatcher - fans items out to every registered backend

use std::sync::Arc;

use contracts::{BackendConfig, DeliveryCounts, Item, StorageBackend};
use observability::{record_backend_status, record_item_dispatched};
use tracing::{debug, error, info, instrument, warn};

use crate::error::DispatcherError;
use crate::registry::BackendRegistry;

/// Ordered set of backends behind one store interface
///
/// A failing backend never prevents later backends from receiving the item.
#[derive(Default)]
pub struct CompositeDispatcher {
    backends: Vec<(String, Arc<dyn StorageBackend>)>,
}

impl CompositeDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve every configured backend through `registry`
    ///
    /// Returns the dispatcher together with the configs that failed to
    /// resolve; those are left out of the fan-out.
    #[instrument(
        name = "dispatcher_from_configs",
        skip(configs, registry),
        fields(backend_count = configs.len())
    )]
    pub fn from_configs(
        configs: &[BackendConfig],
        registry: &BackendRegistry,
    ) -> (Self, Vec<(String, DispatcherError)>) {
        let mut dispatcher = Self::new();
        let mut failed = Vec::new();

        for config in configs {
            match registry.create(config) {
                Ok(backend) => dispatcher.register(config.id.clone(), backend),
                Err(e) => {
                    error!(backend = %config.id, error = %e, "Backend could not be created");
                    failed.push((config.id.clone(), e));
                }
            }
        }

        (dispatcher, failed)
    }

    /// Append a backend; registration order is fan-out order
    pub fn register(&mut self, id: impl Into<String>, backend: Arc<dyn StorageBackend>) {
        self.backends.push((id.into(), backend));
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Registered backend ids, in fan-out order
    pub fn backend_ids(&self) -> Vec<&str> {
        self.backends.iter().map(|(id, _)| id.as_str()).collect()
    }

    pub fn backend(&self, id: &str) -> Option<&Arc<dyn StorageBackend>> {
        self.backends
            .iter()
            .find(|(backend_id, _)| backend_id == id)
            .map(|(_, backend)| backend)
    }

    /// Open the backend registered as `id`
    ///
    /// Returns `false` for unknown ids.
    pub async fn open(&self, id: &str) -> bool {
        let Some(backend) = self.backend(id) else {
            warn!(backend = %id, "Open requested for unregistered backend");
            return false;
        };
        let opened = backend.open().await;
        record_backend_status(id, opened);
        opened
    }

    /// Open every backend, returning `(id, opened)` in order
    pub async fn open_all(&self) -> Vec<(String, bool)> {
        let mut results = Vec::with_capacity(self.backends.len());
        for (id, _) in &self.backends {
            results.push((id.clone(), self.open(id).await));
        }
        results
    }

    /// Store `item` in every backend
    ///
    /// Non-original items are skipped. Every backend is attempted; the error
    /// names the ones that failed.
    #[instrument(name = "dispatcher_store", skip(self, item), fields(item_id = %item.id))]
    pub async fn store(&self, item: &Item) -> Result<(), DispatcherError> {
        if !item.is_original() {
            debug!("Skipping non-original item");
            return Ok(());
        }

        let mut failed = Vec::new();
        for (id, backend) in &self.backends {
            match backend.store(item).await {
                Ok(()) => record_item_dispatched(id, true),
                Err(e) => {
                    error!(backend = %id, error = %e, "Store failed");
                    record_item_dispatched(id, false);
                    failed.push(id.clone());
                }
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(DispatcherError::PartialFanout {
                record_id: item.id.clone(),
                failed,
            })
        }
    }

    /// Delete `item_id` from every backend
    ///
    /// Returns how many backends confirmed the deletion.
    #[instrument(name = "dispatcher_delete", skip(self))]
    pub async fn delete(&self, item_id: &str) -> Result<usize, DispatcherError> {
        let mut deleted = 0;
        let mut failed = Vec::new();

        for (id, backend) in &self.backends {
            match backend.delete(item_id).await {
                Ok(true) => deleted += 1,
                Ok(false) => {}
                Err(e) => {
                    error!(backend = %id, error = %e, "Delete failed");
                    failed.push(id.clone());
                }
            }
        }

        if failed.is_empty() {
            Ok(deleted)
        } else {
            Err(DispatcherError::PartialFanout {
                record_id: item_id.to_string(),
                failed,
            })
        }
    }

    /// Close every backend
    #[instrument(name = "dispatcher_close", skip(self))]
    pub async fn close(&self) {
        for (_, backend) in &self.backends {
            backend.close().await;
        }
        info!(backends = self.backends.len(), "Backends closed");
    }

    /// Probe every backend, returning `(id, alive)` in order
    pub async fn check_status(&self) -> Vec<(String, bool)> {
        let mut results = Vec::with_capacity(self.backends.len());
        for (id, backend) in &self.backends {
            let alive = backend.check_status().await;
            record_backend_status(id, alive);
            results.push((id.clone(), alive));
        }
        results
    }

    /// Per-backend delivery counters
    pub fn delivered(&self) -> Vec<(String, DeliveryCounts)> {
        self.backends
            .iter()
            .map(|(id, backend)| (id.clone(), backend.delivered()))
            .collect()
    }
}
