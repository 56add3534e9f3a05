//! StorageBackend trait - Dispatcher output interface
//!
//! Defines the capability contract every storage/publication adapter implements.

use async_trait::async_trait;

use crate::{ContractError, Item};

/// Storage adapter trait
///
/// Adapters are shared between consumer tasks behind an `Arc`, so every
/// method takes `&self`; an adapter guards its own connection handle.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Backend name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Establish the connection
    ///
    /// Returns whether the backend is usable; never fails.
    async fn open(&self) -> bool;

    /// Store one item
    ///
    /// # Errors
    /// Returns a transport error (should include context)
    async fn store(&self, item: &Item) -> Result<(), ContractError>;

    /// Delete a previously stored item
    ///
    /// Returns `false` when the backend does not support deletion.
    async fn delete(&self, _item_id: &str) -> Result<bool, ContractError> {
        Ok(false)
    }

    /// Best-effort disconnect
    async fn close(&self);

    /// Probe liveness, reconnecting once if the probe fails
    async fn check_status(&self) -> bool;

    /// Lifetime delivery counters
    fn delivered(&self) -> DeliveryCounts {
        DeliveryCounts::default()
    }
}

/// Records forwarded by a backend, per category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryCounts {
    pub items: u64,
    pub media_items: u64,
    pub web_pages: u64,
}

impl DeliveryCounts {
    pub fn total(&self) -> u64 {
        self.items + self.media_items + self.web_pages
    }
}
