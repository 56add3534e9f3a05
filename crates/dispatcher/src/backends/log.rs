//! LogBackend - logs item summaries via tracing

use async_trait::async_trait;
use contracts::{ContractError, DeliveryCounts, Item, StorageBackend};
use observability::RecordCategory;
use tracing::{info, instrument};

use crate::metrics::BackendMetrics;

/// Backend that logs item summaries for debugging
pub struct LogBackend {
    name: String,
    metrics: BackendMetrics,
}

impl LogBackend {
    /// Create a new LogBackend with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metrics: BackendMetrics::new(),
        }
    }

    fn log_item_summary(&self, item: &Item) {
        info!(
            backend = %self.name,
            item_id = %item.id,
            source = %item.source,
            media_items = item.media_items.len(),
            web_pages = item.web_pages.len(),
            "Item received"
        );
    }
}

#[async_trait]
impl StorageBackend for LogBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open(&self) -> bool {
        true
    }

    #[instrument(
        name = "log_backend_store",
        skip(self, item),
        fields(backend = %self.name, item_id = %item.id)
    )]
    async fn store(&self, item: &Item) -> Result<(), ContractError> {
        if item.is_original() {
            self.log_item_summary(item);
            self.metrics.record_published(&self.name, RecordCategory::Item);
        }
        Ok(())
    }

    #[instrument(name = "log_backend_close", skip(self))]
    async fn close(&self) {
        info!(backend = %self.name, "LogBackend closed");
    }

    async fn check_status(&self) -> bool {
        true
    }

    fn delivered(&self) -> DeliveryCounts {
        self.metrics.snapshot()
    }
}
