//! Producer-facing intake API

use std::sync::Arc;

use contracts::{Item, SourceError};
use tracing::{debug, error};

use crate::queue::{WorkItem, WorkQueue};

/// Receiver of producer output
///
/// Implemented by the ingestion manager and by its cloneable [`IntakeHandle`].
pub trait ItemHandler: Send + Sync {
    /// Accept one item; `None` is ignored
    fn intake(&self, item: Option<Item>);

    /// Accept items in order
    fn intake_batch(&self, items: Vec<Item>);

    /// Request deletion of a previously accepted item
    fn notify_delete(&self, item: &Item);

    /// Report a producer-side failure
    fn notify_error(&self, error: &SourceError);
}

/// Cheap, cloneable producer handle onto the work queue
#[derive(Debug, Clone)]
pub struct IntakeHandle {
    queue: Arc<WorkQueue>,
}

impl IntakeHandle {
    pub(crate) fn new(queue: Arc<WorkQueue>) -> Self {
        Self { queue }
    }

    pub fn intake(&self, item: impl Into<Option<Item>>) {
        if let Some(item) = item.into() {
            self.queue.enqueue(WorkItem::Store(item));
        }
    }

    pub fn intake_batch(&self, items: impl IntoIterator<Item = Item>) {
        self.queue
            .enqueue_batch(items.into_iter().map(WorkItem::Store));
    }

    pub fn notify_delete(&self, item: &Item) {
        debug!(item_id = %item.id, "Delete requested");
        self.queue.enqueue(WorkItem::Delete(item.id.clone()));
    }

    pub fn notify_error(&self, error: &SourceError) {
        match &error.cause {
            Some(cause) => error!(
                source_name = %error.source_name,
                message = %error.message,
                cause = %cause,
                "Content source error"
            ),
            None => error!(
                source_name = %error.source_name,
                message = %error.message,
                "Content source error"
            ),
        }
    }
}

impl ItemHandler for IntakeHandle {
    fn intake(&self, item: Option<Item>) {
        IntakeHandle::intake(self, item);
    }

    fn intake_batch(&self, items: Vec<Item>) {
        IntakeHandle::intake_batch(self, items);
    }

    fn notify_delete(&self, item: &Item) {
        IntakeHandle::notify_delete(self, item);
    }

    fn notify_error(&self, error: &SourceError) {
        IntakeHandle::notify_error(self, error);
    }
}
