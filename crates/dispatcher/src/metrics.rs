//! Backend metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

use contracts::DeliveryCounts;
use observability::{record_backend_published, RecordCategory};

/// Lifetime counters for a single backend
///
/// Relaxed atomics: read by reporters only, never used for control flow.
#[derive(Debug, Default)]
pub struct BackendMetrics {
    /// Items forwarded
    items: AtomicU64,
    /// Media items forwarded
    media_items: AtomicU64,
    /// Web pages forwarded
    web_pages: AtomicU64,
    /// Failed store calls
    failures: AtomicU64,
}

impl BackendMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one forwarded record and mirror it to the metrics recorder
    pub fn record_published(&self, backend: &str, category: RecordCategory) {
        let counter = match category {
            RecordCategory::Item => &self.items,
            RecordCategory::MediaItem => &self.media_items,
            RecordCategory::WebPage => &self.web_pages,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        record_backend_published(backend, category);
    }

    /// Increment failure count
    pub fn inc_failure_count(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get failure count
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Get snapshot of delivery counters
    pub fn snapshot(&self) -> DeliveryCounts {
        DeliveryCounts {
            items: self.items.load(Ordering::Relaxed),
            media_items: self.media_items.load(Ordering::Relaxed),
            web_pages: self.web_pages.load(Ordering::Relaxed),
        }
    }
}
