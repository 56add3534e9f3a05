//! Work queue shared by producers and consumers

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use contracts::Item;
use observability::{record_item_accepted, record_item_dropped};
use tracing::warn;

/// One unit of consumer work
#[derive(Debug, Clone, PartialEq)]
pub enum WorkItem {
    /// Fan the item out to every backend
    Store(Item),
    /// Ask every backend to delete the item with this id
    Delete(String),
}

/// FIFO work queue
///
/// Unbounded unless a capacity is given; entries beyond the capacity are
/// dropped and counted, producers never block.
#[derive(Debug, Default)]
pub struct WorkQueue {
    entries: Mutex<VecDeque<WorkItem>>,
    capacity: Option<usize>,
    accepted: AtomicU64,
    dropped: AtomicU64,
    completed: AtomicU64,
    abandoned: AtomicU64,
}

/// Queue counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Entries accepted since creation
    pub accepted: u64,
    /// Entries handed to the dispatcher and finished
    pub completed: u64,
    /// Entries rejected by the capacity limit
    pub dropped: u64,
    /// Entries taken by a consumer that was aborted before finishing them
    pub abandoned: u64,
    /// Entries waiting
    pub queued: usize,
}

impl WorkQueue {
    /// Unbounded queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue holding at most `capacity` pending entries
    pub fn with_capacity_limit(capacity: Option<usize>) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<WorkItem>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `entry` at the tail
    ///
    /// Returns `false` when the entry was dropped by the capacity limit.
    pub fn enqueue(&self, entry: WorkItem) -> bool {
        let mut entries = self.lock();
        if let Some(capacity) = self.capacity {
            if entries.len() >= capacity {
                drop(entries);
                self.dropped.fetch_add(1, Ordering::Relaxed);
                record_item_dropped();
                warn!(capacity, "Work queue full, entry dropped");
                return false;
            }
        }
        entries.push_back(entry);
        self.accepted.fetch_add(1, Ordering::Relaxed);
        record_item_accepted();
        true
    }

    /// Enqueue each entry in order; returns how many were accepted
    pub fn enqueue_batch(&self, entries: impl IntoIterator<Item = WorkItem>) -> usize {
        entries
            .into_iter()
            .map(|entry| self.enqueue(entry))
            .filter(|accepted| *accepted)
            .count()
    }

    /// Remove the head, if any
    pub fn try_dequeue(&self) -> Option<WorkItem> {
        self.lock().pop_front()
    }

    /// Remove the head, waiting `idle_wait` between attempts while empty
    ///
    /// Returns `None` once `stop` is set.
    pub async fn dequeue_blocking(&self, idle_wait: Duration, stop: &AtomicBool) -> Option<WorkItem> {
        loop {
            if stop.load(Ordering::Acquire) {
                return None;
            }
            if let Some(entry) = self.try_dequeue() {
                return Some(entry);
            }
            tokio::time::sleep(idle_wait).await;
        }
    }

    /// Record that a dequeued entry has been fully processed
    pub fn mark_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record that a dequeued entry will never be processed
    pub fn mark_abandoned(&self) {
        self.abandoned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Every accepted entry has been processed
    pub fn is_drained(&self) -> bool {
        let stats = self.stats();
        stats.queued == 0 && stats.completed + stats.abandoned >= stats.accepted
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            queued: self.len(),
        }
    }
}

/// A dequeued entry owned by a consumer
///
/// Dropping it without [`InFlight::finish`] (e.g. when the consumer task is
/// aborted mid-dispatch) counts the entry as abandoned.
pub(crate) struct InFlight<'a> {
    queue: &'a WorkQueue,
    finished: bool,
}

impl<'a> InFlight<'a> {
    pub(crate) fn new(queue: &'a WorkQueue) -> Self {
        Self {
            queue,
            finished: false,
        }
    }

    pub(crate) fn finish(mut self) {
        self.finished = true;
        self.queue.mark_completed();
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.queue.mark_abandoned();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(id: &str) -> WorkItem {
        WorkItem::Store(Item::new(id, "test"))
    }

    fn id_of(entry: WorkItem) -> String {
        match entry {
            WorkItem::Store(item) => item.id,
            WorkItem::Delete(id) => id,
        }
    }

    #[test]
    fn test_fifo_order() {
        let queue = WorkQueue::new();
        queue.enqueue(store("a"));
        queue.enqueue_batch(vec![store("b"), WorkItem::Delete("c".into())]);

        let order: Vec<String> = std::iter::from_fn(|| queue.try_dequeue())
            .map(id_of)
            .collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert_eq!(queue.stats().accepted, 3);
    }

    #[test]
    fn test_capacity_limit_drops_newest() {
        let queue = WorkQueue::with_capacity_limit(Some(2));
        let accepted = queue.enqueue_batch(vec![store("a"), store("b"), store("c")]);

        assert_eq!(accepted, 2);
        let stats = queue.stats();
        assert_eq!(stats.accepted, 2);
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.queued, 2);
    }

    #[test]
    fn test_drained_tracks_completion() {
        let queue = WorkQueue::new();
        assert!(queue.is_drained());

        queue.enqueue(store("a"));
        assert!(!queue.is_drained());

        assert!(queue.try_dequeue().is_some());
        assert!(!queue.is_drained());
        queue.mark_completed();
        assert!(queue.is_drained());
    }

    #[test]
    fn test_unfinished_entry_counts_as_abandoned() {
        let queue = WorkQueue::new();
        queue.enqueue_batch(vec![store("a"), store("b")]);

        assert!(queue.try_dequeue().is_some());
        InFlight::new(&queue).finish();
        assert!(queue.try_dequeue().is_some());
        drop(InFlight::new(&queue));

        let stats = queue.stats();
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.abandoned, 1);
        assert!(queue.is_drained());
    }

    #[tokio::test]
    async fn test_dequeue_blocking_observes_stop() {
        let queue = WorkQueue::new();
        let stop = AtomicBool::new(true);
        queue.enqueue(store("a"));

        assert!(queue
            .dequeue_blocking(Duration::from_millis(1), &stop)
            .await
            .is_none());
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_dequeue_blocking_waits_for_entry() {
        let queue = std::sync::Arc::new(WorkQueue::new());
        let stop = AtomicBool::new(false);

        let producer = {
            let queue = queue.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                queue.enqueue(store("late"));
            })
        };

        let entry = queue
            .dequeue_blocking(Duration::from_millis(5), &stop)
            .await
            .unwrap();
        assert_eq!(id_of(entry), "late");
        producer.await.unwrap();
    }
}
