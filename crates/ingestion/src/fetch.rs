//! Source fetch task - one poll cycle against a content source

use std::mem;

use contracts::{ContentSource, Feed, Item, SourceError};
use tracing::{debug, error, instrument};

use crate::error::{IngestionError, Result};
use crate::handler::ItemHandler;

/// Polls one content source for a set of feeds
///
/// `run` always completes, even when the poll fails; whatever was retrieved
/// before the failure is kept until handed off.
pub struct FetchTask {
    source: Box<dyn ContentSource>,
    feeds: Vec<Feed>,
    items: Vec<Item>,
    errors: Vec<SourceError>,
    completed: bool,
}

impl FetchTask {
    /// Create a task; fails when the source cannot be monitored
    pub fn new(mut source: Box<dyn ContentSource>, feeds: Vec<Feed>) -> Result<Self> {
        if !source.set_monitor() {
            return Err(IngestionError::SourceMonitor {
                source_name: source.name().to_string(),
            });
        }

        Ok(Self {
            source,
            feeds,
            items: Vec::new(),
            errors: Vec::new(),
            completed: false,
        })
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    pub fn feeds(&self) -> &[Feed] {
        &self.feeds
    }

    pub fn add_feeds(&mut self, feeds: impl IntoIterator<Item = Feed>) {
        self.feeds.extend(feeds);
    }

    pub fn clear_feeds(&mut self) {
        self.feeds.clear();
    }

    /// Run one poll cycle; returns how many items it retrieved
    #[instrument(
        name = "fetch_task_run",
        skip(self),
        fields(source = %self.source.name(), feeds = self.feeds.len())
    )]
    pub async fn run(&mut self) -> usize {
        let before = self.items.len();

        if let Err(e) = self.source.poll(&self.feeds, &mut self.items).await {
            error!(error = %e, kept = self.items.len() - before, "Poll failed");
            self.errors.push(e);
        }

        self.completed = true;
        let retrieved = self.items.len() - before;
        debug!(retrieved, "Poll cycle finished");
        retrieved
    }

    /// The last cycle has finished, successfully or not
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Allow another cycle with the same feeds
    pub fn restart(&mut self) {
        self.completed = false;
    }

    /// Items collected and not yet handed off
    pub fn retrieved_items(&self) -> &[Item] {
        &self.items
    }

    /// Push collected items and poll errors into `handler`
    ///
    /// Returns how many items were handed off.
    pub fn hand_off(&mut self, handler: &dyn ItemHandler) -> usize {
        for e in mem::take(&mut self.errors) {
            handler.notify_error(&e);
        }

        let items = mem::take(&mut self.items);
        let count = items.len();
        handler.intake_batch(items);
        count
    }
}
