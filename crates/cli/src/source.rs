//! JSON-lines content source
//!
//! Each feed's query is a file path; every non-empty line is one `Item`.
//! Lines already read are remembered per feed, so a later poll only picks up
//! appended lines.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use contracts::{ContentSource, Feed, Item, SourceError};
use tracing::debug;

pub struct JsonLinesSource {
    name: String,
    /// feed id -> lines consumed
    offsets: HashMap<String, usize>,
}

impl Default for JsonLinesSource {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonLinesSource {
    pub fn new() -> Self {
        Self {
            name: "jsonl".to_string(),
            offsets: HashMap::new(),
        }
    }

    /// One feed per input file
    pub fn feeds_for(paths: &[PathBuf]) -> Vec<Feed> {
        paths
            .iter()
            .map(|path| {
                let query = path.display().to_string();
                Feed::new(query.clone(), query)
            })
            .collect()
    }

    async fn poll_feed(&mut self, feed: &Feed, out: &mut Vec<Item>) -> Result<(), SourceError> {
        let content = tokio::fs::read_to_string(&feed.query).await.map_err(|e| {
            SourceError::new(&self.name, format!("cannot read '{}'", feed.query)).with_cause(e)
        })?;

        let offset = self.offsets.entry(feed.id.clone()).or_insert(0);
        for (line_no, line) in content.lines().enumerate().skip(*offset) {
            *offset = line_no + 1;
            if line.trim().is_empty() {
                continue;
            }

            let item: Item = serde_json::from_str(line).map_err(|e| {
                SourceError::new(
                    &self.name,
                    format!("invalid item at {}:{}", feed.query, line_no + 1),
                )
                .with_cause(e)
            })?;

            if feed.since.is_some_and(|since| item.published_at.is_some_and(|at| at <= since)) {
                continue;
            }
            out.push(item);
        }

        debug!(feed = %feed.id, lines = *offset, "Feed polled");
        Ok(())
    }
}

#[async_trait]
impl ContentSource for JsonLinesSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn poll(&mut self, feeds: &[Feed], out: &mut Vec<Item>) -> Result<(), SourceError> {
        for feed in feeds {
            self.poll_feed(feed, out).await?;
        }
        Ok(())
    }
}
