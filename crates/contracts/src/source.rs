//! ContentSource trait - producer side of the pipeline
//!
//! A content source polls one external service for a set of feeds.
//! The pipeline never looks inside; it only receives the resulting items.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Item, SourceError};

/// What to look for in a content source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feed {
    /// Unique identifier
    pub id: String,

    /// Source-specific query (keyword, account, URL, path, ...)
    pub query: String,

    /// Only retrieve content published after this instant
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
}

impl Feed {
    pub fn new(id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            query: query.into(),
            since: None,
        }
    }
}

/// Content source polled by a fetch task
#[async_trait]
pub trait ContentSource: Send {
    /// Source name (used for logging)
    fn name(&self) -> &str;

    /// Prepare the source for monitoring
    ///
    /// Returns `false` when the source cannot be used at all.
    fn set_monitor(&mut self) -> bool {
        true
    }

    /// Run one poll cycle over `feeds`, appending retrieved items to `out`
    ///
    /// Items pushed before an error are kept by the caller.
    async fn poll(&mut self, feeds: &[Feed], out: &mut Vec<Item>) -> Result<(), SourceError>;
}
