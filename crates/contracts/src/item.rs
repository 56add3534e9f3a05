//! Item / MediaItem / WebPage records
//!
//! The pipeline treats these as opaque: it only reads the `original` flag,
//! walks the nested collections, and asks each record for its payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ContractError;

/// A record that can be forwarded to a backend as a canonical string payload
pub trait Record: Serialize {
    /// Stable identifier (used in logs and errors)
    fn record_id(&self) -> &str;

    /// Canonical serialized payload (compact JSON)
    fn to_payload(&self) -> Result<String, ContractError> {
        serde_json::to_string(self).map_err(|source| ContractError::Serialization {
            record_id: self.record_id().to_string(),
            source,
        })
    }
}

/// A unit of ingested content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Unique identifier (source-prefixed, e.g. "Twitter#123")
    pub id: String,

    /// Name of the content source that produced the item
    pub source: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,

    /// `false` for updates/duplicates of an already seen item
    #[serde(default = "default_original")]
    pub original: bool,

    #[serde(default)]
    pub media_items: Vec<MediaItem>,

    #[serde(default)]
    pub web_pages: Vec<WebPage>,
}

fn default_original() -> bool {
    true
}

impl Item {
    /// Create an original item with no nested records
    pub fn new(id: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            title: None,
            text: None,
            author: None,
            published_at: None,
            original: true,
            media_items: Vec::new(),
            web_pages: Vec::new(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_media(mut self, media: MediaItem) -> Self {
        self.media_items.push(media);
        self
    }

    pub fn with_web_page(mut self, page: WebPage) -> Self {
        self.web_pages.push(page);
        self
    }

    /// Mark the item as an update of a previously seen one
    pub fn as_update(mut self) -> Self {
        self.original = false;
        self
    }

    pub fn is_original(&self) -> bool {
        self.original
    }
}

impl Record for Item {
    fn record_id(&self) -> &str {
        &self.id
    }
}

/// Kind of media referenced by an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    #[default]
    Image,
    Video,
}

/// Media (image/video) embedded in or linked from an item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: String,
    pub url: String,

    #[serde(default)]
    pub media_type: MediaType,

    /// Id of the item the media was found in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl MediaItem {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            media_type: MediaType::default(),
            item_id: None,
            width: None,
            height: None,
        }
    }
}

impl Record for MediaItem {
    fn record_id(&self) -> &str {
        &self.id
    }
}

/// Web page linked from an item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebPage {
    pub url: String,

    /// URL after following redirects / shorteners
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expanded_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
}

impl WebPage {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            expanded_url: None,
            item_id: None,
        }
    }
}

impl Record for WebPage {
    fn record_id(&self) -> &str {
        &self.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_defaults_to_original() {
        let item: Item = serde_json::from_str(r#"{"id":"rss#1","source":"rss"}"#).unwrap();
        assert!(item.is_original());
        assert!(item.media_items.is_empty());
        assert!(item.web_pages.is_empty());
    }

    #[test]
    fn test_payload_is_camel_case_json() {
        let item = Item::new("rss#1", "rss")
            .with_media(MediaItem::new("m1", "http://img/1.jpg"))
            .as_update();
        let payload = item.to_payload().unwrap();
        assert!(payload.contains(r#""mediaItems":[{"id":"m1""#), "got: {payload}");
        assert!(payload.contains(r#""original":false"#));
        assert!(!payload.contains("publishedAt"));
    }

    #[test]
    fn test_web_page_record_id_is_url() {
        let page = WebPage::new("http://example.org/a");
        assert_eq!(page.record_id(), "http://example.org/a");
        assert_eq!(page.to_payload().unwrap(), r#"{"url":"http://example.org/a"}"#);
    }
}
