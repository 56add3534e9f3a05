//! PubSubBackend - publishes records to named channels of a pub/sub broker
//!
//! Transport-agnostic: a [`PubSubConnector`] creates connections, the backend
//! owns the channel routing, the per-backend lock, counters, and the
//! reconnect-on-probe protocol.

use async_trait::async_trait;
use contracts::{BackendConfig, ContractError, DeliveryCounts, Item, Record, StorageBackend};
use observability::RecordCategory;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::metrics::BackendMetrics;

/// Creates connections to a broker
#[async_trait]
pub trait PubSubConnector: Send + Sync {
    type Connection: PubSubConnection;

    /// Broker address, for logs
    fn endpoint(&self) -> String;

    /// Open a fresh connection
    async fn connect(&self) -> Result<Self::Connection, ContractError>;
}

/// One live broker connection
#[async_trait]
pub trait PubSubConnection: Send {
    /// Publish `payload` on `channel`
    async fn publish(&mut self, channel: &str, payload: &str) -> Result<(), ContractError>;

    /// Round-trip liveness probe
    async fn ping(&mut self) -> Result<(), ContractError>;

    /// Best-effort disconnect
    async fn disconnect(&mut self) {}
}

/// Channel per record category; `None` skips that category
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelConfig {
    pub items: Option<String>,
    pub media_items: Option<String>,
    pub web_pages: Option<String>,
}

impl ChannelConfig {
    /// Read `items_channel`, `media_channel` and `webpages_channel` params
    pub fn from_params(config: &BackendConfig) -> Self {
        Self {
            items: config.param("items_channel").map(str::to_string),
            media_items: config.param("media_channel").map(str::to_string),
            web_pages: config.param("webpages_channel").map(str::to_string),
        }
    }
}

/// Backend publishing original items and their nested records
pub struct PubSubBackend<C: PubSubConnector> {
    name: String,
    channels: ChannelConfig,
    connector: C,
    /// Single connection handle; every use goes through this lock
    connection: Mutex<Option<C::Connection>>,
    metrics: BackendMetrics,
}

impl<C: PubSubConnector> PubSubBackend<C> {
    /// Create an unopened backend
    pub fn new(name: impl Into<String>, channels: ChannelConfig, connector: C) -> Self {
        Self {
            name: name.into(),
            channels,
            connector,
            connection: Mutex::new(None),
            metrics: BackendMetrics::new(),
        }
    }

    /// Configured channels
    pub fn channels(&self) -> &ChannelConfig {
        &self.channels
    }

    /// Failed store calls so far
    pub fn failure_count(&self) -> u64 {
        self.metrics.failure_count()
    }

    async fn publish_all(
        &self,
        conn: &mut C::Connection,
        item: &Item,
    ) -> Result<(), ContractError> {
        if let Some(channel) = &self.channels.items {
            conn.publish(channel, &item.to_payload()?).await?;
            self.metrics.record_published(&self.name, RecordCategory::Item);
        }

        if let Some(channel) = &self.channels.media_items {
            for media in &item.media_items {
                conn.publish(channel, &media.to_payload()?).await?;
                self.metrics
                    .record_published(&self.name, RecordCategory::MediaItem);
            }
        }

        if let Some(channel) = &self.channels.web_pages {
            for page in &item.web_pages {
                conn.publish(channel, &page.to_payload()?).await?;
                self.metrics
                    .record_published(&self.name, RecordCategory::WebPage);
            }
        }

        Ok(())
    }

    /// Replace the connection in `slot` with a fresh, probed one
    async fn reconnect(&self, slot: &mut Option<C::Connection>) -> bool {
        if let Some(mut stale) = slot.take() {
            stale.disconnect().await;
        }

        match self.connector.connect().await {
            Ok(mut conn) => {
                let alive = match conn.ping().await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(backend = %self.name, error = %e, "Probe after reconnect failed");
                        false
                    }
                };
                *slot = Some(conn);
                info!(
                    backend = %self.name,
                    endpoint = %self.connector.endpoint(),
                    alive,
                    "Reconnected"
                );
                alive
            }
            Err(e) => {
                error!(backend = %self.name, error = %e, "Reconnect failed");
                false
            }
        }
    }
}

#[async_trait]
impl<C: PubSubConnector> StorageBackend for PubSubBackend<C> {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "pubsub_backend_open", skip(self), fields(backend = %self.name))]
    async fn open(&self) -> bool {
        let mut slot = self.connection.lock().await;
        match self.connector.connect().await {
            Ok(conn) => {
                *slot = Some(conn);
                debug!(
                    backend = %self.name,
                    endpoint = %self.connector.endpoint(),
                    "Connection opened"
                );
                true
            }
            Err(e) => {
                error!(backend = %self.name, error = %e, "Error during opening");
                false
            }
        }
    }

    async fn store(&self, item: &Item) -> Result<(), ContractError> {
        if !item.is_original() {
            return Ok(());
        }

        let mut slot = self.connection.lock().await;
        let conn = slot
            .as_mut()
            .ok_or_else(|| ContractError::backend_connection(&self.name, "not connected"))?;

        let result = self.publish_all(conn, item).await;
        if result.is_err() {
            self.metrics.inc_failure_count();
        }
        result
    }

    #[instrument(name = "pubsub_backend_close", skip(self), fields(backend = %self.name))]
    async fn close(&self) {
        if let Some(mut conn) = self.connection.lock().await.take() {
            conn.disconnect().await;
        }
        debug!(backend = %self.name, "Connection closed");
    }

    #[instrument(name = "pubsub_backend_check_status", skip(self), fields(backend = %self.name))]
    async fn check_status(&self) -> bool {
        let sent = self.metrics.snapshot();
        info!(
            backend = %self.name,
            items = sent.items,
            media_items = sent.media_items,
            web_pages = sent.web_pages,
            "Records published so far"
        );

        let mut slot = self.connection.lock().await;
        let probe = match slot.as_mut() {
            Some(conn) => conn.ping().await,
            None => Err(ContractError::backend_connection(&self.name, "not connected")),
        };

        match probe {
            Ok(()) => true,
            Err(e) => {
                warn!(backend = %self.name, error = %e, "Liveness probe failed, reconnecting");
                self.reconnect(&mut slot).await
            }
        }
    }

    fn delivered(&self) -> DeliveryCounts {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryBroker;
    use contracts::{MediaItem, WebPage};

    fn all_channels() -> ChannelConfig {
        ChannelConfig {
            items: Some("items".into()),
            media_items: Some("media".into()),
            web_pages: Some("webpages".into()),
        }
    }

    fn rich_item(id: &str) -> Item {
        Item::new(id, "test")
            .with_media(MediaItem::new(format!("{id}-m1"), "http://img/1"))
            .with_media(MediaItem::new(format!("{id}-m2"), "http://img/2"))
            .with_web_page(WebPage::new("http://example.org"))
    }

    #[test]
    fn test_channel_config_from_params() {
        let config = BackendConfig::new("r", "redis")
            .with_param("items_channel", "items")
            .with_param("webpages_channel", "pages");
        let channels = ChannelConfig::from_params(&config);
        assert_eq!(channels.items.as_deref(), Some("items"));
        assert_eq!(channels.media_items, None);
        assert_eq!(channels.web_pages.as_deref(), Some("pages"));
    }

    #[tokio::test]
    async fn test_store_publishes_each_category() {
        let broker = MemoryBroker::new();
        let backend = PubSubBackend::new("mem", all_channels(), broker.connector("mem"));
        assert!(backend.open().await);

        backend.store(&rich_item("a")).await.unwrap();

        assert_eq!(broker.published("items").len(), 1);
        assert_eq!(broker.published("media").len(), 2);
        assert_eq!(broker.published("webpages").len(), 1);
        assert_eq!(
            backend.delivered(),
            DeliveryCounts {
                items: 1,
                media_items: 2,
                web_pages: 1
            }
        );
    }

    #[tokio::test]
    async fn test_store_skips_updates_and_unconfigured_channels() {
        let broker = MemoryBroker::new();
        let channels = ChannelConfig {
            media_items: Some("media".into()),
            ..Default::default()
        };
        let backend = PubSubBackend::new("mem", channels, broker.connector("mem"));
        assert!(backend.open().await);

        backend.store(&rich_item("update").as_update()).await.unwrap();
        assert_eq!(broker.total_published(), 0);

        backend.store(&rich_item("orig")).await.unwrap();
        assert_eq!(broker.published("items").len(), 0);
        assert_eq!(broker.published("media").len(), 2);
        assert_eq!(broker.published("webpages").len(), 0);
    }

    #[tokio::test]
    async fn test_store_without_connection_fails() {
        let broker = MemoryBroker::new();
        broker.set_available(false);
        let backend = PubSubBackend::new("mem", all_channels(), broker.connector("mem"));
        assert!(!backend.open().await);

        let err = backend.store(&rich_item("a")).await.unwrap_err();
        assert!(err.is_connection());
    }

    #[tokio::test]
    async fn test_store_on_severed_connection_counts_failure() {
        let broker = MemoryBroker::new();
        let backend = PubSubBackend::new("mem", all_channels(), broker.connector("mem"));
        assert!(backend.open().await);

        broker.sever();
        assert!(backend.store(&rich_item("a")).await.is_err());
        assert_eq!(backend.failure_count(), 1);
    }

    #[tokio::test]
    async fn test_check_status_healthy_does_not_reconnect() {
        let broker = MemoryBroker::new();
        let backend = PubSubBackend::new("mem", all_channels(), broker.connector("mem"));
        assert!(backend.open().await);

        assert!(backend.check_status().await);
        assert_eq!(broker.connections(), 1);
    }

    #[tokio::test]
    async fn test_check_status_reconnects_once_after_sever() {
        let broker = MemoryBroker::new();
        let backend = PubSubBackend::new("mem", all_channels(), broker.connector("mem"));
        assert!(backend.open().await);

        broker.sever();
        assert!(backend.check_status().await);
        assert_eq!(broker.connections(), 2);

        // The fresh connection is usable again
        backend.store(&rich_item("after")).await.unwrap();
        assert_eq!(broker.published("items").len(), 1);
    }

    #[tokio::test]
    async fn test_check_status_false_when_reconnect_fails() {
        let broker = MemoryBroker::new();
        let backend = PubSubBackend::new("mem", all_channels(), broker.connector("mem"));
        assert!(backend.open().await);

        broker.sever();
        broker.set_available(false);
        assert!(!backend.check_status().await);
        assert_eq!(broker.connect_attempts(), 2);
    }

    #[tokio::test]
    async fn test_close_then_check_status_reconnects() {
        let broker = MemoryBroker::new();
        let backend = PubSubBackend::new("mem", all_channels(), broker.connector("mem"));
        assert!(backend.open().await);

        backend.close().await;
        assert!(backend.store(&rich_item("a")).await.is_err());
        assert!(backend.check_status().await);
    }
}
