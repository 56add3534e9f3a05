//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置 -> 管理器 的装配测试
//! - 模拟 e2e 测试（内存 pub/sub broker，无需 Redis）
//! - fan-out / 过滤 / 隔离 / 重连 / reset 行为

#[cfg(test)]
mod support {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use contracts::{BackendConfig, ContractError, IngestConfig, Item, ManagerSettings, StorageBackend};
    use dispatcher::{BackendFactory, DispatcherError};

    /// Counts every store call per item id
    #[derive(Default)]
    pub struct CountingBackend {
        pub seen: Mutex<HashMap<String, usize>>,
    }

    impl CountingBackend {
        pub fn calls(&self) -> usize {
            self.seen.lock().unwrap().values().sum()
        }

        pub fn count_of(&self, id: &str) -> usize {
            self.seen.lock().unwrap().get(id).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl StorageBackend for CountingBackend {
        fn name(&self) -> &str {
            "counting"
        }

        async fn open(&self) -> bool {
            true
        }

        async fn store(&self, item: &Item) -> Result<(), ContractError> {
            *self.seen.lock().unwrap().entry(item.id.clone()).or_insert(0) += 1;
            Ok(())
        }

        async fn close(&self) {}

        async fn check_status(&self) -> bool {
            true
        }
    }

    /// Opens fine, then fails every store
    pub struct FailingBackend;

    #[async_trait]
    impl StorageBackend for FailingBackend {
        fn name(&self) -> &str {
            "failing"
        }

        async fn open(&self) -> bool {
            true
        }

        async fn store(&self, _item: &Item) -> Result<(), ContractError> {
            Err(ContractError::backend_write("failing", "connection reset by peer"))
        }

        async fn close(&self) {}

        async fn check_status(&self) -> bool {
            false
        }
    }

    /// Factory handing out one shared backend instance
    pub fn shared_factory(backend: Arc<dyn StorageBackend>) -> BackendFactory {
        Arc::new(
            move |_config: &BackendConfig| -> Result<Arc<dyn StorageBackend>, DispatcherError> {
                Ok(backend.clone())
            },
        )
    }

    pub fn config(consumers: usize, backends: Vec<BackendConfig>) -> IngestConfig {
        IngestConfig {
            manager: ManagerSettings {
                consumers,
                idle_wait_ms: 2,
                ..ManagerSettings::default()
            },
            backends,
        }
    }

    pub fn memory_backend(id: &str) -> BackendConfig {
        BackendConfig::new(id, "memory")
            .with_param("items_channel", "items")
            .with_param("media_channel", "media")
            .with_param("webpages_channel", "webpages")
    }

    pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);
}

#[cfg(test)]
mod config_tests {
    use std::sync::Arc;

    use config_loader::{ConfigFormat, ConfigLoader};
    use dispatcher::{BackendRegistry, MemoryBroker};
    use ingestion::IngestionManager;

    const CONFIG: &str = r#"
[manager]
consumers = 2
idle_wait_ms = 5

[[backends]]
id = "primary"
selector = "memory"
[backends.params]
items_channel = "items"

[[backends]]
id = "debug"
selector = "log"

[[backends]]
id = "legacy"
selector = "mongodb"
"#;

    #[tokio::test]
    async fn test_loaded_config_initializes_manager() {
        let config = ConfigLoader::load_from_str(CONFIG, ConfigFormat::Toml).unwrap();
        let broker = MemoryBroker::new();
        let registry = BackendRegistry::with_builtin().with("memory", broker.factory());

        let manager = IngestionManager::initialize(config, Arc::new(registry)).await;
        let working = manager.working_backends();

        assert_eq!(working.len(), 3);
        assert_eq!(working["primary"], true);
        assert_eq!(working["debug"], true);
        assert_eq!(working["legacy"], false);
        assert_eq!(manager.dispatcher().backend_ids(), vec!["primary", "debug"]);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;

    use contracts::{BackendConfig, Item, MediaItem, SourceError, WebPage};
    use dispatcher::{BackendRegistry, MemoryBroker};
    use ingestion::{FetchTask, IngestionManager};

    use crate::support::*;

    fn item(id: &str) -> Item {
        Item::new(id, "e2e")
            .with_media(MediaItem::new(format!("{id}-m"), "http://img"))
            .with_web_page(WebPage::new(format!("http://example.org/{id}")))
    }

    /// Every original item reaches every opened backend exactly once,
    /// whatever the number of consumers.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_fanout_completeness_with_parallel_consumers() {
        let broker_a = MemoryBroker::new();
        let broker_b = MemoryBroker::new();
        let counting = Arc::new(CountingBackend::default());

        let registry = BackendRegistry::new()
            .with("memory_a", broker_a.factory())
            .with("memory_b", broker_b.factory())
            .with("counting", shared_factory(counting.clone()));
        let config = config(
            4,
            vec![
                BackendConfig::new("a", "memory_a").with_param("items_channel", "items"),
                BackendConfig::new("b", "memory_b").with_param("items_channel", "items"),
                BackendConfig::new("count", "counting"),
            ],
        );

        let mut manager = IngestionManager::initialize(config, Arc::new(registry)).await;
        manager.start().await.unwrap();

        for batch in 0..5 {
            manager.intake_batch((0..20).map(|i| item(&format!("b{batch}-{i}"))));
        }
        assert!(manager.drain(DRAIN_TIMEOUT).await);
        manager.stop().await;

        assert_eq!(broker_a.published("items").len(), 100);
        assert_eq!(broker_b.published("items").len(), 100);
        assert_eq!(counting.calls(), 100);
        for batch in 0..5 {
            for i in 0..20 {
                assert_eq!(counting.count_of(&format!("b{batch}-{i}")), 1);
            }
        }
    }

    /// Non-original items never reach a backend.
    #[tokio::test]
    async fn test_non_original_items_are_filtered() {
        let broker = MemoryBroker::new();
        let counting = Arc::new(CountingBackend::default());
        let registry = BackendRegistry::new()
            .with("memory", broker.factory())
            .with("counting", shared_factory(counting.clone()));

        let mut manager = IngestionManager::initialize(
            config(2, vec![memory_backend("mem"), BackendConfig::new("count", "counting")]),
            Arc::new(registry),
        )
        .await;
        manager.start().await.unwrap();

        manager.intake(item("update-1").as_update());
        manager.intake(item("orig-1"));
        manager.intake(item("update-2").as_update());
        assert!(manager.drain(DRAIN_TIMEOUT).await);
        manager.stop().await;

        assert_eq!(counting.calls(), 1);
        assert_eq!(counting.count_of("orig-1"), 1);
        assert_eq!(broker.published("items").len(), 1);
        assert_eq!(broker.published("media").len(), 1);
        assert_eq!(broker.published("webpages").len(), 1);
    }

    /// A backend failing on store does not keep later backends from
    /// receiving the same item, and the consumer keeps going.
    #[tokio::test]
    async fn test_failing_backend_is_isolated() {
        let broker = MemoryBroker::new();
        let registry = BackendRegistry::new()
            .with("failing", shared_factory(Arc::new(FailingBackend)))
            .with("memory", broker.factory());

        let mut manager = IngestionManager::initialize(
            config(
                1,
                vec![BackendConfig::new("broken", "failing"), memory_backend("mem")],
            ),
            Arc::new(registry),
        )
        .await;
        manager.start().await.unwrap();

        manager.intake_batch(vec![item("x"), item("y")]);
        assert!(manager.drain(DRAIN_TIMEOUT).await);
        manager.stop().await;

        assert_eq!(broker.published("items").len(), 2);
        assert_eq!(manager.snapshot().delivered, 2);
    }

    /// A severed pub/sub connection is restored by one reconnect.
    #[tokio::test]
    async fn test_check_status_reconnects_severed_backend() {
        let broker = MemoryBroker::new();
        let registry = BackendRegistry::new().with("memory", broker.factory());
        let mut manager =
            IngestionManager::initialize(config(1, vec![memory_backend("mem")]), Arc::new(registry))
                .await;

        broker.sever();
        assert!(manager.check_backends().await);
        assert_eq!(broker.connections(), 2);

        manager.start().await.unwrap();
        manager.intake(item("after-reconnect"));
        assert!(manager.drain(DRAIN_TIMEOUT).await);
        manager.stop().await;
        assert_eq!(broker.published("items").len(), 1);

        broker.sever();
        broker.set_available(false);
        assert!(!manager.check_backends().await);
        assert_eq!(manager.working_backends()["mem"], false);
    }

    /// Queued items survive a reset and are delivered by the rebuilt storage layer.
    #[tokio::test]
    async fn test_reset_preserves_queued_items() {
        let broker = MemoryBroker::new();
        let registry = BackendRegistry::new().with("memory", broker.factory());
        let mut manager =
            IngestionManager::initialize(config(2, vec![memory_backend("mem")]), Arc::new(registry))
                .await;

        manager.intake_batch((0..5).map(|i| item(&format!("q{i}"))));
        manager.reset().await;
        assert_eq!(manager.queue_len(), 5);
        assert_eq!(broker.connections(), 2);

        manager.start().await.unwrap();
        assert!(manager.drain(DRAIN_TIMEOUT).await);
        assert_eq!(broker.published("items").len(), 5);

        // Reset while running resumes consumption
        manager.reset().await;
        assert!(manager.is_running());
        manager.intake(item("post-reset"));
        assert!(manager.drain(DRAIN_TIMEOUT).await);
        manager.stop().await;
        assert_eq!(broker.published("items").len(), 6);
    }

    /// Backend A only publishes items, backend B only media.
    #[tokio::test]
    async fn test_per_backend_channel_selection() {
        let broker_a = MemoryBroker::new();
        let broker_b = MemoryBroker::new();
        let registry = BackendRegistry::new()
            .with("memory_a", broker_a.factory())
            .with("memory_b", broker_b.factory());

        let config = config(
            1,
            vec![
                BackendConfig::new("a", "memory_a").with_param("items_channel", "items"),
                BackendConfig::new("b", "memory_b").with_param("media_channel", "media"),
            ],
        );
        let mut manager = IngestionManager::initialize(config, Arc::new(registry)).await;
        manager.start().await.unwrap();

        manager.intake(Item::new("one", "e2e").with_media(MediaItem::new("one-m", "http://img")));
        assert!(manager.drain(DRAIN_TIMEOUT).await);
        manager.stop().await;

        let delivered = manager.dispatcher().delivered();
        let (_, a) = &delivered[0];
        let (_, b) = &delivered[1];
        assert_eq!((a.items, a.media_items), (1, 0));
        assert_eq!((b.items, b.media_items), (0, 1));
        assert_eq!(broker_a.total_published(), 1);
        assert_eq!(broker_b.total_published(), 1);
    }

    /// 100 items, 4 consumers: all dispatched once before stop returns.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_hundred_items_four_consumers() {
        let counting = Arc::new(CountingBackend::default());
        let registry = BackendRegistry::new().with("counting", shared_factory(counting.clone()));
        let mut manager = IngestionManager::initialize(
            config(4, vec![BackendConfig::new("count", "counting")]),
            Arc::new(registry),
        )
        .await;
        manager.start().await.unwrap();

        for i in 0..100 {
            manager.intake(Item::new(format!("item-{i}"), "e2e"));
        }
        assert!(manager.drain(DRAIN_TIMEOUT).await);
        manager.stop().await;

        assert_eq!(counting.calls(), 100);
        assert!((0..100).all(|i| counting.count_of(&format!("item-{i}")) == 1));
        let snapshot = manager.snapshot();
        assert_eq!(snapshot.accepted, 100);
        assert_eq!(snapshot.delivered, 100);
    }

    /// Absent items change nothing.
    #[tokio::test]
    async fn test_absent_item_is_noop() {
        let counting = Arc::new(CountingBackend::default());
        let registry = BackendRegistry::new().with("counting", shared_factory(counting.clone()));
        let mut manager = IngestionManager::initialize(
            config(1, vec![BackendConfig::new("count", "counting")]),
            Arc::new(registry),
        )
        .await;
        manager.start().await.unwrap();

        let before = manager.snapshot();
        manager.intake(None::<Item>);
        assert!(manager.drain(DRAIN_TIMEOUT).await);
        manager.stop().await;

        assert_eq!(manager.snapshot(), before);
        assert_eq!(counting.calls(), 0);
    }

    /// A queue limit drops overflow instead of growing.
    #[tokio::test]
    async fn test_queue_limit_counts_drops() {
        let registry = BackendRegistry::new();
        let mut config = config(1, Vec::new());
        config.manager.max_queue_len = Some(3);
        let manager = IngestionManager::initialize(config, Arc::new(registry)).await;

        manager.intake_batch((0..5).map(|i| Item::new(format!("i{i}"), "e2e")));
        let snapshot = manager.snapshot();
        assert_eq!(snapshot.accepted, 3);
        assert_eq!(snapshot.dropped, 2);
        assert_eq!(snapshot.queued, 3);
    }

    /// Fetch task output flows through the manager's intake API.
    #[tokio::test]
    async fn test_fetch_task_hand_off() {
        use async_trait::async_trait;
        use contracts::{ContentSource, Feed};

        struct StaticSource;

        #[async_trait]
        impl ContentSource for StaticSource {
            fn name(&self) -> &str {
                "static"
            }

            async fn poll(&mut self, feeds: &[Feed], out: &mut Vec<Item>) -> Result<(), SourceError> {
                for feed in feeds {
                    out.push(Item::new(format!("{}-1", feed.id), "static"));
                }
                Err(SourceError::new("static", "quota exhausted"))
            }
        }

        let broker = MemoryBroker::new();
        let registry = BackendRegistry::new().with("memory", broker.factory());
        let mut manager =
            IngestionManager::initialize(config(1, vec![memory_backend("mem")]), Arc::new(registry))
                .await;
        manager.start().await.unwrap();

        let mut task = FetchTask::new(
            Box::new(StaticSource),
            vec![Feed::new("a", "q"), Feed::new("b", "q")],
        )
        .unwrap();
        assert_eq!(task.run().await, 2);
        assert!(task.is_completed());
        assert_eq!(task.hand_off(&manager), 2);

        assert!(manager.drain(DRAIN_TIMEOUT).await);
        manager.stop().await;
        assert_eq!(broker.published("items").len(), 2);
    }

    /// Deletion notifications pass through the queue without failing.
    #[tokio::test]
    async fn test_notify_delete_is_processed() {
        let broker = MemoryBroker::new();
        let registry = BackendRegistry::new().with("memory", broker.factory());
        let mut manager =
            IngestionManager::initialize(config(1, vec![memory_backend("mem")]), Arc::new(registry))
                .await;
        manager.start().await.unwrap();

        let stored = item("to-delete");
        manager.intake(stored.clone());
        manager.notify_delete(&stored);
        assert!(manager.drain(DRAIN_TIMEOUT).await);
        manager.stop().await;

        let snapshot = manager.snapshot();
        assert_eq!(snapshot.accepted, 2);
        assert_eq!(snapshot.delivered, 2);
        assert_eq!(broker.published("items").len(), 1);
    }
}
