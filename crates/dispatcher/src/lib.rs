//! # Dispatcher
//!
//! 数据分发模块。
//!
//! 负责：
//! - 按 selector 解析并创建存储后端
//! - Fan-out 到多个后端（顺序调用，单个失败不影响其余）
//! - Pub/sub 后端：分类发布 + 探活失败后重连一次

pub mod backends;
pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod registry;

pub use backends::{
    ChannelConfig, FileBackend, LogBackend, MemoryBroker, PubSubBackend, RedisBackend,
};
pub use contracts::{DeliveryCounts, Item, StorageBackend};
pub use dispatcher::CompositeDispatcher;
pub use error::DispatcherError;
pub use metrics::BackendMetrics;
pub use registry::{BackendFactory, BackendRegistry};
