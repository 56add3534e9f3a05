//! # Ingestion
//!
//! 摄取与调度模块。
//!
//! 负责：
//! - 接收生产者提交的 `Item`（intake / intake_batch / notify_delete / notify_error）
//! - 工作队列 + 消费者池，将条目交给 `CompositeDispatcher` fan-out
//! - 存储层生命周期：initialize / start / stop / reset
//! - 周期性统计输出与可选的健康检查
//! - `FetchTask`：对单个内容源执行一次轮询
//!
//! ## 使用示例
//!
//! ```ignore
//! use ingestion::IngestionManager;
//! use dispatcher::BackendRegistry;
//!
//! let registry = Arc::new(BackendRegistry::with_builtin());
//! let mut manager = IngestionManager::initialize(config, registry).await;
//! manager.start().await?;
//!
//! manager.intake(item);
//! manager.drain(Duration::from_secs(5)).await;
//! manager.stop().await;
//! ```

mod consumer;
mod error;
mod fetch;
mod handler;
mod health;
mod manager;
mod queue;
mod stats;

// Re-exports
pub use consumer::ConsumerPool;
pub use error::{IngestionError, Result};
pub use fetch::FetchTask;
pub use handler::{IntakeHandle, ItemHandler};
pub use health::WorkingStatus;
pub use manager::{IngestionManager, IngestionSnapshot};
pub use queue::{QueueStats, WorkItem, WorkQueue};
