//! Ingestion 错误类型

use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 消费者已在运行
    #[error("ingestion manager is already running")]
    AlreadyRunning,

    /// 内容源监控初始化失败
    #[error("failed to initialise monitor for source '{source_name}'")]
    SourceMonitor {
        /// 内容源名称
        source_name: String,
    },
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
