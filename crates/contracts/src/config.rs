//! IngestConfig - Config Loader 输出
//!
//! 描述完整的摄取配置：管理器参数、存储后端列表。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::ContractError;

/// 完整的摄取配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestConfig {
    /// 管理器设置
    #[serde(default)]
    pub manager: ManagerSettings,

    /// 存储后端列表（按注册顺序）
    #[serde(default)]
    pub backends: Vec<BackendConfig>,
}

/// 管理器设置：消费者数量、统计周期等
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagerSettings {
    /// 消费者任务数量，必须 >= 1
    #[serde(default = "default_consumers")]
    pub consumers: usize,

    /// 队列为空时的重试等待 (毫秒)
    #[serde(default = "default_idle_wait_ms")]
    pub idle_wait_ms: u64,

    /// 统计输出周期 (秒)
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,

    /// stop 时等待消费者退出的上限 (毫秒)
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,

    /// 周期性健康检查 (秒)，None = 禁用
    #[serde(default)]
    pub health_check_interval_secs: Option<u64>,

    /// 队列长度上限，None = 无界
    #[serde(default)]
    pub max_queue_len: Option<usize>,
}

fn default_consumers() -> usize {
    1
}

fn default_idle_wait_ms() -> u64 {
    50
}

fn default_stats_interval_secs() -> u64 {
    5
}

fn default_shutdown_timeout_ms() -> u64 {
    5000
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            consumers: default_consumers(),
            idle_wait_ms: default_idle_wait_ms(),
            stats_interval_secs: default_stats_interval_secs(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            health_check_interval_secs: None,
            max_queue_len: None,
        }
    }
}

impl ManagerSettings {
    pub fn idle_wait(&self) -> Duration {
        Duration::from_millis(self.idle_wait_ms)
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn health_check_interval(&self) -> Option<Duration> {
        self.health_check_interval_secs.map(Duration::from_secs)
    }
}

/// 存储后端配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// 逻辑存储标识
    pub id: String,

    /// 实现选择器 (e.g., "redis", "file")
    pub selector: String,

    /// 后端特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl BackendConfig {
    pub fn new(id: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            selector: selector.into(),
            params: HashMap::new(),
        }
    }

    /// 追加参数
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// 读取可选参数（空字符串视为未配置）
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    /// 读取必填参数
    pub fn required_param(&self, key: &str) -> Result<&str, ContractError> {
        self.param(key)
            .ok_or_else(|| ContractError::backend_param(&self.id, key, "missing required parameter"))
    }

    /// 读取并解析参数，缺省时使用默认值
    pub fn parsed_param<T>(&self, key: &str, default: T) -> Result<T, ContractError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.param(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|e: T::Err| {
                ContractError::backend_param(&self.id, key, format!("invalid value '{raw}': {e}"))
            }),
        }
    }
}
