//! 摄取管道指标收集模块
//!
//! 基于 `metrics` facade 记录 intake、分发、队列与后端状态指标，
//! 并提供统计线程使用的吞吐率计算器。

use std::time::Duration;

use metrics::{counter, gauge};

/// 记录类别 (item / media item / web page)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordCategory {
    Item,
    MediaItem,
    WebPage,
}

impl RecordCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Item => "item",
            Self::MediaItem => "media_item",
            Self::WebPage => "web_page",
        }
    }
}

/// 记录 intake 接收
pub fn record_item_accepted() {
    counter!("ingest_items_accepted_total").increment(1);
}

/// 记录队列满导致的丢弃
pub fn record_item_dropped() {
    counter!("ingest_items_dropped_total").increment(1);
}

/// 记录单个后端的分发结果
pub fn record_item_dispatched(backend: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "ingest_items_dispatched_total",
        "backend" => backend.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// 记录后端发布的记录数
pub fn record_backend_published(backend: &str, category: RecordCategory) {
    counter!(
        "ingest_records_published_total",
        "backend" => backend.to_string(),
        "category" => category.as_str()
    )
    .increment(1);
}

/// 记录后端存活状态
pub fn record_backend_status(backend: &str, alive: bool) {
    gauge!("ingest_backend_up", "backend" => backend.to_string()).set(if alive {
        1.0
    } else {
        0.0
    });
}

/// 记录队列深度
pub fn record_queue_depth(depth: usize) {
    gauge!("ingest_queue_depth").set(depth as f64);
}

/// 记录存储层重置
pub fn record_reset() {
    counter!("ingest_storage_resets_total").increment(1);
}

/// 单个统计周期的吞吐率
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ThroughputSample {
    /// 本周期处理数
    pub window_count: u64,
    /// 本周期速率 (条/秒)
    pub window_rate: f64,
    /// 生命周期平均速率 (条/秒)
    pub mean_rate: f64,
}

/// 吞吐率计算器
///
/// 由统计线程按周期调用；对零时长周期返回 0 而不是除零。
#[derive(Debug, Clone, Default)]
pub struct ThroughputTracker {
    last_total: u64,
    elapsed: Duration,
}

impl ThroughputTracker {
    /// 以当前累计值为基线创建
    pub fn new(baseline: u64) -> Self {
        Self {
            last_total: baseline,
            elapsed: Duration::ZERO,
        }
    }

    /// 输入当前累计值与本周期时长，返回速率
    pub fn sample(&mut self, total: u64, window: Duration) -> ThroughputSample {
        let window_count = total.saturating_sub(self.last_total);
        self.last_total = total;
        self.elapsed += window;

        ThroughputSample {
            window_count,
            window_rate: rate(window_count, window),
            mean_rate: rate(total, self.elapsed),
        }
    }

    /// 累计统计时长
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

fn rate(count: u64, over: Duration) -> f64 {
    let secs = over.as_secs_f64();
    if secs > 0.0 {
        count as f64 / secs
    } else {
        0.0
    }
}
