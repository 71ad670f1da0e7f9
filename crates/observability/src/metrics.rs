//! 录制指标收集模块
//!
//! Prometheus 指标 + 内存聚合统计（窗口大小、各通道记录数）。

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::collections::HashMap;

/// 注册指标描述，exporter 安装后调用一次
pub(crate) fn describe_metrics() {
    describe_counter!(
        "sensor_recorder_records_ingested_total",
        Unit::Count,
        "Records accepted by the ingestion facade"
    );
    describe_counter!(
        "sensor_recorder_sink_writes_total",
        Unit::Count,
        "Line writes per channel, sink kind and status"
    );
    describe_counter!(
        "sensor_recorder_windows_opened_total",
        Unit::Count,
        "Same-time windows opened in the merged log"
    );
    describe_histogram!(
        "sensor_recorder_window_records",
        Unit::Count,
        "Records per closed same-time window"
    );
    describe_counter!(
        "sensor_recorder_channels_registered_total",
        Unit::Count,
        "Channels whose sinks were opened"
    );
    describe_gauge!(
        "sensor_recorder_queue_depth",
        Unit::Count,
        "Commands waiting in the intake queue"
    );
}

/// 记录一条被接收的传感器记录
pub fn record_record_ingested(channel: &str) {
    counter!(
        "sensor_recorder_records_ingested_total",
        "channel" => channel.to_string()
    )
    .increment(1);
}

/// 记录一次 sink 写入
///
/// `kind` 为 `local` / `network` / `merged`。
pub fn record_sink_write(channel: &str, kind: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "sensor_recorder_sink_writes_total",
        "channel" => channel.to_string(),
        "kind" => kind.to_string(),
        "status" => status
    )
    .increment(1);
}

/// 记录新开的同时刻窗口
pub fn record_window_opened() {
    counter!("sensor_recorder_windows_opened_total").increment(1);
}

/// 记录窗口关闭时包含的记录数
pub fn record_window_size(records: u64) {
    histogram!("sensor_recorder_window_records").record(records as f64);
}

/// 记录新注册的通道
pub fn record_channel_registered(channel: &str) {
    counter!(
        "sensor_recorder_channels_registered_total",
        "channel" => channel.to_string()
    )
    .increment(1);
}

/// 记录 intake 队列深度
pub fn record_queue_depth(depth: usize) {
    gauge!("sensor_recorder_queue_depth").set(depth as f64);
}

/// 录制指标聚合器
///
/// 由 dispatch 循环独占更新，结束时输出摘要。
#[derive(Debug, Clone, Default)]
pub struct RecordingAggregator {
    /// 处理的记录总数
    pub total_records: u64,

    /// 打开的窗口数
    pub windows_opened: u64,

    /// 写入失败次数（所有 sink）
    pub write_failures: u64,

    /// 每个窗口的记录数
    pub window_sizes: RunningStats,

    /// 各通道记录数
    pub channel_counts: HashMap<String, u64>,

    current_window: u64,
}

impl RecordingAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    ///
    /// `opened_window` 表示该记录开启了新窗口。
    pub fn record(&mut self, channel: &str, opened_window: bool) {
        if opened_window {
            self.close_window();
            self.windows_opened += 1;
        }
        self.current_window += 1;
        self.total_records += 1;

        *self.channel_counts.entry(channel.to_string()).or_insert(0) += 1;
    }

    /// 记录一次写入失败
    pub fn record_failure(&mut self) {
        self.write_failures += 1;
    }

    /// 结束当前窗口，计入窗口大小统计
    pub fn close_window(&mut self) {
        if self.current_window > 0 {
            self.window_sizes.push(self.current_window as f64);
            record_window_size(self.current_window);
            self.current_window = 0;
        }
    }

    /// 生成摘要报告
    pub fn summary(&self) -> RecordingSummary {
        RecordingSummary {
            total_records: self.total_records,
            windows_opened: self.windows_opened,
            write_failures: self.write_failures,
            window_records: StatsSummary::from(&self.window_sizes),
            channel_counts: self.channel_counts.clone(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 录制摘要
#[derive(Debug, Clone, Default)]
pub struct RecordingSummary {
    pub total_records: u64,
    pub windows_opened: u64,
    pub write_failures: u64,
    pub window_records: StatsSummary,
    pub channel_counts: HashMap<String, u64>,
}

impl std::fmt::Display for RecordingSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Recording Summary ===")?;
        writeln!(f, "Total records: {}", self.total_records)?;
        writeln!(f, "Windows opened: {}", self.windows_opened)?;
        writeln!(f, "Write failures: {}", self.write_failures)?;
        writeln!(f, "Records per window: {}", self.window_records)?;

        if !self.channel_counts.is_empty() {
            writeln!(f, "Records per channel:")?;
            let mut channels: Vec<_> = self.channel_counts.iter().collect();
            channels.sort();
            for (channel, count) in channels {
                writeln!(f, "  {}: {}", channel, count)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.mean }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
