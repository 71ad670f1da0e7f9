//! # Dispatcher
//!
//! 数据分发模块。
//!
//! 负责：
//! - 消费 intake 队列中的 `DispatchCommand`
//! - 写入每个通道的本地文件与网络镜像
//! - 按同时刻窗口写入合并日志 (`SameTime.txt`)
//! - 关闭时补齐 `END` 并关闭所有 sink

pub mod dispatcher;
pub mod error;
pub mod format;
pub mod metrics;
pub mod sinks;

pub use contracts::{LineSink, SensorRecord};
pub use dispatcher::{
    open_channel_sinks, open_merged_log, ChannelSinks, DispatchCommand, Dispatcher,
    DispatcherConfig,
};
pub use error::DispatcherError;
pub use format::{LineFormatter, ParsedLocalLine, WINDOW_END, WINDOW_START};
pub use metrics::{ChannelMetrics, ChannelMetricsSnapshot, MetricsSnapshot, SinkKind, SinkMetrics};
pub use observability::RecordingSummary;
pub use sinks::{FileSink, NetworkSink};
