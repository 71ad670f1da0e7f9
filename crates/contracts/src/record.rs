//! SensorRecord - Ingestion 输入
//!
//! 单条传感器读数，以及会话相对时间的计算。

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{ChannelId, ContractError, MERGED_LOG_NAME};

/// 传感器读数
///
/// 由生产者构造后不可变，经由队列交给分发循环。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorRecord {
    /// 通道 (传感器类型)
    pub channel: ChannelId,

    /// 时间戳 (epoch 毫秒)，同一通道内单调
    pub timestamp_ms: i64,

    /// 测量值，长度在同一通道内固定
    pub values: Vec<f64>,

    /// 相对会话开始的时间 (秒)，仅用于网络镜像
    pub relative_time_s: f64,
}

impl SensorRecord {
    /// 创建读数，相对时间为 0
    pub fn new(channel: impl Into<ChannelId>, timestamp_ms: i64, values: Vec<f64>) -> Self {
        Self {
            channel: channel.into(),
            timestamp_ms,
            values,
            relative_time_s: 0.0,
        }
    }

    /// 设置相对会话开始的时间
    pub fn with_relative_time(mut self, relative_time_s: f64) -> Self {
        self.relative_time_s = relative_time_s;
        self
    }

    /// 测量值个数
    pub fn arity(&self) -> usize {
        self.values.len()
    }

    /// 校验记录合法性
    ///
    /// # Errors
    /// 通道名为空、后缀不能作为文件名、或测量值为空时返回 `InvalidRecord`。
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.channel.is_empty() {
            return Err(ContractError::invalid_record("channel", "channel cannot be empty"));
        }
        check_suffix(&self.channel)?;
        if self.values.is_empty() {
            return Err(ContractError::invalid_record(
                "values",
                format!("channel '{}' record has no values", self.channel),
            ));
        }
        Ok(())
    }
}

/// The suffix names `<suffix>.txt` and the mirror header, so it must stay a
/// single line and a single path component inside the session directory.
fn check_suffix(channel: &ChannelId) -> Result<(), ContractError> {
    let suffix = channel.suffix();
    let reason = if suffix.is_empty() {
        "has an empty suffix"
    } else if suffix.contains(['/', '\\']) {
        "has a suffix containing a path separator"
    } else if suffix.chars().any(char::is_control) {
        "has a suffix containing control characters"
    } else if suffix == MERGED_LOG_NAME {
        "has a suffix reserved for the merged log"
    } else {
        return Ok(());
    };
    Err(ContractError::invalid_record(
        "channel",
        format!("channel '{channel}' {reason}"),
    ))
}

/// 会话时钟
///
/// 记录会话开始时刻，用于计算 `relative_time_s`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionClock {
    start_ms: i64,
}

impl SessionClock {
    /// 以当前时间作为会话开始
    pub fn start_now() -> Self {
        Self {
            start_ms: Utc::now().timestamp_millis(),
        }
    }

    /// 以指定时刻作为会话开始
    pub fn starting_at(start_ms: i64) -> Self {
        Self { start_ms }
    }

    /// 会话开始时刻 (epoch 毫秒)
    pub fn start_ms(&self) -> i64 {
        self.start_ms
    }

    /// 当前 epoch 毫秒
    pub fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }

    /// 计算相对时间 (秒)
    pub fn relative_seconds(&self, timestamp_ms: i64) -> f64 {
        timestamp_ms.saturating_sub(self.start_ms) as f64 / 1000.0
    }

    /// 以当前时间构造带相对时间的读数
    pub fn record_now(&self, channel: impl Into<ChannelId>, values: Vec<f64>) -> SensorRecord {
        let timestamp_ms = self.now_ms();
        SensorRecord::new(channel, timestamp_ms, values)
            .with_relative_time(self.relative_seconds(timestamp_ms))
    }
}
