//! Mock 传感器源
//!
//! 用于无真实设备环境的测试与演示。

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::error::IngestionError;
use crate::session::Session;

/// Mock 传感器源配置
#[derive(Debug, Clone, PartialEq)]
pub struct MockSensorConfig {
    /// 通道名（如 `android.sensor.accelerometer`）
    pub channel: String,

    /// 发送频率 (Hz)
    pub frequency_hz: f64,

    /// 每条记录的数值个数
    pub arity: usize,
}

impl Default for MockSensorConfig {
    fn default() -> Self {
        Self {
            channel: "mock.sensor".to_string(),
            frequency_hz: 50.0,
            arity: 3,
        }
    }
}

/// 解析 `name:hz:arity`，`hz` 与 `arity` 可省略
impl FromStr for MockSensorConfig {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let channel = parts
            .next()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| format!("missing channel name in '{s}'"))?
            .to_string();

        let mut config = Self {
            channel,
            ..Default::default()
        };

        if let Some(hz) = parts.next() {
            config.frequency_hz = hz
                .parse()
                .map_err(|_| format!("invalid frequency '{hz}' in '{s}'"))?;
            if !config.frequency_hz.is_finite() || config.frequency_hz <= 0.0 {
                return Err(format!("frequency must be positive in '{s}'"));
            }
        }
        if let Some(arity) = parts.next() {
            config.arity = arity
                .parse()
                .map_err(|_| format!("invalid arity '{arity}' in '{s}'"))?;
            if config.arity == 0 {
                return Err(format!("arity must be at least 1 in '{s}'"));
            }
        }
        if parts.next().is_some() {
            return Err(format!("expected name:hz:arity, got '{s}'"));
        }

        Ok(config)
    }
}

/// Mock 传感器源
///
/// 按固定频率生成正弦读数并调用 `Session::ingest`。
pub struct MockSensorSource {
    config: MockSensorConfig,
    running: Arc<AtomicBool>,
    sent: Arc<AtomicU64>,
}

impl MockSensorSource {
    /// 创建新的 Mock 传感器源
    pub fn new(config: MockSensorConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            sent: Arc::new(AtomicU64::new(0)),
        }
    }

    /// 三轴 IMU 类通道
    pub fn imu(channel: &str, frequency_hz: f64) -> Self {
        Self::new(MockSensorConfig {
            channel: channel.to_string(),
            frequency_hz,
            arity: 3,
        })
    }

    /// 单值通道（光照、气压等）
    pub fn scalar(channel: &str, frequency_hz: f64) -> Self {
        Self::new(MockSensorConfig {
            channel: channel.to_string(),
            frequency_hz,
            arity: 1,
        })
    }

    pub fn config(&self) -> &MockSensorConfig {
        &self.config
    }

    /// 启动 Mock 源，返回后台任务句柄
    ///
    /// 任务在 `stop()` 或会话关闭后结束，返回成功送入会话的记录数。
    /// 注册失败（网络不可达等）只记录日志，下一次读数会重试。
    pub fn start(&self, session: Arc<Session>) -> JoinHandle<u64> {
        let config = self.config.clone();
        let running = self.running.clone();
        let sent = self.sent.clone();

        running.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            let interval = Duration::from_secs_f64(1.0 / config.frequency_hz);
            let clock = session.clock();
            let mut tick: u64 = 0;

            debug!(
                channel = %config.channel,
                frequency_hz = config.frequency_hz,
                arity = config.arity,
                "mock sensor source started"
            );

            while running.load(Ordering::Relaxed) {
                tick += 1;
                let values = sample(tick, config.arity);
                let record = clock.record_now(config.channel.as_str(), values);

                match session.ingest(record).await {
                    Ok(()) => {
                        sent.fetch_add(1, Ordering::Relaxed);
                        trace!(channel = %config.channel, tick, "mock record sent");
                    }
                    Err(IngestionError::SessionClosed) => {
                        debug!(channel = %config.channel, "session closed");
                        break;
                    }
                    Err(e) => warn!(channel = %config.channel, error = %e, "mock record rejected"),
                }

                tokio::time::sleep(interval).await;
            }

            running.store(false, Ordering::SeqCst);
            debug!(channel = %config.channel, "mock sensor source stopped");
            sent.load(Ordering::Relaxed)
        })
    }

    /// 停止 Mock 源
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// 检查是否正在运行
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// 已送入会话的记录数
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

/// 每个分量相位错开的正弦波
fn sample(tick: u64, arity: usize) -> Vec<f64> {
    (0..arity)
        .map(|axis| (tick as f64 * 0.1 + axis as f64).sin())
        .collect()
}
