//! RecorderConfig - Config Loader 输出
//!
//! 描述一次记录会话的完整配置：存储位置、会话标识、合并窗口、远端采集器。

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the merged same-time log inside the session directory
pub const MERGED_LOG_NAME: &str = "SameTime";

/// Upper bound for a single backoff sleep
const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的记录器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 本地存储
    #[serde(default)]
    pub storage: StorageConfig,

    /// 会话标识
    pub session: SessionConfig,

    /// 合并窗口
    #[serde(default)]
    pub window: WindowConfig,

    /// 远端采集器
    #[serde(default)]
    pub network: NetworkConfig,

    /// 输出格式
    #[serde(default)]
    pub format: FormatConfig,
}

impl RecorderConfig {
    /// Minimal configuration for a session prefix, everything else defaulted
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            version: ConfigVersion::V1,
            storage: StorageConfig::default(),
            session: SessionConfig {
                prefix: prefix.into(),
                sequence: default_sequence(),
            },
            window: WindowConfig::default(),
            network: NetworkConfig::default(),
            format: FormatConfig::default(),
        }
    }

    /// `<root>/<prefix>_SensorData`
    pub fn session_dir(&self) -> PathBuf {
        self.storage
            .root
            .join(format!("{}_SensorData", self.session.prefix))
    }

    /// Path of the merged same-time log
    pub fn merged_log_path(&self) -> PathBuf {
        channel_file_path(&self.session_dir(), MERGED_LOG_NAME)
    }

    /// Path of the local log for a channel suffix
    pub fn channel_log_path(&self, suffix: &str) -> PathBuf {
        channel_file_path(&self.session_dir(), suffix)
    }

    /// Header line sent once on every mirror connection (without newline)
    pub fn network_header(&self, suffix: &str) -> String {
        format!(
            "{}_{}{}",
            self.session.prefix, suffix, self.session.sequence
        )
    }
}

fn channel_file_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.txt"))
}

/// 存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// 外部存储根目录
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("./recordings")
}

/// 会话配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// 会话前缀 (目录名与网络头)
    pub prefix: String,

    /// 会话序号，用于区分同一前缀下的多次会话
    #[serde(default = "default_sequence")]
    pub sequence: u32,
}

fn default_sequence() -> u32 {
    1
}

/// 合并窗口配置
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WindowConfig {
    /// 超过该间隔 (毫秒) 即开启新窗口
    #[serde(default = "default_threshold_ms")]
    pub threshold_ms: i64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            threshold_ms: default_threshold_ms(),
        }
    }
}

fn default_threshold_ms() -> i64 {
    10
}

/// 网络镜像配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// 是否启用网络镜像
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// 远端地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 远端端口
    #[serde(default = "default_port")]
    pub port: u16,

    /// 连接重试策略
    #[serde(default)]
    pub retry_policy: RetryPolicy,

    /// 最大连接尝试次数 (仅 backoff)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// 初始退避时间 (毫秒)
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// 单次连接超时 (毫秒)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl NetworkConfig {
    /// `host:port`
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Number of connection attempts the retry policy allows
    pub fn attempts(&self) -> u32 {
        match self.retry_policy {
            RetryPolicy::None => 1,
            RetryPolicy::Backoff => self.max_attempts.max(1),
        }
    }

    /// Delay before retry number `attempt` (0-based), doubling each time
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let delay = Duration::from_millis(self.initial_backoff_ms.saturating_mul(factor));
        delay.min(MAX_BACKOFF)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: default_port(),
            retry_policy: RetryPolicy::default(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7220
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    100
}

fn default_connect_timeout_ms() -> u64 {
    3000
}

/// 连接重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryPolicy {
    /// 只尝试一次
    #[default]
    None,
    /// 指数退避重试
    Backoff,
}

/// 输出格式配置
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FormatConfig {
    /// 日期时间列使用的时区
    #[serde(default)]
    pub timezone: TimeZoneMode,
}

/// 时区
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeZoneMode {
    /// 本地时区
    #[default]
    Local,
    /// UTC
    Utc,
}
