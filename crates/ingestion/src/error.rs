//! Ingestion 错误类型

use contracts::ContractError;
use dispatcher::DispatcherError;
use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 记录本身不合法（空通道名、空数值）
    #[error("invalid record: {0}")]
    InvalidRecord(#[source] ContractError),

    /// 数值个数与该通道首条记录不一致
    #[error("channel {channel} expects {expected} value(s), got {actual}")]
    ArityMismatch {
        /// 通道名
        channel: String,
        /// 首条记录的数值个数
        expected: usize,
        /// 本条记录的数值个数
        actual: usize,
    },

    /// 后缀已被另一个通道占用（本地文件名与网络 header 都由后缀决定）
    #[error("channel {channel} maps to suffix '{suffix}' already used by {owner}")]
    SuffixConflict {
        /// 通道名
        channel: String,
        /// 冲突的后缀
        suffix: String,
        /// 先占用该后缀的通道
        owner: String,
    },

    /// 注册时网络连接或 header 发送失败
    #[error("connection failed for channel {channel}: {message}")]
    Connection {
        /// 通道名
        channel: String,
        /// 错误消息
        message: String,
    },

    /// 注册时本地文件创建失败
    #[error("storage failed for channel {channel}: {message}")]
    Storage {
        /// 通道名
        channel: String,
        /// 错误消息
        message: String,
    },

    /// 会话已关闭
    #[error("session is closed")]
    SessionClosed,
}

impl IngestionError {
    /// 将注册阶段的 dispatcher 错误归类为 `Storage` / `Connection`
    pub fn registration(channel: impl Into<String>, err: DispatcherError) -> Self {
        let channel = channel.into();
        match err {
            DispatcherError::SinkCreation { message, .. } => Self::Storage { channel, message },
            DispatcherError::Io(e) => Self::Storage {
                channel,
                message: e.to_string(),
            },
            DispatcherError::Contract(e) => Self::Connection {
                channel,
                message: e.to_string(),
            },
        }
    }

    /// 是否可以通过再次 `ingest` 重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Storage { .. })
    }
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_error_mapping() {
        let storage = IngestionError::registration(
            "A",
            DispatcherError::sink_creation("A", "permission denied"),
        );
        assert!(matches!(storage, IngestionError::Storage { .. }));
        assert!(storage.is_retryable());

        let connection = IngestionError::registration(
            "A",
            DispatcherError::Contract(ContractError::sink_connection("A", "refused")),
        );
        assert!(matches!(connection, IngestionError::Connection { .. }));
        assert!(connection.to_string().contains("refused"));
    }

    #[test]
    fn test_session_closed_not_retryable() {
        assert!(!IngestionError::SessionClosed.is_retryable());
        let conflict = IngestionError::SuffixConflict {
            channel: "vendor.light".to_string(),
            suffix: "light".to_string(),
            owner: "android.sensor.light".to_string(),
        };
        assert!(!conflict.is_retryable());
        assert!(conflict.to_string().contains("android.sensor.light"));
    }
}
