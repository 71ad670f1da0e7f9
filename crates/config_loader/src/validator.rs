//! 配置校验模块
//!
//! 校验规则：
//! - session.prefix 非空且不含路径分隔符
//! - window.threshold_ms >= 0
//! - 启用网络时 host 非空、port != 0
//! - network.max_attempts >= 1

use contracts::{ContractError, RecorderConfig};

/// 校验 RecorderConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &RecorderConfig) -> Result<(), ContractError> {
    validate_session(config)?;
    validate_window(config)?;
    validate_network(config)?;
    Ok(())
}

/// 校验会话前缀
fn validate_session(config: &RecorderConfig) -> Result<(), ContractError> {
    let prefix = &config.session.prefix;
    if prefix.trim().is_empty() {
        return Err(ContractError::config_validation(
            "session.prefix",
            "session prefix cannot be empty",
        ));
    }
    if prefix.contains(['/', '\\']) || prefix == "." || prefix == ".." {
        return Err(ContractError::config_validation(
            "session.prefix",
            format!("session prefix '{prefix}' must not contain path separators"),
        ));
    }
    Ok(())
}

/// 校验窗口阈值
fn validate_window(config: &RecorderConfig) -> Result<(), ContractError> {
    if config.window.threshold_ms < 0 {
        return Err(ContractError::config_validation(
            "window.threshold_ms",
            format!(
                "threshold_ms must be >= 0, got {}",
                config.window.threshold_ms
            ),
        ));
    }
    Ok(())
}

/// 校验网络配置
fn validate_network(config: &RecorderConfig) -> Result<(), ContractError> {
    let network = &config.network;
    if !network.enabled {
        return Ok(());
    }
    if network.host.trim().is_empty() {
        return Err(ContractError::config_validation(
            "network.host",
            "host cannot be empty when network mirroring is enabled",
        ));
    }
    if network.port == 0 {
        return Err(ContractError::config_validation(
            "network.port",
            "port must be non-zero",
        ));
    }
    if network.max_attempts == 0 {
        return Err(ContractError::config_validation(
            "network.max_attempts",
            "max_attempts must be >= 1",
        ));
    }
    Ok(())
}
