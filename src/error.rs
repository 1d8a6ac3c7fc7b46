// src/error.rs

//! 网关统一错误类型
//!
//! 除 `Configuration` 只在启动阶段出现外，其余错误都会被折叠成
//! `success: false` 的 `CommandResult`，不会让进程退出。

use thiserror::Error;

use crate::engine::validate::ValidationError;

/// 连接失败时对外暴露的固定文案
pub const CONNECTION_ERROR_MESSAGE: &str = "Cannot make redis connection";

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// 无法得出拓扑，或启动时 PING 失败
    #[error("{0}")]
    Configuration(String),

    /// 建立连接失败；原因只写日志，不对外暴露
    #[error("Cannot make redis connection")]
    Connection { reason: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Does not support {0} command")]
    UnsupportedCommand(String),

    /// Redis 返回的错误，原样透传
    #[error("{0}")]
    Store(String),
}

impl GatewayError {
    pub fn no_topology() -> Self {
        GatewayError::Configuration("no connection topology configured".into())
    }

    pub fn connection(reason: impl ToString) -> Self {
        GatewayError::Connection { reason: reason.to_string() }
    }
}

impl From<redis::RedisError> for GatewayError {
    fn from(err: redis::RedisError) -> Self {
        GatewayError::Store(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            GatewayError::no_topology().to_string(),
            "no connection topology configured"
        );
        assert_eq!(
            GatewayError::connection("refused").to_string(),
            CONNECTION_ERROR_MESSAGE
        );
        assert_eq!(
            GatewayError::UnsupportedCommand("foo".into()).to_string(),
            "Does not support foo command"
        );
        assert_eq!(
            GatewayError::Store("WRONGTYPE Operation against a key".into()).to_string(),
            "WRONGTYPE Operation against a key"
        );
    }
}
