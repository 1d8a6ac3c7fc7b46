// src/config.rs

//! 连接配置：启动时由命令行 / 环境变量 / JSON 文件得到，之后只读。
//!
//! 所有数值型的超时、退避参数都用 `i64` 表示，小于 0 表示“未设置”，
//! 交给 Redis 客户端使用自身默认值。时长单位均为秒。

use anyhow::{Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// 未设置时的哨兵值
pub const UNSET: i64 = -1;

#[derive(Args, Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ConnectionConfig {
    /// Redis host list separated by comma
    #[arg(long, env = "HOST", default_value = "")]
    pub host: String,

    /// Master name of sentinel
    #[arg(long, env = "MASTER_NAME", default_value = "")]
    pub master_name: String,

    /// Sentinel address list separated by comma
    #[arg(long, env = "SENTINEL_ADDRESS", default_value = "")]
    pub sentinel_address: String,

    /// Connection password
    #[arg(long, env = "PASSWORD", default_value = "", hide_env_values = true)]
    pub password: String,

    /// Database number
    #[arg(long, env = "DB", default_value_t = 0)]
    pub db: i64,

    /// Maximum retries
    #[arg(long, env = "MAX_RETRIES", default_value_t = UNSET, allow_negative_numbers = true)]
    pub max_retries: i64,

    /// Pool size
    #[arg(long, env = "POOL_SIZE", default_value_t = 10, allow_negative_numbers = true)]
    pub pool_size: i64,

    /// Minimum idle connections
    #[arg(long, env = "MIN_IDLE_CONNS", default_value_t = 3, allow_negative_numbers = true)]
    pub min_idle_conns: i64,

    /// Minimum retry backoff in seconds
    #[arg(long, env = "MIN_RETRY_BACKOFF", default_value_t = UNSET, allow_negative_numbers = true)]
    pub min_retry_backoff: i64,

    /// Maximum retry backoff in seconds
    #[arg(long, env = "MAX_RETRY_BACKOFF", default_value_t = UNSET, allow_negative_numbers = true)]
    pub max_retry_backoff: i64,

    /// Dial timeout in seconds
    #[arg(long, env = "DIAL_TIMEOUT", default_value_t = UNSET, allow_negative_numbers = true)]
    pub dial_timeout: i64,

    /// Read timeout in seconds
    #[arg(long, env = "READ_TIMEOUT", default_value_t = UNSET, allow_negative_numbers = true)]
    pub read_timeout: i64,

    /// Write timeout in seconds
    #[arg(long, env = "WRITE_TIMEOUT", default_value_t = UNSET, allow_negative_numbers = true)]
    pub write_timeout: i64,

    /// Maximum connection age in seconds
    #[arg(long, env = "MAX_CONN_AGE", default_value_t = UNSET, allow_negative_numbers = true)]
    pub max_conn_age: i64,

    /// Pool timeout in seconds
    #[arg(long, env = "POOL_TIMEOUT", default_value_t = UNSET, allow_negative_numbers = true)]
    pub pool_timeout: i64,

    /// Idle timeout in seconds
    #[arg(long, env = "IDLE_TIMEOUT", default_value_t = 900, allow_negative_numbers = true)]
    pub idle_timeout: i64,

    /// Idle check frequency in seconds
    #[arg(long, env = "IDLE_CHECK_FREQUENCY", default_value_t = 900, allow_negative_numbers = true)]
    pub idle_check_frequency: i64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            host: String::new(),
            master_name: String::new(),
            sentinel_address: String::new(),
            password: String::new(),
            db: 0,
            max_retries: UNSET,
            pool_size: 10,
            min_idle_conns: 3,
            min_retry_backoff: UNSET,
            max_retry_backoff: UNSET,
            dial_timeout: UNSET,
            read_timeout: UNSET,
            write_timeout: UNSET,
            max_conn_age: UNSET,
            pool_timeout: UNSET,
            idle_timeout: 900,
            idle_check_frequency: 900,
        }
    }
}

/// 从指定路径读取并反序列化 JSON 配置，缺省字段取命令行默认值
pub fn load<P: AsRef<Path>>(path: P) -> Result<ConnectionConfig> {
    let path_ref = path.as_ref();
    let data = fs::read_to_string(path_ref)
        .with_context(|| format!("Failed to read config file {:?}", path_ref))?;
    let cfg: ConnectionConfig = serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse config file {:?}", path_ref))?;
    Ok(cfg)
}
