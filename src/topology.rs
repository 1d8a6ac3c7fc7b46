// src/topology.rs

//! 拓扑解析：从 `ConnectionConfig` 推导出唯一的连接拓扑。
//!
//! 优先级（先命中者胜）：
//! 1. 配置了哨兵地址 -> `Sentinel`
//! 2. host 拆分后多于一个地址 -> `Cluster`
//! 3. host 恰好一个地址 -> `Single`
//! 4. 其它情况没有拓扑，启动失败

use std::fmt;
use std::time::Duration;

use crate::config::ConnectionConfig;

const ADDRESS_DELIMITER: char = ',';

/// 各拓扑共用的连接参数，`None` 表示使用客户端默认值
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConnectionOptions {
    pub password: Option<String>,
    pub db: i64,
    pub max_retries: Option<u32>,
    pub min_retry_backoff: Option<Duration>,
    pub max_retry_backoff: Option<Duration>,
    pub dial_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
    pub pool_size: Option<usize>,
    pub min_idle_conns: Option<usize>,
    pub max_conn_age: Option<Duration>,
    pub pool_timeout: Option<Duration>,
    pub idle_timeout: Option<Duration>,
    pub idle_check_frequency: Option<Duration>,
}

// 手写 Debug，避免把密码打进日志
impl fmt::Debug for ConnectionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionOptions")
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("db", &self.db)
            .field("max_retries", &self.max_retries)
            .field("min_retry_backoff", &self.min_retry_backoff)
            .field("max_retry_backoff", &self.max_retry_backoff)
            .field("dial_timeout", &self.dial_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("write_timeout", &self.write_timeout)
            .field("pool_size", &self.pool_size)
            .field("min_idle_conns", &self.min_idle_conns)
            .field("max_conn_age", &self.max_conn_age)
            .field("pool_timeout", &self.pool_timeout)
            .field("idle_timeout", &self.idle_timeout)
            .field("idle_check_frequency", &self.idle_check_frequency)
            .finish()
    }
}

impl ConnectionOptions {
    pub fn from_config(cfg: &ConnectionConfig) -> Self {
        ConnectionOptions {
            password: Some(cfg.password.clone()).filter(|p| !p.is_empty()),
            db: cfg.db,
            max_retries: count(cfg.max_retries).and_then(|n| u32::try_from(n).ok()),
            min_retry_backoff: seconds(cfg.min_retry_backoff),
            max_retry_backoff: seconds(cfg.max_retry_backoff),
            dial_timeout: seconds(cfg.dial_timeout),
            read_timeout: seconds(cfg.read_timeout),
            write_timeout: seconds(cfg.write_timeout),
            pool_size: count(cfg.pool_size),
            min_idle_conns: count(cfg.min_idle_conns),
            max_conn_age: seconds(cfg.max_conn_age),
            pool_timeout: seconds(cfg.pool_timeout),
            idle_timeout: seconds(cfg.idle_timeout),
            idle_check_frequency: seconds(cfg.idle_check_frequency),
        }
    }

    /// 单次请求往返的上限：写超时 + 读超时，都未设置时为 `None`
    pub fn response_timeout(&self) -> Option<Duration> {
        match (self.write_timeout, self.read_timeout) {
            (None, None) => None,
            (w, r) => Some(w.unwrap_or_default() + r.unwrap_or_default()),
        }
    }
}

/// 负数和 0 都视为未设置，交给客户端默认值
fn seconds(value: i64) -> Option<Duration> {
    u64::try_from(value)
        .ok()
        .filter(|&secs| secs > 0)
        .map(Duration::from_secs)
}

fn count(value: i64) -> Option<usize> {
    usize::try_from(value).ok()
}

fn split_addresses(raw: &str) -> Vec<String> {
    raw.split(ADDRESS_DELIMITER)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topology {
    Single {
        address: String,
        options: ConnectionOptions,
    },
    Cluster {
        addresses: Vec<String>,
        options: ConnectionOptions,
    },
    Sentinel {
        master_name: String,
        sentinel_addresses: Vec<String>,
        options: ConnectionOptions,
    },
}

impl Topology {
    /// 按优先级解析拓扑；返回 `None` 表示没有可用配置
    pub fn resolve(cfg: &ConnectionConfig) -> Option<Topology> {
        let options = ConnectionOptions::from_config(cfg);

        let sentinel_addresses = split_addresses(&cfg.sentinel_address);
        if !sentinel_addresses.is_empty() {
            return Some(Topology::Sentinel {
                master_name: cfg.master_name.clone(),
                sentinel_addresses,
                options,
            });
        }

        let mut addresses = split_addresses(&cfg.host);
        match addresses.len() {
            0 => None,
            1 => Some(Topology::Single {
                address: addresses.remove(0),
                options,
            }),
            _ => Some(Topology::Cluster { addresses, options }),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Topology::Single { .. } => "single",
            Topology::Cluster { .. } => "cluster",
            Topology::Sentinel { .. } => "sentinel",
        }
    }

    pub fn options(&self) -> &ConnectionOptions {
        match self {
            Topology::Single { options, .. }
            | Topology::Cluster { options, .. }
            | Topology::Sentinel { options, .. } => options,
        }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topology::Single { address, .. } => write!(f, "single node {}", address),
            Topology::Cluster { addresses, .. } => {
                write!(f, "cluster [{}]", addresses.join(", "))
            }
            Topology::Sentinel {
                master_name,
                sentinel_addresses,
                ..
            } => write!(
                f,
                "sentinel master '{}' via [{}]",
                master_name,
                sentinel_addresses.join(", ")
            ),
        }
    }
}
