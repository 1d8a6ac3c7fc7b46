// src/connection.rs

//! 连接工厂：按已解析的拓扑建立 Redis 连接，并放进连接池复用。
//!
//! 连接池在 `RedisConnector::new` 时建好，之后只读；`acquire` 从池里借出一个
//! 句柄，句柄 drop 时归还。池的大小、空闲与寿命由 pool-* / idle-* 参数决定，
//! 建连受 dial 超时与重试策略约束，单次命令受响应超时约束。

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bb8::{ManageConnection, Pool, PooledConnection, RunError};
use redis::aio::MultiplexedConnection;
use redis::cluster::ClusterClientBuilder;
use redis::cluster_async::ClusterConnection;
use redis::sentinel::{SentinelClient, SentinelNodeConnectionInfo, SentinelServerType};
use redis::{Cmd, ConnectionInfo, FromRedisValue, IntoConnectionInfo, RedisConnectionInfo};
use tokio::time::timeout;

use crate::error::{GatewayError, Result};
use crate::topology::{ConnectionOptions, Topology};

/// 未配置 dial-timeout 时的建连上限
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(5);
/// 未配置 read/write-timeout 时的单次命令上限
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(3);
/// 未配置 pool-size 时池中最多的连接数
pub const DEFAULT_POOL_SIZE: u32 = 10;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_MIN_RETRY_BACKOFF: Duration = Duration::from_millis(8);
pub const DEFAULT_MAX_RETRY_BACKOFF: Duration = Duration::from_millis(512);

/// 一个已建立的存储连接，支持网关用到的几条命令
pub trait StoreConnection: Send {
    fn ping(&mut self) -> impl Future<Output = Result<String>> + Send;

    /// 返回 field 是否为新建
    fn hset(&mut self, key: &str, field: &str, value: &str)
        -> impl Future<Output = Result<bool>> + Send;

    fn hgetall(&mut self, key: &str) -> impl Future<Output = Result<HashMap<String, String>>> + Send;

    /// 返回实际删除的 field 数
    fn hdel(&mut self, key: &str, fields: &[String]) -> impl Future<Output = Result<i64>> + Send;
}

/// 按需提供连接；调用方拥有返回的句柄，drop 即释放
pub trait ConnectionFactory: Send + Sync {
    type Connection: StoreConnection;

    fn acquire(&self) -> impl Future<Output = Result<Self::Connection>> + Send;
}

/// Redis 连接：单机和哨兵都落到 multiplexed 连接上
pub enum RedisConnection {
    Node(MultiplexedConnection),
    Cluster(ClusterConnection),
}

impl RedisConnection {
    async fn query<T: FromRedisValue>(&mut self, cmd: &Cmd) -> Result<T> {
        let value = match self {
            RedisConnection::Node(conn) => cmd.query_async(conn).await?,
            RedisConnection::Cluster(conn) => cmd.query_async(conn).await?,
        };
        Ok(value)
    }
}

impl StoreConnection for RedisConnection {
    async fn ping(&mut self) -> Result<String> {
        self.query(&redis::cmd("PING")).await
    }

    async fn hset(&mut self, key: &str, field: &str, value: &str) -> Result<bool> {
        let mut cmd = redis::cmd("HSET");
        cmd.arg(key).arg(field).arg(value);
        let added: i64 = self.query(&cmd).await?;
        Ok(added > 0)
    }

    async fn hgetall(&mut self, key: &str) -> Result<HashMap<String, String>> {
        let mut cmd = redis::cmd("HGETALL");
        cmd.arg(key);
        self.query(&cmd).await
    }

    async fn hdel(&mut self, key: &str, fields: &[String]) -> Result<i64> {
        let mut cmd = redis::cmd("HDEL");
        cmd.arg(key);
        for field in fields {
            cmd.arg(field);
        }
        self.query(&cmd).await
    }
}

/// 从池中借出的连接，drop 时归还
pub type PooledRedisConnection = PooledConnection<'static, TopologyManager>;

impl StoreConnection for PooledRedisConnection {
    async fn ping(&mut self) -> Result<String> {
        (**self).ping().await
    }

    async fn hset(&mut self, key: &str, field: &str, value: &str) -> Result<bool> {
        (**self).hset(key, field, value).await
    }

    async fn hgetall(&mut self, key: &str) -> Result<HashMap<String, String>> {
        (**self).hgetall(key).await
    }

    async fn hdel(&mut self, key: &str, fields: &[String]) -> Result<i64> {
        (**self).hdel(key, fields).await
    }
}

/// 建连失败后的重试策略，退避时间按指数增长
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_options(options: &ConnectionOptions) -> Self {
        RetryPolicy {
            retries: options.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            min_backoff: options.min_retry_backoff.unwrap_or(DEFAULT_MIN_RETRY_BACKOFF),
            max_backoff: options.max_retry_backoff.unwrap_or(DEFAULT_MAX_RETRY_BACKOFF),
        }
    }

    /// 第 `attempt` 次重试前的等待：`min * 2^attempt`，不超过 `max`
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.min_backoff.saturating_mul(factor).min(self.max_backoff)
    }
}

/// 连接池参数，由 `ConnectionOptions` 换算而来
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_size: u32,
    pub min_idle: Option<u32>,
    /// 等待借出连接的上限（pool-timeout）
    pub connection_timeout: Duration,
    pub idle_timeout: Option<Duration>,
    /// 连接最长寿命（max-conn-age）
    pub max_lifetime: Option<Duration>,
    /// 回收空闲/过期连接的周期（idle-check-frequency）
    pub reaper_rate: Option<Duration>,
}

impl PoolSettings {
    pub fn from_options(options: &ConnectionOptions) -> Self {
        let max_size = options
            .pool_size
            .and_then(|n| u32::try_from(n).ok())
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_POOL_SIZE);
        // 常驻空闲连接不能多于池的上限
        let min_idle = options
            .min_idle_conns
            .map(|n| u32::try_from(n).unwrap_or(u32::MAX).min(max_size));
        let connection_timeout = options
            .pool_timeout
            .unwrap_or_else(|| dial_timeout(options) + Duration::from_secs(1));

        PoolSettings {
            max_size,
            min_idle,
            connection_timeout,
            idle_timeout: options.idle_timeout,
            max_lifetime: options.max_conn_age,
            reaper_rate: options.idle_check_frequency,
        }
    }

    pub fn builder(&self) -> bb8::Builder<TopologyManager> {
        let mut builder = Pool::builder()
            .max_size(self.max_size)
            .min_idle(self.min_idle)
            .connection_timeout(self.connection_timeout)
            .idle_timeout(self.idle_timeout)
            .max_lifetime(self.max_lifetime)
            // 重试由 TopologyManager 自己负责
            .retry_connection(false);
        if let Some(rate) = self.reaper_rate {
            builder = builder.reaper_rate(rate);
        }
        builder
    }
}

fn dial_timeout(options: &ConnectionOptions) -> Duration {
    options.dial_timeout.unwrap_or(DEFAULT_DIAL_TIMEOUT)
}

fn response_timeout(options: &ConnectionOptions) -> Duration {
    options.response_timeout().unwrap_or(DEFAULT_RESPONSE_TIMEOUT)
}

/// 按拓扑建立新连接，供连接池调用
pub struct TopologyManager {
    topology: Arc<Topology>,
    dial: Duration,
    response: Duration,
    retry: RetryPolicy,
}

impl TopologyManager {
    pub fn new(topology: Arc<Topology>) -> Self {
        let options = topology.options();
        TopologyManager {
            dial: dial_timeout(options),
            response: response_timeout(options),
            retry: RetryPolicy::from_options(options),
            topology,
        }
    }

    /// 建立一次连接，受 dial 超时约束
    async fn open(&self) -> Result<RedisConnection> {
        let topology = self.topology.as_ref();
        let opening = async {
            match topology {
                Topology::Single { address, options } => {
                    open_single(address, options, self.response).await
                }
                Topology::Cluster { addresses, options } => {
                    let settings =
                        ClusterSettings::new(addresses, options, self.retry, self.dial, self.response);
                    open_cluster(settings).await
                }
                Topology::Sentinel {
                    master_name,
                    sentinel_addresses,
                    options,
                } => open_sentinel(master_name, sentinel_addresses, options, self.response).await,
            }
        };

        match timeout(self.dial, opening).await {
            Ok(conn) => conn,
            Err(_) => Err(GatewayError::connection(format!(
                "dial {} timed out after {:?}",
                topology, self.dial
            ))),
        }
    }
}

impl ManageConnection for TopologyManager {
    type Connection = RedisConnection;
    type Error = GatewayError;

    async fn connect(&self) -> Result<RedisConnection> {
        // 集群客户端自带重试
        if matches!(*self.topology, Topology::Cluster { .. }) {
            return self.open().await;
        }

        let mut attempt = 0;
        loop {
            match self.open().await {
                Ok(conn) => return Ok(conn),
                Err(e) if attempt < self.retry.retries => {
                    let wait = self.retry.backoff(attempt);
                    tracing::debug!(
                        "connect to {} failed ({:?}), retry {} in {:?}",
                        self.topology,
                        e,
                        attempt + 1,
                        wait
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn is_valid(&self, conn: &mut RedisConnection) -> Result<()> {
        conn.ping().await.map(|_| ())
    }

    fn has_broken(&self, _conn: &mut RedisConnection) -> bool {
        false
    }
}

/// 基于拓扑的 Redis 连接工厂，内部持有连接池
#[derive(Clone)]
pub struct RedisConnector {
    topology: Option<Arc<Topology>>,
    pool: Option<Pool<TopologyManager>>,
}

impl RedisConnector {
    /// 需要在 tokio 运行时中调用：连接池的后台回收任务随之启动，
    /// 但不会等待任何连接建立。
    pub fn new(topology: Option<Arc<Topology>>) -> Self {
        let pool = topology.clone().map(|topology| {
            PoolSettings::from_options(topology.options())
                .builder()
                .build_unchecked(TopologyManager::new(topology))
        });
        RedisConnector { topology, pool }
    }

    pub fn topology(&self) -> Option<&Topology> {
        self.topology.as_deref()
    }

    pub fn pool(&self) -> Option<&Pool<TopologyManager>> {
        self.pool.as_ref()
    }
}

impl ConnectionFactory for RedisConnector {
    type Connection = PooledRedisConnection;

    async fn acquire(&self) -> Result<PooledRedisConnection> {
        let pool = self
            .pool
            .as_ref()
            .ok_or_else(|| GatewayError::connection("no connection topology configured"))?;

        pool.get_owned().await.map_err(|e| match e {
            RunError::User(e) => e,
            RunError::TimedOut => {
                GatewayError::connection("timed out waiting for a pooled connection")
            }
        })
    }
}

/// 没写协议头的地址按 `redis://` 处理
fn connection_url(address: &str) -> String {
    if address.contains("://") {
        address.to_string()
    } else {
        format!("redis://{}", address)
    }
}

fn node_info(address: &str, options: &ConnectionOptions) -> Result<ConnectionInfo> {
    let mut info = connection_url(address)
        .into_connection_info()
        .map_err(GatewayError::connection)?;
    info.redis.db = options.db;
    if options.password.is_some() {
        info.redis.password = options.password.clone();
    }
    Ok(info)
}

async fn open_single(
    address: &str,
    options: &ConnectionOptions,
    response: Duration,
) -> Result<RedisConnection> {
    let client = redis::Client::open(node_info(address, options)?).map_err(GatewayError::connection)?;
    let mut conn = client
        .get_multiplexed_async_connection()
        .await
        .map_err(GatewayError::connection)?;
    conn.set_response_timeout(response);
    Ok(RedisConnection::Node(conn))
}

/// 交给 `ClusterClientBuilder` 的全部参数
#[derive(Debug, Clone, PartialEq, Eq)]
struct ClusterSettings {
    nodes: Vec<String>,
    password: Option<String>,
    retries: u32,
    min_retry_wait_ms: u64,
    max_retry_wait_ms: u64,
    connection_timeout: Duration,
    response_timeout: Duration,
}

impl ClusterSettings {
    fn new(
        addresses: &[String],
        options: &ConnectionOptions,
        retry: RetryPolicy,
        dial: Duration,
        response: Duration,
    ) -> Self {
        ClusterSettings {
            nodes: addresses.iter().map(|a| connection_url(a)).collect(),
            password: options.password.clone(),
            retries: retry.retries,
            min_retry_wait_ms: retry.min_backoff.as_millis() as u64,
            max_retry_wait_ms: retry.max_backoff.as_millis() as u64,
            connection_timeout: dial,
            response_timeout: response,
        }
    }

    fn builder(self) -> ClusterClientBuilder {
        let mut builder = ClusterClientBuilder::new(self.nodes)
            .retries(self.retries)
            .min_retry_wait(self.min_retry_wait_ms)
            .max_retry_wait(self.max_retry_wait_ms)
            .connection_timeout(self.connection_timeout)
            .response_timeout(self.response_timeout);
        if let Some(password) = self.password {
            builder = builder.password(password);
        }
        builder
    }
}

async fn open_cluster(settings: ClusterSettings) -> Result<RedisConnection> {
    let client = settings.builder().build().map_err(GatewayError::connection)?;
    let conn = client
        .get_async_connection()
        .await
        .map_err(GatewayError::connection)?;
    Ok(RedisConnection::Cluster(conn))
}

/// 通过哨兵找到主节点后，连主节点用的 db 与密码
fn sentinel_node_info(options: &ConnectionOptions) -> SentinelNodeConnectionInfo {
    SentinelNodeConnectionInfo {
        tls_mode: None,
        redis_connection_info: Some(RedisConnectionInfo {
            db: options.db,
            password: options.password.clone(),
            ..Default::default()
        }),
    }
}

async fn open_sentinel(
    master_name: &str,
    sentinel_addresses: &[String],
    options: &ConnectionOptions,
    response: Duration,
) -> Result<RedisConnection> {
    let sentinels: Vec<String> = sentinel_addresses.iter().map(|a| connection_url(a)).collect();
    let mut client = SentinelClient::build(
        sentinels,
        master_name.to_string(),
        Some(sentinel_node_info(options)),
        SentinelServerType::Master,
    )
    .map_err(GatewayError::connection)?;
    let mut conn = client
        .get_async_connection()
        .await
        .map_err(GatewayError::connection)?;
    conn.set_response_timeout(response);
    Ok(RedisConnection::Node(conn))
}
