// src/server.rs
//! 这是 crab-gate 的 HTTP 层：
//! - `GET /healthz`：对 Redis 执行 PING
//! - `POST /:command`：解析 JSON 请求体，交给 engine 执行
//! - `GET /metrics`：Prometheus 文本格式的命令计数
//! - 成功返回 200 + 单一字段的 JSON，失败返回 400 + `errorMessage`
use anyhow::Result;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use warp::{
    http::StatusCode,
    hyper::body::Bytes,
    reply::{Json, WithStatus},
    Filter, Rejection, Reply,
};

use crate::{
    cli::StartArgs,
    connection::{ConnectionFactory, PoolSettings, RedisConnector},
    engine::{Command, CommandResult, Dispatcher, Payload},
    error::GatewayError,
    monitor::Metrics,
    topology::Topology,
};

/// 请求体上限，超出时返回 413
pub const MAX_BODY_BYTES: u64 = 64 * 1024;

/// 进程级共享状态：分发器 + 监控
pub struct Gateway<F> {
    pub dispatcher: Dispatcher<F>,
    pub metrics: Metrics,
}

impl<F: ConnectionFactory> Gateway<F> {
    pub fn new(factory: F) -> Self {
        Gateway {
            dispatcher: Dispatcher::new(factory),
            metrics: Metrics::new(),
        }
    }

    /// 执行命令并计数
    pub async fn handle(&self, name: &str, payload: Payload) -> CommandResult {
        let result = self.dispatcher.run(name, payload).await;
        self.metrics.record(&result);
        result
    }
}

/// 启动网关：解析拓扑 -> 启动检查 -> 监听 HTTP
pub async fn start(args: StartArgs) -> Result<()> {
    let config = args.connection_config()?;

    // 拓扑只在这里解析一次，之后只读
    let topology = Topology::resolve(&config).ok_or_else(GatewayError::no_topology)?;
    tracing::info!("connection topology: {}", topology);
    tracing::info!("connection options: {:?}", topology.options());
    tracing::info!("connection pool: {:?}", PoolSettings::from_options(topology.options()));

    // 集群模式跳过启动时的 PING
    let check_on_start = !matches!(topology, Topology::Cluster { .. });
    let gateway = Arc::new(Gateway::new(RedisConnector::new(Some(Arc::new(topology)))));

    if check_on_start {
        let result = gateway.dispatcher.execute(Command::Ping).await;
        if !result.success {
            return Err(GatewayError::Configuration(result.error_message).into());
        }
        tracing::info!("redis replied {}", result.string_value);
    }

    serve(args.listen, gateway).await
}

/// 绑定地址并服务，直到收到 Ctrl+C
pub async fn serve<F>(addr: SocketAddr, gateway: Arc<Gateway<F>>) -> Result<()>
where
    F: ConnectionFactory + 'static,
{
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("received Ctrl+C, shutting down");
    };
    let (bound, server) =
        warp::serve(routes(gateway)).try_bind_with_graceful_shutdown(addr, shutdown)?;
    tracing::info!("crab-gate listening on {}", bound);

    server.await;
    Ok(())
}

/// 完整路由表
pub fn routes<F>(
    gateway: Arc<Gateway<F>>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone
where
    F: ConnectionFactory + 'static,
{
    let healthz = warp::path("healthz")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_gateway(gateway.clone()))
        .then(ping_command);

    let metrics = warp::path("metrics")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_gateway(gateway.clone()))
        .map(|gateway: Arc<Gateway<F>>| gateway.metrics.to_prometheus());

    let command = warp::path::param::<String>()
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::bytes())
        .and(with_gateway(gateway))
        .then(api_command);

    healthz.or(metrics).or(command).recover(handle_rejection)
}

fn with_gateway<F>(
    gateway: Arc<Gateway<F>>,
) -> impl Filter<Extract = (Arc<Gateway<F>>,), Error = Infallible> + Clone
where
    F: ConnectionFactory + 'static,
{
    warp::any().map(move || gateway.clone())
}

async fn ping_command<F: ConnectionFactory>(gateway: Arc<Gateway<F>>) -> WithStatus<Json> {
    let result = gateway.handle("ping", Payload::default()).await;
    if result.success {
        reply(StatusCode::OK, json!({ "boolVal": true }))
    } else {
        error_reply(&result.error_message)
    }
}

async fn api_command<F: ConnectionFactory>(
    command: String,
    body: Bytes,
    gateway: Arc<Gateway<F>>,
) -> WithStatus<Json> {
    // 请求体不是合法 JSON 时直接 400，不进入 engine
    let payload: Payload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!(command = %command, "bad payload: {}", e);
            return error_reply(&e.to_string());
        }
    };

    let result = gateway.handle(&command, payload).await;
    if result.success {
        reply(StatusCode::OK, success_body(&result))
    } else {
        error_reply(&result.error_message)
    }
}

/// 按命令挑出唯一有意义的负载字段
fn success_body(result: &CommandResult) -> Value {
    match result.name.as_str() {
        "hset" => json!({ "boolValue": result.bool_value }),
        // 只返回 value，丢弃 field
        "hgetall" => json!({ "stringArrayValue": result.values() }),
        "hdel" => json!({ "intValue": result.int_value }),
        _ => json!({ "boolVal": true }),
    }
}

fn reply(status: StatusCode, body: Value) -> WithStatus<Json> {
    warp::reply::with_status(warp::reply::json(&body), status)
}

fn error_reply(message: &str) -> WithStatus<Json> {
    reply(StatusCode::BAD_REQUEST, json!({ "errorMessage": message }))
}

async fn handle_rejection(err: Rejection) -> std::result::Result<WithStatus<Json>, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_string())
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "request body too large".to_string())
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, "content-length required".to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "method not allowed".to_string())
    } else {
        tracing::warn!("unhandled rejection: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
    };
    Ok(reply(status, json!({ "errorMessage": message })))
}
