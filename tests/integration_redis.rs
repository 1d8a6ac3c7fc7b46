// tests/integration_redis.rs

//! 集成测试：连接真实的 Redis 单机实例
//! 默认忽略，运行方式：
//!   REDIS_HOST=127.0.0.1:6379 cargo test -- --ignored

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crab_gate::config::ConnectionConfig;
use crab_gate::connection::RedisConnector;
use crab_gate::engine::{Command, Dispatcher};
use crab_gate::error::CONNECTION_ERROR_MESSAGE;
use crab_gate::topology::Topology;

fn dispatcher_for(host: &str) -> Dispatcher<RedisConnector> {
    let cfg = ConnectionConfig {
        host: host.into(),
        dial_timeout: 2,
        read_timeout: 2,
        ..ConnectionConfig::default()
    };
    Dispatcher::new(RedisConnector::new(Topology::resolve(&cfg).map(Arc::new)))
}

fn redis_host() -> String {
    std::env::var("REDIS_HOST").unwrap_or_else(|_| "127.0.0.1:6379".into())
}

/// 生成唯一的测试 key
fn unique_key(prefix: &str) -> String {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    format!("crab-gate:test:{}:{}", prefix, nanos)
}

#[tokio::test]
#[ignore]
async fn test_live_ping() {
    let r = dispatcher_for(&redis_host()).execute(Command::Ping).await;
    assert!(r.success, "{}", r.error_message);
    assert_eq!(r.string_value, "PONG");
}

#[tokio::test]
#[ignore]
async fn test_live_hash_roundtrip() {
    let dispatcher = dispatcher_for(&redis_host());
    let key = unique_key("hash");

    let r = dispatcher
        .execute(Command::HashSet { key: key.clone(), field: "f".into(), value: "v".into() })
        .await;
    assert!(r.success && r.bool_value, "{}", r.error_message);

    let r = dispatcher.execute(Command::HashGetAll { key: key.clone() }).await;
    assert!(r.map_value.values().any(|v| v == "v"));

    let delete = Command::HashDelete { key: key.clone(), fields: vec!["f".into()] };
    assert_eq!(dispatcher.execute(delete.clone()).await.int_value, 1);
    let r = dispatcher.execute(delete).await;
    assert!(r.success);
    assert_eq!(r.int_value, 0);

    let r = dispatcher.execute(Command::HashGetAll { key }).await;
    assert!(r.success && r.map_value.is_empty());
}

#[tokio::test]
#[ignore]
async fn test_live_wrong_type_error() {
    let dispatcher = dispatcher_for(&redis_host());
    let key = unique_key("wrongtype");

    // 对 string 类型的 key 执行 HSET 会触发 WRONGTYPE
    let client = redis::Client::open(format!("redis://{}", redis_host())).unwrap();
    let mut conn = client.get_multiplexed_async_connection().await.unwrap();
    let _: () = redis::cmd("SET").arg(&key).arg("plain").query_async(&mut conn).await.unwrap();

    let r = dispatcher
        .execute(Command::HashSet { key: key.clone(), field: "f".into(), value: "v".into() })
        .await;
    assert!(!r.success);
    assert!(r.error_message.contains("WRONGTYPE"), "{}", r.error_message);

    let _: i64 = redis::cmd("DEL").arg(&key).query_async(&mut conn).await.unwrap();
}

#[tokio::test]
async fn test_unreachable_ping() {
    // 端口 1 上不会有 Redis
    let r = dispatcher_for("127.0.0.1:1").execute(Command::Ping).await;
    assert!(!r.success);
    assert_eq!(r.error_message, CONNECTION_ERROR_MESSAGE);
}
