// src/engine/mod.rs

//! # 引擎模块
//!
//! `engine` 模块是网关的命令分发层。它：
//! - 从 HTTP 层接收命令名和请求体（`Payload`）。
//! - 校验请求体，并把命令名解析成封闭的 `Command` 枚举。
//! - 通过 `ConnectionFactory` 取得连接，执行对应的 Redis 操作，然后释放连接。
//! - 返回统一的 `CommandResult`；任何错误都不会向上抛出。
pub mod command;
pub mod response;
pub mod validate;

pub use command::{Command, Payload};
pub use response::CommandResult;
pub use validate::{validate, ValidationError};

use crate::connection::{ConnectionFactory, StoreConnection};
use crate::error::{GatewayError, Result};

/// 命令分发器，持有连接工厂
pub struct Dispatcher<F> {
    factory: F,
}

impl<F: ConnectionFactory> Dispatcher<F> {
    pub fn new(factory: F) -> Self {
        Dispatcher { factory }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// HTTP 边界的入口：校验 -> 解析 -> 执行
    ///
    /// # 参数
    ///
    /// * `name` - URL 中的命令名，例如 `hset`
    /// * `payload` - 请求体
    pub async fn run(&self, name: &str, payload: Payload) -> CommandResult {
        // 1. 校验请求体，失败时不建连
        if let Err(e) = validate(name, &payload) {
            return failed(name, GatewayError::from(e));
        }

        // 2. 未知命令在这里被拒绝，同样不建连
        match Command::parse(name, payload) {
            Ok(command) => self.execute(command).await,
            Err(e) => failed(name, e),
        }
    }

    /// 执行单个命令
    pub async fn execute(&self, command: Command) -> CommandResult {
        let name = command.name();

        let mut conn = match self.factory.acquire().await {
            Ok(conn) => conn,
            Err(e) => {
                if let GatewayError::Connection { reason } = &e {
                    tracing::warn!(command = name, "acquire failed: {}", reason);
                }
                return failed(name, e);
            }
        };

        let outcome = apply(&mut conn, command).await;
        // 无论成败都释放连接
        drop(conn);

        match outcome {
            Ok(result) => {
                tracing::debug!(command = name, "{:?}", result);
                result
            }
            Err(e) => failed(name, e),
        }
    }
}

async fn apply<C: StoreConnection>(conn: &mut C, command: Command) -> Result<CommandResult> {
    let name = command.name();
    let result = match command {
        Command::Ping => CommandResult::with_string(name, conn.ping().await?),
        Command::HashSet { key, field, value } => {
            // field 是否已存在不对外暴露
            conn.hset(&key, &field, &value).await?;
            CommandResult::with_bool(name, true)
        }
        Command::HashGetAll { key } => CommandResult::with_map(name, conn.hgetall(&key).await?),
        Command::HashDelete { key, fields } => {
            CommandResult::with_int(name, conn.hdel(&key, &fields).await?)
        }
    };
    Ok(result)
}

fn failed(name: &str, err: GatewayError) -> CommandResult {
    let result = CommandResult::failure(name, &err);
    tracing::error!(command = name, "{}", result.error_message);
    result
}
