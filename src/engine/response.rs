// src/engine/response.rs

use serde::Serialize;
use std::collections::HashMap;

use crate::error::GatewayError;

/// 统一的命令执行结果。
/// 每种命令只有一个负载字段有意义；失败时负载字段保持默认值。
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub name: String,
    pub success: bool,
    pub error_message: String,
    pub bool_value: bool,
    pub map_value: HashMap<String, String>,
    pub int_value: i64,
    pub string_value: String,
}

impl CommandResult {
    pub fn failure(name: &str, err: &GatewayError) -> Self {
        CommandResult {
            name: name.to_string(),
            error_message: err.to_string(),
            ..Default::default()
        }
    }

    fn ok(name: &str) -> Self {
        CommandResult {
            name: name.to_string(),
            success: true,
            ..Default::default()
        }
    }

    pub fn with_bool(name: &str, value: bool) -> Self {
        CommandResult { bool_value: value, ..Self::ok(name) }
    }

    pub fn with_map(name: &str, value: HashMap<String, String>) -> Self {
        CommandResult { map_value: value, ..Self::ok(name) }
    }

    pub fn with_int(name: &str, value: i64) -> Self {
        CommandResult { int_value: value, ..Self::ok(name) }
    }

    pub fn with_string(name: &str, value: String) -> Self {
        CommandResult { string_value: value, ..Self::ok(name) }
    }

    /// HGETALL 对外只返回 value，顺序不保证
    pub fn values(&self) -> Vec<String> {
        self.map_value.values().cloned().collect()
    }
}
