// src/engine/command.rs

//! 请求体与命令枚举

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// HTTP 请求体，所有字段缺省为空
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Payload {
    pub key: String,
    pub field: String,
    pub fields: Vec<String>,
    pub value: String,
}

/// 网关支持的命令集合，未知命令不会出现在这里
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ping,
    HashSet { key: String, field: String, value: String },
    HashGetAll { key: String },
    HashDelete { key: String, fields: Vec<String> },
}

impl Command {
    /// 由 URL 中的命令名和请求体构造命令
    pub fn parse(name: &str, payload: Payload) -> Result<Command, GatewayError> {
        let Payload {
            key,
            field,
            fields,
            value,
        } = payload;
        match name {
            "ping" => Ok(Command::Ping),
            "hset" => Ok(Command::HashSet { key, field, value }),
            "hgetall" => Ok(Command::HashGetAll { key }),
            "hdel" => Ok(Command::HashDelete { key, fields }),
            other => Err(GatewayError::UnsupportedCommand(other.to_string())),
        }
    }

    /// 受支持的命令名；未知命令返回 `None`
    pub fn known_name(name: &str) -> Option<&'static str> {
        ["ping", "hset", "hgetall", "hdel"]
            .into_iter()
            .find(|known| *known == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Ping => "ping",
            Command::HashSet { .. } => "hset",
            Command::HashGetAll { .. } => "hgetall",
            Command::HashDelete { .. } => "hdel",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_name() {
        assert_eq!(Command::known_name("hgetall"), Some("hgetall"));
        assert_eq!(Command::known_name("HSET"), None);
        assert_eq!(Command::known_name("flushall"), None);
    }

    #[test]
    fn test_parse_known() {
        let payload = Payload {
            key: "k".into(),
            field: "f".into(),
            fields: vec!["f1".into(), "f2".into()],
            value: "v".into(),
        };
        assert_eq!(Command::parse("ping", payload.clone()).unwrap(), Command::Ping);
        assert_eq!(
            Command::parse("hset", payload.clone()).unwrap(),
            Command::HashSet { key: "k".into(), field: "f".into(), value: "v".into() }
        );
        assert_eq!(
            Command::parse("hgetall", payload.clone()).unwrap(),
            Command::HashGetAll { key: "k".into() }
        );
        assert_eq!(
            Command::parse("hdel", payload).unwrap(),
            Command::HashDelete { key: "k".into(), fields: vec!["f1".into(), "f2".into()] }
        );
    }

    #[test]
    fn test_parse_unknown() {
        // 命令名大小写敏感
        for name in ["foo", "HSET", ""] {
            match Command::parse(name, Payload::default()) {
                Err(GatewayError::UnsupportedCommand(n)) => assert_eq!(n, name),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_name_roundtrip() {
        for name in ["ping", "hset", "hgetall", "hdel"] {
            assert_eq!(Command::parse(name, Payload::default()).unwrap().name(), name);
        }
    }

    #[test]
    fn test_payload_defaults() {
        let p: Payload = serde_json::from_str(r#"{"key": "k"}"#).unwrap();
        assert_eq!(p.key, "k");
        assert!(p.field.is_empty());
        assert!(p.fields.is_empty());
        assert!(p.value.is_empty());
    }
}
