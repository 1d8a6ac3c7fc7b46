// src/engine/validate.rs

//! 请求体校验：纯函数，不做任何 I/O

use thiserror::Error;

use super::command::Payload;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("'key' attribute cannot be found in payload")]
    MissingKey,
    #[error("'field' attribute cannot be found in payload")]
    MissingField,
    #[error("'value' attribute cannot be found in payload")]
    MissingValue,
    #[error("'fields' attribute is empty in payload")]
    EmptyFields,
}

/// 按命令校验请求体，第一个不满足的规则生效。
/// ping 与未知命令不做校验，未知命令留给分发层拒绝。
pub fn validate(command: &str, payload: &Payload) -> Result<(), ValidationError> {
    match command {
        "hset" => {
            require(&payload.key, ValidationError::MissingKey)?;
            require(&payload.field, ValidationError::MissingField)?;
            require(&payload.value, ValidationError::MissingValue)
        }
        "hgetall" => require(&payload.key, ValidationError::MissingKey),
        "hdel" => {
            require(&payload.key, ValidationError::MissingKey)?;
            if payload.fields.is_empty() {
                return Err(ValidationError::EmptyFields);
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn require(value: &str, err: ValidationError) -> Result<(), ValidationError> {
    if value.is_empty() { Err(err) } else { Ok(()) }
}
