// src/lib.rs
//! crab-gate 库：config / topology / connection / engine / server / monitor

pub mod error;       // 统一错误类型
pub mod config;      // 连接配置
pub mod cli;         // 命令行参数
pub mod topology;    // 拓扑解析（单机 / 集群 / 哨兵）
pub mod connection;  // 按拓扑建立 Redis 连接
pub mod engine;      // 校验 & 命令分发
pub mod server;      // HTTP 层
pub mod monitor;     // 监控计数

pub use config::ConnectionConfig;
pub use error::{GatewayError, Result};
pub use topology::Topology;
