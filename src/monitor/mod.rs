// src/monitor/mod.rs
//! 监控模块：命令计数，供 `/metrics` 输出
mod metrics;

use std::sync::atomic::{AtomicU64, Ordering};
use dashmap::DashMap;

pub use metrics::Metrics;
