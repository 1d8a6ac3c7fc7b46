// tests/common/mod.rs

//! 测试用的内存连接工厂：
//! - 记录 acquire / release 次数，用来断言“不建连”和“必释放”
//! - 可切换为不可达，或让每条命令都返回指定错误
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};

use crab_gate::connection::{ConnectionFactory, StoreConnection};
use crab_gate::error::{GatewayError, Result};

#[derive(Default)]
pub struct MemoryState {
    pub hashes: Mutex<HashMap<String, HashMap<String, String>>>,
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
    pub unreachable: AtomicBool,
    pub fail_with: Mutex<Option<String>>,
}

#[derive(Clone, Default)]
pub struct MemoryConnector {
    pub state: Arc<MemoryState>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        MemoryConnector::default()
    }

    pub fn unreachable() -> Self {
        let connector = MemoryConnector::default();
        connector.state.unreachable.store(true, Ordering::SeqCst);
        connector
    }

    pub fn failing(message: &str) -> Self {
        let connector = MemoryConnector::default();
        *connector.state.fail_with.lock().unwrap() = Some(message.to_string());
        connector
    }

    pub fn acquired(&self) -> usize {
        self.state.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.state.released.load(Ordering::SeqCst)
    }
}

impl ConnectionFactory for MemoryConnector {
    type Connection = MemoryConnection;

    async fn acquire(&self) -> Result<MemoryConnection> {
        self.state.acquired.fetch_add(1, Ordering::SeqCst);
        if self.state.unreachable.load(Ordering::SeqCst) {
            return Err(GatewayError::connection("connection refused"));
        }
        Ok(MemoryConnection {
            state: self.state.clone(),
        })
    }
}

pub struct MemoryConnection {
    state: Arc<MemoryState>,
}

impl MemoryConnection {
    fn check(&self) -> Result<()> {
        match self.state.fail_with.lock().unwrap().as_ref() {
            Some(message) => Err(GatewayError::Store(message.clone())),
            None => Ok(()),
        }
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.state.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl StoreConnection for MemoryConnection {
    async fn ping(&mut self) -> Result<String> {
        self.check()?;
        Ok("PONG".into())
    }

    async fn hset(&mut self, key: &str, field: &str, value: &str) -> Result<bool> {
        self.check()?;
        let mut hashes = self.state.hashes.lock().unwrap();
        let prev = hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(prev.is_none())
    }

    async fn hgetall(&mut self, key: &str) -> Result<HashMap<String, String>> {
        self.check()?;
        let hashes = self.state.hashes.lock().unwrap();
        Ok(hashes.get(key).cloned().unwrap_or_default())
    }

    async fn hdel(&mut self, key: &str, fields: &[String]) -> Result<i64> {
        self.check()?;
        let mut hashes = self.state.hashes.lock().unwrap();
        let Some(hash) = hashes.get_mut(key) else {
            return Ok(0);
        };
        let removed = fields.iter().filter(|f| hash.remove(f.as_str()).is_some()).count();
        if hash.is_empty() {
            hashes.remove(key);
        }
        Ok(removed as i64)
    }
}
