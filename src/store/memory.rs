//! MemoryStore: in-process StoreClient.
//! Keeps keys ordered (scan order is deterministic) and lets tests inject
//! failures: the whole store offline, one key failing entirely, or one key
//! failing only its value reads.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::store::{StoreClient, StoreError, StoreResult, StoreValueType};

/// Fixed per-key and per-element overheads used by the memory estimate
const KEY_OVERHEAD_BYTES: u64 = 48;
const ELEMENT_OVERHEAD_BYTES: u64 = 16;

#[derive(Debug, Clone, PartialEq)]
pub enum MemoryValue {
    String(String),
    /// Fields in insertion order
    Hash(Vec<(String, String)>),
    List(Vec<String>),
    /// Members in insertion order
    Set(Vec<String>),
    /// Kept sorted by score, then member
    ZSet(Vec<(String, f64)>),
}

impl MemoryValue {
    fn value_type(&self) -> StoreValueType {
        match self {
            MemoryValue::String(_) => StoreValueType::String,
            MemoryValue::Hash(_) => StoreValueType::Hash,
            MemoryValue::List(_) => StoreValueType::List,
            MemoryValue::Set(_) => StoreValueType::Set,
            MemoryValue::ZSet(_) => StoreValueType::ZSet,
        }
    }

    fn estimated_bytes(&self) -> u64 {
        let elements: u64 = match self {
            MemoryValue::String(s) => s.len() as u64,
            MemoryValue::Hash(fields) => fields
                .iter()
                .map(|(f, v)| (f.len() + v.len()) as u64 + ELEMENT_OVERHEAD_BYTES)
                .sum(),
            MemoryValue::List(items) | MemoryValue::Set(items) => items
                .iter()
                .map(|i| i.len() as u64 + ELEMENT_OVERHEAD_BYTES)
                .sum(),
            MemoryValue::ZSet(items) => items
                .iter()
                .map(|(m, _)| m.len() as u64 + 8 + ELEMENT_OVERHEAD_BYTES)
                .sum(),
        };
        KEY_OVERHEAD_BYTES + elements
    }
}

const DEFAULT_INFO: &str = "# Server\r\nredis_version:7.2.0\r\n\r\n# Clients\r\nconnected_clients:1\r\n\r\n# Memory\r\nused_memory:1048576\r\nused_memory_dataset:524288\r\nmaxmemory:0\r\ntotal_system_memory:8388608\r\n\r\n# Stats\r\nkeyspace_hits:0\r\nkeyspace_misses:0\r\n\r\n# CPU\r\nused_cpu_sys:0.000000\r\nused_cpu_user:0.000000\r\n";

pub struct MemoryStore {
    data: RwLock<BTreeMap<String, MemoryValue>>,
    info: RwLock<String>,
    offline: AtomicBool,
    failing_keys: RwLock<HashSet<String>>,
    failing_values: RwLock<HashSet<String>>,
    failing_memory: RwLock<HashSet<String>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            info: RwLock::new(DEFAULT_INFO.to_string()),
            offline: AtomicBool::new(false),
            failing_keys: RwLock::new(HashSet::new()),
            failing_values: RwLock::new(HashSet::new()),
            failing_memory: RwLock::new(HashSet::new()),
        }
    }

    // ========================================
    // WRITES (seeding)
    // ========================================

    pub fn set(&self, key: &str, value: &str) {
        self.data.write().insert(key.to_string(), MemoryValue::String(value.to_string()));
    }

    pub fn hset(&self, key: &str, field: &str, value: &str) {
        let mut data = self.data.write();
        let entry = data
            .entry(key.to_string())
            .or_insert_with(|| MemoryValue::Hash(Vec::new()));
        if let MemoryValue::Hash(fields) = entry {
            match fields.iter_mut().find(|(f, _)| f == field) {
                Some(existing) => existing.1 = value.to_string(),
                None => fields.push((field.to_string(), value.to_string())),
            }
        }
    }

    pub fn rpush(&self, key: &str, values: &[&str]) {
        let mut data = self.data.write();
        let entry = data
            .entry(key.to_string())
            .or_insert_with(|| MemoryValue::List(Vec::new()));
        if let MemoryValue::List(items) = entry {
            items.extend(values.iter().map(|v| v.to_string()));
        }
    }

    pub fn sadd(&self, key: &str, members: &[&str]) {
        let mut data = self.data.write();
        let entry = data
            .entry(key.to_string())
            .or_insert_with(|| MemoryValue::Set(Vec::new()));
        if let MemoryValue::Set(items) = entry {
            for member in members {
                if !items.iter().any(|m| m == member) {
                    items.push(member.to_string());
                }
            }
        }
    }

    pub fn zadd(&self, key: &str, score: f64, member: &str) {
        let mut data = self.data.write();
        let entry = data
            .entry(key.to_string())
            .or_insert_with(|| MemoryValue::ZSet(Vec::new()));
        if let MemoryValue::ZSet(items) = entry {
            items.retain(|(m, _)| m != member);
            items.push((member.to_string(), score));
            items.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        }
    }

    pub fn del(&self, key: &str) -> bool {
        self.data.write().remove(key).is_some()
    }

    pub fn set_info(&self, report: &str) {
        *self.info.write() = report.to_string();
    }

    // ========================================
    // FAILURE INJECTION
    // ========================================

    /// Every call fails as if the store were unreachable
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Every call touching `key` fails, including TYPE and MEMORY USAGE
    pub fn fail_key(&self, key: &str) {
        self.failing_keys.write().insert(key.to_string());
    }

    /// Value reads of `key` fail; TYPE and MEMORY USAGE still answer
    pub fn fail_values(&self, key: &str) {
        self.failing_values.write().insert(key.to_string());
    }

    /// Only MEMORY USAGE of `key` fails
    pub fn fail_memory(&self, key: &str) {
        self.failing_memory.write().insert(key.to_string());
    }

    // ========================================
    // INTERNAL
    // ========================================

    fn check_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("memory store is offline".to_string()));
        }
        Ok(())
    }

    fn check_key(&self, key: &str) -> StoreResult<()> {
        self.check_online()?;
        if self.failing_keys.read().contains(key) {
            return Err(StoreError::KeyFailure(key.to_string()));
        }
        Ok(())
    }

    fn read_value(&self, key: &str) -> StoreResult<Option<MemoryValue>> {
        self.check_key(key)?;
        if self.failing_values.read().contains(key) {
            return Err(StoreError::KeyFailure(key.to_string()));
        }
        Ok(self.data.read().get(key).cloned())
    }

    fn wrong_type(key: &str) -> StoreError {
        StoreError::Server(format!(
            "WRONGTYPE Operation against a key holding the wrong kind of value ({})",
            key
        ))
    }
}

/// Resolve inclusive, possibly negative, range bounds to a slice range.
fn resolve_range(len: usize, start: i64, stop: i64) -> Option<std::ops::Range<usize>> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some(start as usize..stop as usize + 1)
}

#[async_trait]
impl StoreClient for MemoryStore {
    async fn scan(&self, pattern: &str) -> StoreResult<Vec<String>> {
        self.check_online()?;
        let pattern = glob::Pattern::new(pattern)
            .map_err(|e| StoreError::Server(format!("ERR invalid pattern: {}", e)))?;
        Ok(self
            .data
            .read()
            .keys()
            .filter(|k| pattern.matches(k))
            .cloned()
            .collect())
    }

    async fn key_type(&self, key: &str) -> StoreResult<StoreValueType> {
        self.check_key(key)?;
        Ok(self
            .data
            .read()
            .get(key)
            .map(MemoryValue::value_type)
            .unwrap_or(StoreValueType::None))
    }

    async fn memory_usage(&self, key: &str) -> StoreResult<Option<u64>> {
        self.check_key(key)?;
        if self.failing_memory.read().contains(key) {
            return Err(StoreError::KeyFailure(key.to_string()));
        }
        Ok(self.data.read().get(key).map(MemoryValue::estimated_bytes))
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        self.check_key(key)?;
        Ok(self.data.read().contains_key(key))
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        match self.read_value(key)? {
            Some(MemoryValue::String(s)) => Ok(Some(s)),
            Some(_) => Err(Self::wrong_type(key)),
            None => Ok(None),
        }
    }

    async fn hlen(&self, key: &str) -> StoreResult<u64> {
        self.check_key(key)?;
        match self.data.read().get(key) {
            Some(MemoryValue::Hash(fields)) => Ok(fields.len() as u64),
            Some(_) => Err(Self::wrong_type(key)),
            None => Ok(0),
        }
    }

    async fn hkeys(&self, key: &str) -> StoreResult<Vec<String>> {
        Ok(self.hgetall(key).await?.into_iter().map(|(f, _)| f).collect())
    }

    async fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        Ok(self
            .hgetall(key)
            .await?
            .into_iter()
            .find(|(f, _)| f == field)
            .map(|(_, v)| v))
    }

    async fn hmget(&self, key: &str, fields: &[String]) -> StoreResult<Vec<Option<String>>> {
        let all = self.hgetall(key).await?;
        Ok(fields
            .iter()
            .map(|wanted| all.iter().find(|(f, _)| f == wanted).map(|(_, v)| v.clone()))
            .collect())
    }

    async fn hgetall(&self, key: &str) -> StoreResult<Vec<(String, String)>> {
        match self.read_value(key)? {
            Some(MemoryValue::Hash(fields)) => Ok(fields),
            Some(_) => Err(Self::wrong_type(key)),
            None => Ok(Vec::new()),
        }
    }

    async fn llen(&self, key: &str) -> StoreResult<u64> {
        self.check_key(key)?;
        match self.data.read().get(key) {
            Some(MemoryValue::List(items)) => Ok(items.len() as u64),
            Some(_) => Err(Self::wrong_type(key)),
            None => Ok(0),
        }
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<String>> {
        match self.read_value(key)? {
            Some(MemoryValue::List(items)) => Ok(resolve_range(items.len(), start, stop)
                .map(|range| items[range].to_vec())
                .unwrap_or_default()),
            Some(_) => Err(Self::wrong_type(key)),
            None => Ok(Vec::new()),
        }
    }

    async fn scard(&self, key: &str) -> StoreResult<u64> {
        self.check_key(key)?;
        match self.data.read().get(key) {
            Some(MemoryValue::Set(items)) => Ok(items.len() as u64),
            Some(_) => Err(Self::wrong_type(key)),
            None => Ok(0),
        }
    }

    async fn smembers(&self, key: &str) -> StoreResult<Vec<String>> {
        match self.read_value(key)? {
            Some(MemoryValue::Set(items)) => Ok(items),
            Some(_) => Err(Self::wrong_type(key)),
            None => Ok(Vec::new()),
        }
    }

    async fn zcard(&self, key: &str) -> StoreResult<u64> {
        self.check_key(key)?;
        match self.data.read().get(key) {
            Some(MemoryValue::ZSet(items)) => Ok(items.len() as u64),
            Some(_) => Err(Self::wrong_type(key)),
            None => Ok(0),
        }
    }

    async fn zrange_with_scores(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<(String, f64)>> {
        match self.read_value(key)? {
            Some(MemoryValue::ZSet(items)) => Ok(resolve_range(items.len(), start, stop)
                .map(|range| items[range].to_vec())
                .unwrap_or_default()),
            Some(_) => Err(Self::wrong_type(key)),
            None => Ok(Vec::new()),
        }
    }

    async fn zrevrange(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<String>> {
        match self.read_value(key)? {
            Some(MemoryValue::ZSet(mut items)) => {
                items.reverse();
                Ok(resolve_range(items.len(), start, stop)
                    .map(|range| items[range].iter().map(|(m, _)| m.clone()).collect())
                    .unwrap_or_default())
            }
            Some(_) => Err(Self::wrong_type(key)),
            None => Ok(Vec::new()),
        }
    }

    async fn info(&self) -> StoreResult<String> {
        self.check_online()?;
        Ok(self.info.read().clone())
    }

    async fn dbsize(&self) -> StoreResult<u64> {
        self.check_online()?;
        Ok(self.data.read().len() as u64)
    }
}
