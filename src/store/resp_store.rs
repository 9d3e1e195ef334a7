//! RespStore: StoreClient over a lazily (re)connected RESP connection.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::config::StoreConfig;
use crate::store::connection::RespConnection;
use crate::store::protocol::{bytes_to_text, RespCommand, RespValue};
use crate::store::{StoreClient, StoreError, StoreResult, StoreValueType};

pub struct RespStore {
    config: StoreConfig,
    conn: Mutex<Option<RespConnection>>,
}

impl RespStore {
    /// Does not connect; the first command does.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            conn: Mutex::new(None),
        }
    }

    async fn connection(&self) -> StoreResult<RespConnection> {
        let mut guard = self.conn.lock().await;
        if let Some(conn) = guard.as_ref() {
            if !conn.is_closed() {
                return Ok(conn.clone());
            }
            tracing::debug!("[Store] Connection lost, reconnecting");
        }
        let conn = RespConnection::connect(&self.config).await?;
        *guard = Some(conn.clone());
        Ok(conn)
    }

    async fn call<I, S>(&self, args: I) -> StoreResult<RespValue>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        let conn = self.connection().await?;
        conn.call(RespCommand::new(args)).await
    }

    async fn call_integer(&self, args: &[&str]) -> StoreResult<u64> {
        let reply = self.call(args).await?;
        match reply.as_integer() {
            Some(n) => Ok(n.max(0) as u64),
            None => Err(unexpected(args, &reply)),
        }
    }

    async fn call_strings(&self, args: &[&str]) -> StoreResult<Vec<String>> {
        let reply = self.call(args).await?;
        into_strings(args, reply)
    }
}

// ========================================
// REPLY HELPERS
// ========================================

fn unexpected(args: &[&str], reply: &RespValue) -> StoreError {
    StoreError::UnexpectedReply {
        command: args.first().map(|c| c.to_uppercase()).unwrap_or_default(),
        reply: format!("{:?}", reply),
    }
}

fn into_strings(args: &[&str], reply: RespValue) -> StoreResult<Vec<String>> {
    let items = match reply {
        RespValue::Array(items) => items,
        RespValue::Null => return Ok(Vec::new()),
        other => return Err(unexpected(args, &other)),
    };
    Ok(items.iter().filter_map(RespValue::as_text).collect())
}

/// Key names from a SCAN page. Names that are not valid UTF-8 are skipped:
/// a rendered form could not be used to address them again.
fn into_keys(args: &[&str], reply: RespValue) -> StoreResult<Vec<String>> {
    let items = match reply {
        RespValue::Array(items) => items,
        RespValue::Null => return Ok(Vec::new()),
        other => return Err(unexpected(args, &other)),
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            RespValue::Simple(s) => Some(s),
            RespValue::Bulk(b) => match std::str::from_utf8(&b) {
                Ok(s) => Some(s.to_string()),
                Err(_) => {
                    tracing::debug!("[Store] Skipping binary key {}", bytes_to_text(&b));
                    None
                }
            },
            _ => None,
        })
        .collect())
}

fn into_pairs(args: &[&str], reply: RespValue) -> StoreResult<Vec<(String, String)>> {
    let flat = into_strings(args, reply)?;
    Ok(flat
        .chunks_exact(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect())
}

fn range_args(start: i64, stop: i64) -> (String, String) {
    (start.to_string(), stop.to_string())
}

#[async_trait]
impl StoreClient for RespStore {
    async fn scan(&self, pattern: &str) -> StoreResult<Vec<String>> {
        let count = self.config.scan_count.max(1).to_string();
        let mut cursor = "0".to_string();
        let mut keys = Vec::new();

        loop {
            let args = ["SCAN", cursor.as_str(), "MATCH", pattern, "COUNT", count.as_str()];
            let reply = self.call(args).await?;
            let mut parts = reply
                .clone()
                .into_array()
                .filter(|parts| parts.len() == 2)
                .ok_or_else(|| unexpected(&args, &reply))?;
            let page = parts.pop().unwrap_or(RespValue::Null);
            let next = parts.pop().and_then(|c| c.as_text()).unwrap_or_else(|| "0".to_string());

            keys.extend(into_keys(&args, page)?);
            if next == "0" {
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once across pages
        let mut seen = HashSet::with_capacity(keys.len());
        keys.retain(|key| seen.insert(key.clone()));
        Ok(keys)
    }

    async fn key_type(&self, key: &str) -> StoreResult<StoreValueType> {
        let args = ["TYPE", key];
        let reply = self.call(args).await?;
        match reply.as_text() {
            Some(name) => Ok(StoreValueType::from_type_name(&name)),
            None => Err(unexpected(&args, &reply)),
        }
    }

    async fn memory_usage(&self, key: &str) -> StoreResult<Option<u64>> {
        let args = ["MEMORY", "USAGE", key];
        let reply = self.call(args).await?;
        if reply.is_null() {
            return Ok(None);
        }
        match reply.as_integer() {
            Some(n) => Ok(Some(n.max(0) as u64)),
            None => Err(unexpected(&args, &reply)),
        }
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.call_integer(&["EXISTS", key]).await? > 0)
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.call(["GET", key]).await?.as_text())
    }

    async fn hlen(&self, key: &str) -> StoreResult<u64> {
        self.call_integer(&["HLEN", key]).await
    }

    async fn hkeys(&self, key: &str) -> StoreResult<Vec<String>> {
        self.call_strings(&["HKEYS", key]).await
    }

    async fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        Ok(self.call(["HGET", key, field]).await?.as_text())
    }

    async fn hmget(&self, key: &str, fields: &[String]) -> StoreResult<Vec<Option<String>>> {
        if fields.is_empty() {
            return Ok(Vec::new());
        }
        let mut args = vec!["HMGET", key];
        args.extend(fields.iter().map(String::as_str));
        let reply = self.call(&args).await?;
        match reply {
            RespValue::Array(items) => Ok(items.iter().map(RespValue::as_text).collect()),
            other => Err(unexpected(&args, &other)),
        }
    }

    async fn hgetall(&self, key: &str) -> StoreResult<Vec<(String, String)>> {
        let args = ["HGETALL", key];
        let reply = self.call(args).await?;
        into_pairs(&args, reply)
    }

    async fn llen(&self, key: &str) -> StoreResult<u64> {
        self.call_integer(&["LLEN", key]).await
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<String>> {
        let (start, stop) = range_args(start, stop);
        self.call_strings(&["LRANGE", key, start.as_str(), stop.as_str()]).await
    }

    async fn scard(&self, key: &str) -> StoreResult<u64> {
        self.call_integer(&["SCARD", key]).await
    }

    async fn smembers(&self, key: &str) -> StoreResult<Vec<String>> {
        self.call_strings(&["SMEMBERS", key]).await
    }

    async fn zcard(&self, key: &str) -> StoreResult<u64> {
        self.call_integer(&["ZCARD", key]).await
    }

    async fn zrange_with_scores(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<(String, f64)>> {
        let (start, stop) = range_args(start, stop);
        let args = ["ZRANGE", key, start.as_str(), stop.as_str(), "WITHSCORES"];
        let reply = self.call(args).await?;
        Ok(into_pairs(&args, reply)?
            .into_iter()
            .map(|(member, score)| {
                let score = score.parse().unwrap_or(0.0);
                (member, score)
            })
            .collect())
    }

    async fn zrevrange(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<String>> {
        let (start, stop) = range_args(start, stop);
        self.call_strings(&["ZREVRANGE", key, start.as_str(), stop.as_str()]).await
    }

    async fn info(&self) -> StoreResult<String> {
        let args = ["INFO"];
        let reply = self.call(args).await?;
        reply.as_text().ok_or_else(|| unexpected(&args, &reply))
    }

    async fn dbsize(&self) -> StoreResult<u64> {
        self.call_integer(&["DBSIZE"]).await
    }
}
