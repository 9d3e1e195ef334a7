//! Key Inspector: every key of one queue, heaviest first, with its value
//! fetched by native type and truncated to a preview.
//!
//! Truncation rules:
//! - hash: more than 100 fields → first 50 fields + `"..."` summary entry
//! - list / set / sorted set: more than 50 items → first 50 + marker item
//! - other types → `<type value>` placeholder

use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::queues::memory::{format_size, measure_keys};
use crate::store::{StoreClient, StoreResult, StoreValueType};

pub const HASH_TRUNCATE_THRESHOLD: u64 = 100;
pub const HASH_PREVIEW_FIELDS: usize = 50;
pub const COLLECTION_PREVIEW_ITEMS: usize = 50;
/// Field name of the synthetic hash summary entry
pub const TRUNCATION_KEY: &str = "...";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyRecord {
    pub key: String,
    #[serde(rename = "type")]
    pub value_type: String,
    pub value: Value,
    pub memory_bytes: u64,
    pub size_formatted: String,
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyListing {
    pub queue_name: String,
    pub total_keys: usize,
    pub keys: Vec<KeyRecord>,
}

/// Normalized result of one per-type handler
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedValue {
    pub value_type: StoreValueType,
    pub value: Value,
    pub truncated: bool,
}

impl FetchedValue {
    fn whole(value_type: StoreValueType, value: Value) -> Self {
        Self { value_type, value, truncated: false }
    }
}

pub struct KeyInspector {
    store: Arc<dyn StoreClient>,
    prefix: String,
    concurrency: usize,
}

impl KeyInspector {
    pub fn new(store: Arc<dyn StoreClient>, prefix: &str, concurrency: usize) -> Self {
        Self {
            store,
            prefix: prefix.to_string(),
            concurrency: concurrency.max(1),
        }
    }

    pub async fn list_keys(&self, queue: &str) -> KeyListing {
        let pattern = format!("{}:{}:*", self.prefix, glob::Pattern::escape(queue));
        let keys = match self.store.scan(&pattern).await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(queue = %queue, "[Inspector] Scan failed: {}", e);
                Vec::new()
            }
        };

        let sizes = measure_keys(self.store.as_ref(), &keys, self.concurrency).await;
        let mut ranked: Vec<(String, u64)> = keys.into_iter().zip(sizes).collect();
        // Stable: equal sizes keep scan order
        ranked.sort_by(|a, b| b.1.cmp(&a.1));

        let fetches: Vec<_> = ranked
            .into_iter()
            .map(|(key, bytes)| self.inspect_key(key, bytes))
            .collect();
        let records: Vec<KeyRecord> = stream::iter(fetches)
            .buffered(self.concurrency)
            .collect()
            .await;

        KeyListing {
            queue_name: queue.to_string(),
            total_keys: records.len(),
            keys: records,
        }
    }

    /// One record; failures end up in `value`, never in the caller.
    pub async fn inspect_key(&self, key: String, memory_bytes: u64) -> KeyRecord {
        let store = self.store.as_ref();
        let (value_type, value, truncated) = match store.key_type(&key).await {
            Err(e) => ("unknown".to_string(), error_value(&e), false),
            Ok(value_type) => match fetch_value(store, &key, value_type.clone()).await {
                Ok(fetched) => (fetched.value_type.to_string(), fetched.value, fetched.truncated),
                Err(e) => {
                    tracing::debug!(key = %key, "[Inspector] Value fetch failed: {}", e);
                    (value_type.to_string(), error_value(&e), false)
                }
            },
        };

        KeyRecord {
            key,
            value_type,
            value,
            memory_bytes,
            size_formatted: format_size(memory_bytes),
            truncated,
        }
    }
}

fn error_value(err: &impl std::fmt::Display) -> Value {
    Value::String(format!("Error: {}", err))
}

fn more_items(omitted: u64) -> Value {
    Value::String(format!("... {} more items", omitted))
}

// ========================================
// PER-TYPE HANDLERS
// ========================================

pub async fn fetch_value(store: &dyn StoreClient, key: &str, value_type: StoreValueType) -> StoreResult<FetchedValue> {
    match value_type {
        StoreValueType::String => fetch_string(store, key).await,
        StoreValueType::Hash => fetch_hash(store, key).await,
        StoreValueType::List => fetch_list(store, key).await,
        StoreValueType::Set => fetch_set(store, key).await,
        StoreValueType::ZSet => fetch_zset(store, key).await,
        StoreValueType::None => Ok(FetchedValue::whole(StoreValueType::None, Value::Null)),
        other => {
            let placeholder = Value::String(format!("<{} value>", other.as_str().to_uppercase()));
            Ok(FetchedValue::whole(other, placeholder))
        }
    }
}

async fn fetch_string(store: &dyn StoreClient, key: &str) -> StoreResult<FetchedValue> {
    let value = store.get(key).await?.map(Value::String).unwrap_or(Value::Null);
    Ok(FetchedValue::whole(StoreValueType::String, value))
}

async fn fetch_hash(store: &dyn StoreClient, key: &str) -> StoreResult<FetchedValue> {
    let len = store.hlen(key).await?;
    let mut map = Map::new();

    if len <= HASH_TRUNCATE_THRESHOLD {
        for (field, value) in store.hgetall(key).await? {
            map.insert(field, Value::String(value));
        }
        return Ok(FetchedValue::whole(StoreValueType::Hash, Value::Object(map)));
    }

    let fields: Vec<String> = store
        .hkeys(key)
        .await?
        .into_iter()
        .take(HASH_PREVIEW_FIELDS)
        .collect();
    let values = store.hmget(key, &fields).await?;
    for (field, value) in fields.into_iter().zip(values) {
        map.insert(field, value.map(Value::String).unwrap_or(Value::Null));
    }
    let omitted = len.saturating_sub(map.len() as u64);
    map.insert(TRUNCATION_KEY.to_string(), Value::String(format!("{} more fields", omitted)));

    Ok(FetchedValue {
        value_type: StoreValueType::Hash,
        value: Value::Object(map),
        truncated: true,
    })
}

async fn fetch_list(store: &dyn StoreClient, key: &str) -> StoreResult<FetchedValue> {
    let len = store.llen(key).await?;
    let limit = COLLECTION_PREVIEW_ITEMS as u64;
    let stop = if len > limit { limit as i64 - 1 } else { -1 };

    let mut items: Vec<Value> = store
        .lrange(key, 0, stop)
        .await?
        .into_iter()
        .map(Value::String)
        .collect();
    let truncated = len > limit;
    if truncated {
        items.push(more_items(len - items.len() as u64));
    }

    Ok(FetchedValue {
        value_type: StoreValueType::List,
        value: Value::Array(items),
        truncated,
    })
}

async fn fetch_set(store: &dyn StoreClient, key: &str) -> StoreResult<FetchedValue> {
    let len = store.scard(key).await?;
    let mut items: Vec<Value> = store
        .smembers(key)
        .await?
        .into_iter()
        .take(COLLECTION_PREVIEW_ITEMS)
        .map(Value::String)
        .collect();
    let truncated = len > COLLECTION_PREVIEW_ITEMS as u64;
    if truncated {
        items.push(more_items(len - items.len() as u64));
    }

    Ok(FetchedValue {
        value_type: StoreValueType::Set,
        value: Value::Array(items),
        truncated,
    })
}

async fn fetch_zset(store: &dyn StoreClient, key: &str) -> StoreResult<FetchedValue> {
    let len = store.zcard(key).await?;
    let limit = COLLECTION_PREVIEW_ITEMS as u64;
    let stop = if len > limit { limit as i64 - 1 } else { -1 };

    let mut items: Vec<Value> = store
        .zrange_with_scores(key, 0, stop)
        .await?
        .into_iter()
        .map(|(member, score)| json!({ "member": member, "score": score }))
        .collect();
    let truncated = len > limit;
    if truncated {
        items.push(more_items(len - items.len() as u64));
    }

    Ok(FetchedValue {
        value_type: StoreValueType::ZSet,
        value: Value::Array(items),
        truncated,
    })
}
