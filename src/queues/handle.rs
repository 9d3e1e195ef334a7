//! Queue handle: key layout and per-state reads for one queue namespace.
//!
//! Layout: `<prefix>:<queue>:<suffix>`, e.g. `bull:orders:wait`,
//! `bull:orders:failed`, `bull:orders:42` (job record).

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::queues::QueueError;
use crate::store::{StoreClient, StoreResult, StoreValueType};

// ========================================
// JOB STATES
// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Waiting,
    Active,
    Completed,
    Failed,
    Delayed,
}

impl JobState {
    pub const ALL: [JobState; 5] = [
        JobState::Waiting,
        JobState::Active,
        JobState::Completed,
        JobState::Failed,
        JobState::Delayed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Waiting => "waiting",
            JobState::Active => "active",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Delayed => "delayed",
        }
    }

    /// Key suffixes holding this state's job ids.
    /// Waiting jobs of a paused queue are parked under `paused`.
    pub fn key_suffixes(&self) -> &'static [&'static str] {
        match self {
            JobState::Waiting => &["wait", "waiting", "paused"],
            JobState::Active => &["active"],
            JobState::Completed => &["completed"],
            JobState::Failed => &["failed"],
            JobState::Delayed => &["delayed"],
        }
    }
}

impl FromStr for JobState {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobState::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| QueueError::UnknownState(s.to_string()))
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ========================================
// HANDLE
// ========================================

pub struct QueueHandle {
    store: Arc<dyn StoreClient>,
    prefix: String,
    name: String,
}

impl std::fmt::Debug for QueueHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueHandle")
            .field("prefix", &self.prefix)
            .field("name", &self.name)
            .finish()
    }
}

impl QueueHandle {
    /// Fails for names that cannot be used inside a scan pattern.
    pub fn new(store: Arc<dyn StoreClient>, prefix: &str, name: &str) -> Result<Self, QueueError> {
        if name.is_empty() || name.contains(['*', '?', '[', ']', '\\']) {
            return Err(QueueError::InvalidName(name.to_string()));
        }
        Ok(Self {
            store,
            prefix: prefix.to_string(),
            name: name.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> &dyn StoreClient {
        self.store.as_ref()
    }

    pub fn key(&self, suffix: &str) -> String {
        format!("{}:{}:{}", self.prefix, self.name, suffix)
    }

    /// Scan pattern matching every key of this queue
    pub fn key_pattern(&self) -> String {
        self.key("*")
    }

    /// Number of jobs in `state`, summed over the state's existing keys.
    pub async fn count(&self, state: JobState) -> StoreResult<u64> {
        let mut total = 0;
        for suffix in state.key_suffixes() {
            total += cardinality(self.store(), &self.key(suffix)).await?;
        }
        Ok(total)
    }

    /// `meta-paused` marker key, or a truthy `paused` field in the `meta` hash.
    pub async fn is_paused(&self) -> StoreResult<bool> {
        if self.store.exists(&self.key("meta-paused")).await? {
            return Ok(true);
        }
        let meta = self.key("meta");
        if self.store.key_type(&meta).await? != StoreValueType::Hash {
            return Ok(false);
        }
        let flag = self.store.hget(&meta, "paused").await?;
        Ok(matches!(flag.as_deref(), Some("1") | Some("true")))
    }

    /// First existing key holding `state`'s job ids, with its type.
    pub async fn state_key(&self, state: JobState) -> StoreResult<Option<(String, StoreValueType)>> {
        for suffix in state.key_suffixes() {
            let key = self.key(suffix);
            let value_type = self.store.key_type(&key).await?;
            if value_type != StoreValueType::None {
                return Ok(Some((key, value_type)));
            }
        }
        Ok(None)
    }
}

/// Element count using the cardinality command of the key's native type.
pub async fn cardinality(store: &dyn StoreClient, key: &str) -> StoreResult<u64> {
    match store.key_type(key).await? {
        StoreValueType::List => store.llen(key).await,
        StoreValueType::ZSet => store.zcard(key).await,
        StoreValueType::Set => store.scard(key).await,
        StoreValueType::Hash => store.hlen(key).await,
        StoreValueType::String | StoreValueType::None | StoreValueType::Other(_) => Ok(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn job_state_parses_case_insensitively() {
        assert_eq!("Failed".parse::<JobState>().unwrap(), JobState::Failed);
        assert!(matches!(
            "bogus".parse::<JobState>(),
            Err(QueueError::UnknownState(s)) if s == "bogus"
        ));
    }

    #[test]
    fn handle_rejects_pattern_characters() {
        let store: Arc<dyn StoreClient> = Arc::new(MemoryStore::new());
        assert!(QueueHandle::new(store.clone(), "bull", "orders").is_ok());
        assert!(QueueHandle::new(store.clone(), "bull", "").is_err());
        assert!(QueueHandle::new(store, "bull", "ord*rs").is_err());
    }

    #[tokio::test]
    async fn count_uses_native_cardinality() {
        let memory = Arc::new(MemoryStore::new());
        memory.rpush("bull:q:wait", &["1", "2"]);
        memory.zadd("bull:q:completed", 1.0, "3");
        memory.zadd("bull:q:completed", 2.0, "4");
        let handle = QueueHandle::new(memory, "bull", "q").unwrap();

        assert_eq!(handle.count(JobState::Waiting).await.unwrap(), 2);
        assert_eq!(handle.count(JobState::Completed).await.unwrap(), 2);
        assert_eq!(handle.count(JobState::Delayed).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn paused_flag_from_marker_or_meta_hash() {
        let memory = Arc::new(MemoryStore::new());
        let handle = QueueHandle::new(memory.clone(), "bull", "q").unwrap();
        assert!(!handle.is_paused().await.unwrap());

        memory.hset("bull:q:meta", "paused", "1");
        assert!(handle.is_paused().await.unwrap());

        memory.del("bull:q:meta");
        memory.set("bull:q:meta-paused", "1");
        assert!(handle.is_paused().await.unwrap());
    }
}
