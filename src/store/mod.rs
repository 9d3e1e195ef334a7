//! Store Client Adapter: everything above this module talks to the key-value
//! store through the `StoreClient` trait.
//!
//! - `RespStore`: production backend over a pipelined RESP connection
//! - `MemoryStore`: in-process backend with failure injection (tests, demos)

pub mod connection;
pub mod memory;
pub mod protocol;
pub mod resp_store;

pub use connection::RespConnection;
pub use memory::MemoryStore;
pub use resp_store::RespStore;

use async_trait::async_trait;

use crate::store::protocol::ParseError;

// ========================================
// ERRORS
// ========================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("operation timed out after {0} ms")]
    Timeout(u64),

    #[error("connection closed")]
    Disconnected,

    #[error("server error: {0}")]
    Server(String),

    #[error("protocol error: {0}")]
    Protocol(#[from] ParseError),

    #[error("unexpected reply to {command}: {reply}")]
    UnexpectedReply { command: String, reply: String },

    #[error("key '{0}' is unavailable")]
    KeyFailure(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

// ========================================
// VALUE TYPES
// ========================================

/// Native type of a stored key, as reported by `TYPE`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StoreValueType {
    String,
    Hash,
    List,
    Set,
    ZSet,
    /// Key does not exist (anymore)
    None,
    Other(String),
}

impl StoreValueType {
    pub fn from_type_name(name: &str) -> Self {
        match name {
            "string" => Self::String,
            "hash" => Self::Hash,
            "list" => Self::List,
            "set" => Self::Set,
            "zset" => Self::ZSet,
            "none" => Self::None,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::String => "string",
            Self::Hash => "hash",
            Self::List => "list",
            Self::Set => "set",
            Self::ZSet => "zset",
            Self::None => "none",
            Self::Other(name) => name,
        }
    }
}

impl std::fmt::Display for StoreValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ========================================
// CLIENT TRAIT
// ========================================

/// Read-only primitives used by discovery, aggregation, inspection and metrics.
///
/// Range arguments follow the store's native semantics: inclusive bounds,
/// negative indexes count from the end.
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// All keys matching a glob pattern (cursor-based, never blocking the store)
    async fn scan(&self, pattern: &str) -> StoreResult<Vec<String>>;

    async fn key_type(&self, key: &str) -> StoreResult<StoreValueType>;

    /// Bytes used by the key and its value; None when the key is gone
    async fn memory_usage(&self, key: &str) -> StoreResult<Option<u64>>;

    async fn exists(&self, key: &str) -> StoreResult<bool>;

    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    async fn hlen(&self, key: &str) -> StoreResult<u64>;
    async fn hkeys(&self, key: &str) -> StoreResult<Vec<String>>;
    async fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>>;
    async fn hmget(&self, key: &str, fields: &[String]) -> StoreResult<Vec<Option<String>>>;
    async fn hgetall(&self, key: &str) -> StoreResult<Vec<(String, String)>>;

    async fn llen(&self, key: &str) -> StoreResult<u64>;
    async fn lrange(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<String>>;

    async fn scard(&self, key: &str) -> StoreResult<u64>;
    async fn smembers(&self, key: &str) -> StoreResult<Vec<String>>;

    async fn zcard(&self, key: &str) -> StoreResult<u64>;
    /// Ascending by score
    async fn zrange_with_scores(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<(String, f64)>>;
    /// Descending by score
    async fn zrevrange(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<String>>;

    /// Free-text status report (`INFO`)
    async fn info(&self) -> StoreResult<String>;

    /// Key count of the selected database
    async fn dbsize(&self) -> StoreResult<u64>;
}
