#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use qlens::config::{Config, QueuesConfig};
use qlens::metrics::MetricsCollector;
use qlens::queues::{KeyInspector, QueueRegistry, StatsAggregator};
use qlens::store::{MemoryStore, StoreClient, StoreResult, StoreValueType};
use qlens::QlensEngine;

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.queues.batch_pause_ms = 0;
    config
}

pub fn setup_store() -> (Arc<MemoryStore>, Arc<dyn StoreClient>) {
    let memory = Arc::new(MemoryStore::new());
    let store: Arc<dyn StoreClient> = memory.clone();
    (memory, store)
}

pub fn setup_registry() -> (Arc<MemoryStore>, Arc<QueueRegistry>) {
    let (memory, store) = setup_store();
    (memory, Arc::new(QueueRegistry::new(store, "bull")))
}

pub fn setup_stats() -> (Arc<MemoryStore>, StatsAggregator) {
    let (memory, _registry, stats) = setup_stats_with_registry(0);
    (memory, stats)
}

pub fn setup_stats_with_registry(batch_pause_ms: u64) -> (Arc<MemoryStore>, Arc<QueueRegistry>, StatsAggregator) {
    let (memory, store) = setup_store();
    let registry = Arc::new(QueueRegistry::new(store.clone(), "bull"));
    let queues = QueuesConfig {
        batch_pause_ms,
        ..QueuesConfig::default()
    };
    let stats = StatsAggregator::new(store, registry.clone(), &queues);
    (memory, registry, stats)
}

pub fn setup_inspector() -> (Arc<MemoryStore>, KeyInspector) {
    let (memory, store) = setup_store();
    (memory, KeyInspector::new(store, "bull", 4))
}

pub fn setup_metrics(history_len: usize) -> (Arc<MemoryStore>, MetricsCollector) {
    let (memory, store) = setup_store();
    let mut config = test_config().metrics;
    config.history_len = history_len;
    (memory, MetricsCollector::new(store, &config))
}

pub fn setup_engine() -> (Arc<MemoryStore>, QlensEngine) {
    let (memory, store) = setup_store();
    (memory, QlensEngine::new(&test_config(), store))
}

/// `bull:orders` with 3 waiting and 1 failed job, plus job records for ids 1..=4.
pub fn seed_orders(memory: &MemoryStore) {
    memory.rpush("bull:orders:waiting", &["1", "2", "3"]);
    memory.zadd("bull:orders:failed", 1_700_000_000_000.0, "4");
    for id in 1..=4 {
        let key = format!("bull:orders:{}", id);
        memory.hset(&key, "name", "send-email");
        memory.hset(&key, "data", &format!(r#"{{"order":{}}}"#, id));
        memory.hset(&key, "timestamp", "1700000000000");
    }
    memory.hset("bull:orders:4", "failedReason", "SMTP timeout");
}

/// Wraps a `MemoryStore` and records how many MEMORY USAGE calls overlap.
/// Each call holds for `hold` so concurrent callers pile up.
pub struct GaugedStore {
    inner: Arc<MemoryStore>,
    hold: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl GaugedStore {
    pub fn new(inner: Arc<MemoryStore>, hold: Duration) -> Self {
        Self {
            inner,
            hold,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoreClient for GaugedStore {
    async fn scan(&self, pattern: &str) -> StoreResult<Vec<String>> {
        self.inner.scan(pattern).await
    }

    async fn key_type(&self, key: &str) -> StoreResult<StoreValueType> {
        self.inner.key_type(key).await
    }

    async fn memory_usage(&self, key: &str) -> StoreResult<Option<u64>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.hold).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.inner.memory_usage(key).await
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        self.inner.exists(key).await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn hlen(&self, key: &str) -> StoreResult<u64> {
        self.inner.hlen(key).await
    }

    async fn hkeys(&self, key: &str) -> StoreResult<Vec<String>> {
        self.inner.hkeys(key).await
    }

    async fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        self.inner.hget(key, field).await
    }

    async fn hmget(&self, key: &str, fields: &[String]) -> StoreResult<Vec<Option<String>>> {
        self.inner.hmget(key, fields).await
    }

    async fn hgetall(&self, key: &str) -> StoreResult<Vec<(String, String)>> {
        self.inner.hgetall(key).await
    }

    async fn llen(&self, key: &str) -> StoreResult<u64> {
        self.inner.llen(key).await
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<String>> {
        self.inner.lrange(key, start, stop).await
    }

    async fn scard(&self, key: &str) -> StoreResult<u64> {
        self.inner.scard(key).await
    }

    async fn smembers(&self, key: &str) -> StoreResult<Vec<String>> {
        self.inner.smembers(key).await
    }

    async fn zcard(&self, key: &str) -> StoreResult<u64> {
        self.inner.zcard(key).await
    }

    async fn zrange_with_scores(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<(String, f64)>> {
        self.inner.zrange_with_scores(key, start, stop).await
    }

    async fn zrevrange(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<String>> {
        self.inner.zrevrange(key, start, stop).await
    }

    async fn info(&self) -> StoreResult<String> {
        self.inner.info().await
    }

    async fn dbsize(&self) -> StoreResult<u64> {
        self.inner.dbsize().await
    }
}
