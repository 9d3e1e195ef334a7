//! Metrics Collector: store-wide snapshot with rolling history.
//!
//! Always safe to poll: a failing or slow store yields a zeroed snapshot
//! (histories untouched) instead of an error.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time;

use crate::config::MetricsConfig;
use crate::metrics::info::{info_f64, info_u64, keyspace_keys, parse_info, InfoMap};
use crate::metrics::rate::RateState;
use crate::store::{StoreClient, StoreError, StoreResult};
use crate::utils::{now_rfc3339, now_secs_f64, round2};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub cpu_percent: f64,
    pub cpu_history: Vec<f64>,
    pub memory_used: u64,
    pub memory_max: u64,
    pub memory_percent: f64,
    pub memory_history: Vec<f64>,
    pub timestamps: Vec<String>,
    pub connected_clients: u64,
    pub total_keys: u64,
    #[serde(rename = "totalKeysSizeMB")]
    pub total_keys_size_mb: f64,
    pub keyspace_hits: u64,
    pub keyspace_misses: u64,
}

// ========================================
// HISTORY WINDOW
// ========================================

/// Three series that always move together
#[derive(Debug)]
struct History {
    cpu: VecDeque<f64>,
    memory: VecDeque<f64>,
    timestamps: VecDeque<String>,
    max_len: usize,
}

impl History {
    fn new(max_len: usize) -> Self {
        let max_len = max_len.max(1);
        Self {
            cpu: VecDeque::with_capacity(max_len + 1),
            memory: VecDeque::with_capacity(max_len + 1),
            timestamps: VecDeque::with_capacity(max_len + 1),
            max_len,
        }
    }

    fn push(&mut self, cpu: f64, memory: f64, timestamp: String) {
        self.cpu.push_back(cpu);
        self.memory.push_back(memory);
        self.timestamps.push_back(timestamp);
        while self.cpu.len() > self.max_len {
            self.cpu.pop_front();
            self.memory.pop_front();
            self.timestamps.pop_front();
        }
    }

    fn fill(&self, snapshot: &mut MetricsSnapshot) {
        snapshot.cpu_history = self.cpu.iter().copied().collect();
        snapshot.memory_history = self.memory.iter().copied().collect();
        snapshot.timestamps = self.timestamps.iter().cloned().collect();
    }
}

struct CollectorState {
    rate: RateState,
    history: History,
}

// ========================================
// COLLECTOR
// ========================================

pub struct MetricsCollector {
    store: Arc<dyn StoreClient>,
    timeout_ms: u64,
    state: Mutex<CollectorState>,
}

impl MetricsCollector {
    pub fn new(store: Arc<dyn StoreClient>, config: &MetricsConfig) -> Self {
        Self {
            store,
            timeout_ms: config.timeout_ms,
            state: Mutex::new(CollectorState {
                rate: RateState::new(),
                history: History::new(config.history_len),
            }),
        }
    }

    pub async fn snapshot(&self) -> MetricsSnapshot {
        let report = match self.bounded(self.store.info()).await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!("[Metrics] Status report unavailable: {}", e);
                return self.zeroed();
            }
        };
        let info = parse_info(&report);

        let total_keys = match self.bounded(self.store.dbsize()).await {
            Ok(n) => n,
            Err(e) => {
                tracing::debug!("[Metrics] DBSIZE failed ({}), using keyspace section", e);
                keyspace_keys(&info)
            }
        };

        self.record(&info, total_keys, now_secs_f64(), now_rfc3339())
    }

    /// Well-formed snapshot with zero values and the current history
    pub fn zeroed(&self) -> MetricsSnapshot {
        let mut snapshot = MetricsSnapshot::default();
        self.state.lock().history.fill(&mut snapshot);
        snapshot
    }

    async fn bounded<T>(&self, fut: impl Future<Output = StoreResult<T>>) -> StoreResult<T> {
        time::timeout(Duration::from_millis(self.timeout_ms), fut)
            .await
            .map_err(|_| StoreError::Timeout(self.timeout_ms))?
    }

    /// Derive one snapshot from a parsed report and advance rate state and history.
    fn record(&self, info: &InfoMap, total_keys: u64, now_secs: f64, timestamp: String) -> MetricsSnapshot {
        let memory_used = info_u64(info, "used_memory");
        let memory_max = match info_u64(info, "maxmemory") {
            0 => info_u64(info, "total_system_memory"),
            max => max,
        };
        let memory_percent = if memory_max > 0 {
            round2(memory_used as f64 / memory_max as f64 * 100.0)
        } else {
            0.0
        };

        let mut state = self.state.lock();
        let cpu_percent = round2(state.rate.cpu_percent(
            info_f64(info, "used_cpu_sys"),
            info_f64(info, "used_cpu_user"),
            now_secs,
        ));
        state.history.push(cpu_percent, memory_percent, timestamp);

        let mut snapshot = MetricsSnapshot {
            cpu_percent,
            memory_used,
            memory_max,
            memory_percent,
            connected_clients: info_u64(info, "connected_clients"),
            total_keys,
            total_keys_size_mb: round2(info_u64(info, "used_memory_dataset") as f64 / BYTES_PER_MB),
            keyspace_hits: info_u64(info, "keyspace_hits"),
            keyspace_misses: info_u64(info, "keyspace_misses"),
            ..Default::default()
        };
        state.history.fill(&mut snapshot);
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn collector(history_len: usize) -> MetricsCollector {
        let config = MetricsConfig {
            timeout_ms: 500,
            history_len,
        };
        MetricsCollector::new(Arc::new(MemoryStore::new()), &config)
    }

    fn report(cpu_sys: f64, cpu_user: f64) -> InfoMap {
        parse_info(&format!(
            "used_memory:250\r\nmaxmemory:1000\r\nused_cpu_sys:{}\r\nused_cpu_user:{}\r\nused_memory_dataset:2097152\r\n",
            cpu_sys, cpu_user
        ))
    }

    #[test]
    fn history_is_bounded_and_in_lockstep() {
        let collector = collector(3);
        for i in 0..10 {
            let snapshot = collector.record(&report(i as f64, 0.0), 0, 100.0 + i as f64, format!("t{}", i));
            assert_eq!(snapshot.cpu_history.len(), snapshot.memory_history.len());
            assert_eq!(snapshot.cpu_history.len(), snapshot.timestamps.len());
            assert!(snapshot.timestamps.len() <= 3);
        }
        let last = collector.zeroed();
        assert_eq!(last.timestamps, vec!["t7", "t8", "t9"]);
    }

    #[test]
    fn derives_memory_and_cpu_percentages() {
        let collector = collector(5);
        let first = collector.record(&report(1.0, 1.0), 7, 10.0, "a".into());
        assert_eq!(first.cpu_percent, 0.0);
        assert_eq!(first.memory_percent, 25.0);
        assert_eq!(first.total_keys, 7);
        assert_eq!(first.total_keys_size_mb, 2.0);

        let second = collector.record(&report(1.5, 1.5), 7, 12.0, "b".into());
        assert_eq!(second.cpu_percent, 50.0);
    }

    #[test]
    fn memory_max_falls_back_to_system_memory() {
        let collector = collector(5);
        let info = parse_info("used_memory:50\r\nmaxmemory:0\r\ntotal_system_memory:200\r\n");
        let snapshot = collector.record(&info, 0, 1.0, "a".into());
        assert_eq!(snapshot.memory_max, 200);
        assert_eq!(snapshot.memory_percent, 25.0);

        let none = collector.record(&parse_info("used_memory:50\r\n"), 0, 2.0, "b".into());
        assert_eq!(none.memory_percent, 0.0);
    }
}
