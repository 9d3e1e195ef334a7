//! Queue Statistics Aggregator.
//!
//! Counts and memory accounting are computed concurrently and fail
//! independently: a store that cannot report memory still yields counts, and
//! a failed count batch still yields a (degraded) snapshot.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::QueuesConfig;
use crate::queues::discovery::QueueRegistry;
use crate::queues::handle::{JobState, QueueHandle};
use crate::queues::memory::{measure_keys, MemoryUsage};
use crate::queues::QueueError;
use crate::store::{StoreClient, StoreResult};
use crate::utils::now_rfc3339;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatistics {
    pub name: String,
    pub waiting_count: u64,
    pub active_count: u64,
    pub completed_count: u64,
    pub failed_count: u64,
    pub delayed_count: u64,
    pub paused: bool,
    pub total: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_usage: Option<MemoryUsage>,
    pub last_updated: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Per-state counts in `JobState::ALL` order
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StateCounts {
    pub waiting: u64,
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
    pub delayed: u64,
}

impl StateCounts {
    pub fn total(&self) -> u64 {
        self.waiting + self.active + self.completed + self.failed + self.delayed
    }
}

impl QueueStatistics {
    /// Zero counts, no error: the lightweight listing entry
    pub fn empty(name: &str) -> Self {
        Self::from_counts(name, StateCounts::default(), false)
    }

    pub fn from_counts(name: &str, counts: StateCounts, paused: bool) -> Self {
        Self {
            name: name.to_string(),
            waiting_count: counts.waiting,
            active_count: counts.active,
            completed_count: counts.completed,
            failed_count: counts.failed,
            delayed_count: counts.delayed,
            paused,
            total: counts.total(),
            memory_usage: None,
            last_updated: now_rfc3339(),
            error: None,
            note: None,
        }
    }

    /// All counts zero, carrying the failure
    pub fn degraded(name: &str, error: impl ToString) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::empty(name)
        }
    }

    pub fn counts_sum(&self) -> u64 {
        self.waiting_count + self.active_count + self.completed_count + self.failed_count + self.delayed_count
    }
}

// ========================================
// AGGREGATOR
// ========================================

pub struct StatsAggregator {
    store: Arc<dyn StoreClient>,
    registry: Arc<QueueRegistry>,
    batch_pause: Duration,
    concurrency: usize,
}

impl StatsAggregator {
    pub fn new(store: Arc<dyn StoreClient>, registry: Arc<QueueRegistry>, config: &QueuesConfig) -> Self {
        Self {
            store,
            registry,
            batch_pause: Duration::from_millis(config.batch_pause_ms),
            concurrency: config.key_fetch_concurrency,
        }
    }

    /// Snapshot for one queue; never fails.
    /// Falls back to a store-only reconstruction when no handle can be built.
    pub async fn get_stats(&self, name: &str) -> QueueStatistics {
        match self.registry.lookup(name) {
            Ok(handle) => self.stats_for(&handle).await,
            Err(e) => self.store_only_stats(name, e).await,
        }
    }

    pub async fn stats_for(&self, handle: &QueueHandle) -> QueueStatistics {
        let pattern = handle.key_pattern();
        let (counts, memory_usage) = tokio::join!(
            Self::counts(handle),
            self.memory_usage(&pattern),
        );

        let mut stats = match counts {
            Ok((counts, paused)) => QueueStatistics::from_counts(handle.name(), counts, paused),
            Err(e) => {
                tracing::warn!(queue = %handle.name(), "[Stats] Count batch failed: {}", e);
                QueueStatistics::degraded(handle.name(), e)
            }
        };
        stats.memory_usage = memory_usage;
        stats
    }

    /// Every discovered queue, one at a time with a pause in between.
    pub async fn get_all_stats(&self) -> Vec<QueueStatistics> {
        let names = self.registry.discover().await;
        let mut all = Vec::with_capacity(names.len());

        for (i, name) in names.iter().enumerate() {
            if i > 0 && !self.batch_pause.is_zero() {
                tokio::time::sleep(self.batch_pause).await;
            }
            all.push(self.get_stats(name).await);
        }
        all
    }

    async fn counts(handle: &QueueHandle) -> StoreResult<(StateCounts, bool)> {
        let (waiting, active, completed, failed, delayed, paused) = tokio::try_join!(
            handle.count(JobState::Waiting),
            handle.count(JobState::Active),
            handle.count(JobState::Completed),
            handle.count(JobState::Failed),
            handle.count(JobState::Delayed),
            handle.is_paused(),
        )?;
        let counts = StateCounts {
            waiting,
            active,
            completed,
            failed,
            delayed,
        };
        Ok((counts, paused))
    }

    /// Sum of MEMORY USAGE over keys matching `pattern`; None if the scan fails.
    async fn memory_usage(&self, pattern: &str) -> Option<MemoryUsage> {
        let keys = match self.store.scan(pattern).await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!("[Stats] Memory scan of '{}' failed: {}", pattern, e);
                return None;
            }
        };
        let sizes = measure_keys(self.store.as_ref(), &keys, self.concurrency).await;
        Some(MemoryUsage::from_bytes(sizes.iter().sum()))
    }

    async fn store_only_stats(&self, name: &str, reason: QueueError) -> QueueStatistics {
        tracing::warn!(queue = %name, "[Stats] No queue handle, store-only stats: {}", reason);
        let pattern = format!(
            "{}:{}:*",
            self.registry.prefix(),
            glob::Pattern::escape(name)
        );
        let mut stats = QueueStatistics::empty(name);
        stats.memory_usage = self.memory_usage(&pattern).await;
        stats.note = Some(format!(
            "Queue handle unavailable ({}); counts not computed, showing store data only",
            reason
        ));
        stats
    }
}
