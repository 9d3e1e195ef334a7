pub mod config;
pub mod dashboard;
pub mod metrics;
pub mod queues;
pub mod store;
pub mod utils;

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::dashboard::push::{spawn_push_loop, PushHub};
use crate::metrics::MetricsCollector;
use crate::queues::{KeyInspector, QueueRegistry, StatsAggregator};
use crate::store::StoreClient;

// ========================================
// ENGINE
// ========================================

/// Every service the dashboard needs, sharing one store client.
/// Cheap to clone (all fields are Arcs or Copy).
#[derive(Clone)]
pub struct QlensEngine {
    pub store: Arc<dyn StoreClient>,
    pub registry: Arc<QueueRegistry>,
    pub stats: Arc<StatsAggregator>,
    pub inspector: Arc<KeyInspector>,
    pub metrics: Arc<MetricsCollector>,
    pub push: Arc<PushHub>,
    pub key_fetch_concurrency: usize,
    pub start_time: Instant,
}

impl QlensEngine {
    pub fn new(config: &Config, store: Arc<dyn StoreClient>) -> Self {
        let queues = &config.queues;
        let registry = Arc::new(QueueRegistry::new(store.clone(), &queues.prefix));

        Self {
            stats: Arc::new(StatsAggregator::new(store.clone(), registry.clone(), queues)),
            inspector: Arc::new(KeyInspector::new(store.clone(), &queues.prefix, queues.key_fetch_concurrency)),
            metrics: Arc::new(MetricsCollector::new(store.clone(), &config.metrics)),
            push: Arc::new(PushHub::new(config.push.channel_capacity)),
            key_fetch_concurrency: queues.key_fetch_concurrency.max(1),
            start_time: Instant::now(),
            registry,
            store,
        }
    }

    /// Starts periodic pushes when an interval is configured.
    pub fn start_background_tasks(&self, config: &Config) {
        if config.push.interval_ms > 0 {
            let period = Duration::from_millis(config.push.interval_ms);
            spawn_push_loop(self.clone(), period);
            tracing::info!("[Push] Periodic push every {} ms", config.push.interval_ms);
        }
    }
}
