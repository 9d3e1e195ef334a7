//! Push channel: fans dashboard events out to connected SSE subscribers.
//!
//! Each subscriber owns a bounded channel. Broadcasts use `try_send`, so a
//! slow subscriber misses events instead of stalling everyone else, and a
//! closed one is dropped from the registry.

use std::sync::Arc;
use std::time::Duration;

use axum::response::sse::Event;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::QlensEngine;

pub const QUEUE_STATS_EVENT: &str = "queueStats";
pub const REDIS_METRICS_EVENT: &str = "redisMetrics";

/// A named event with its payload already serialized once for all subscribers
#[derive(Debug, Clone, PartialEq)]
pub struct PushEvent {
    pub name: &'static str,
    pub data: Arc<str>,
}

impl PushEvent {
    pub fn new<T: Serialize>(name: &'static str, payload: &T) -> Result<Self, serde_json::Error> {
        let data = serde_json::to_string(payload)?;
        Ok(Self { name, data: data.into() })
    }

    pub fn to_sse(&self) -> Event {
        Event::default().event(self.name).data(self.data.as_ref())
    }
}

type Subscribers = Arc<DashMap<Uuid, mpsc::Sender<PushEvent>>>;

pub struct PushHub {
    subscribers: Subscribers,
    channel_capacity: usize,
}

/// Receiving half of one subscription.
/// Unregisters from the hub when dropped (RAII).
pub struct Subscription {
    id: Uuid,
    rx: mpsc::Receiver<PushEvent>,
    subscribers: Subscribers,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<PushEvent> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.subscribers.remove(&self.id);
        tracing::debug!(subscriber = %self.id, "[Push] Subscriber disconnected");
    }
}

impl PushHub {
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(DashMap::new()),
            channel_capacity: channel_capacity.max(1),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        self.subscribers.insert(id, tx);
        tracing::debug!(subscriber = %id, "[Push] Subscriber connected");
        Subscription {
            id,
            rx,
            subscribers: self.subscribers.clone(),
        }
    }

    /// Deliver to every subscriber without waiting; returns how many accepted it.
    pub fn broadcast(&self, event: &PushEvent) -> usize {
        let mut delivered = 0;
        self.subscribers.retain(|id, tx| match tx.try_send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::debug!(subscriber = %id, "[Push] Buffer full, dropping '{}'", event.name);
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

// ========================================
// EVENT BUILDERS
// ========================================

pub async fn queue_stats_event(engine: &QlensEngine) -> Result<PushEvent, serde_json::Error> {
    let stats = engine.stats.get_all_stats().await;
    PushEvent::new(QUEUE_STATS_EVENT, &stats)
}

pub async fn redis_metrics_event(engine: &QlensEngine) -> Result<PushEvent, serde_json::Error> {
    let metrics = engine.metrics.snapshot().await;
    PushEvent::new(REDIS_METRICS_EVENT, &metrics)
}

/// Broadcast fresh stats and metrics every `period` while anyone listens.
pub fn spawn_push_loop(engine: QlensEngine, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        interval.tick().await; // Skip first immediate tick
        loop {
            interval.tick().await;
            if engine.push.subscriber_count() == 0 {
                continue;
            }
            for event in [queue_stats_event(&engine).await, redis_metrics_event(&engine).await] {
                match event {
                    Ok(event) => {
                        engine.push.broadcast(&event);
                    }
                    Err(e) => tracing::error!("[Push] Failed to serialize event: {}", e),
                }
            }
        }
    })
}
