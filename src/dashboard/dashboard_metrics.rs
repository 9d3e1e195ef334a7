use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures_util::stream::{self, Stream, StreamExt};
use serde::Serialize;

use crate::dashboard::push::{queue_stats_event, redis_metrics_event, Subscription};
use crate::QlensEngine;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_seconds: u64,
    pub subscribers: usize,
}

pub async fn get_metrics(State(engine): State<QlensEngine>) -> impl IntoResponse {
    Json(engine.metrics.snapshot().await)
}

pub async fn get_health(State(engine): State<QlensEngine>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        uptime_seconds: engine.start_time.elapsed().as_secs(),
        subscribers: engine.push.subscriber_count(),
    })
}

/// SSE stream: current queue stats and store metrics, then whatever the hub broadcasts.
pub async fn events(State(engine): State<QlensEngine>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = engine.push.subscribe();

    let mut initial = Vec::with_capacity(2);
    for event in [queue_stats_event(&engine).await, redis_metrics_event(&engine).await] {
        match event {
            Ok(event) => initial.push(event.to_sse()),
            Err(e) => tracing::error!("[Push] Failed to serialize initial event: {}", e),
        }
    }

    let updates = stream::unfold(subscription, |mut sub: Subscription| async move {
        sub.recv().await.map(|event| (event.to_sse(), sub))
    });

    let stream = stream::iter(initial).chain(updates).map(Ok);
    Sse::new(stream).keep_alive(KeepAlive::default())
}
