use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::dashboard::error::ApiError;
use crate::queues::{list_jobs, JobState, QueueStatistics, DEFAULT_JOB_PAGE};
use crate::QlensEngine;

#[derive(Debug, Default, Deserialize)]
pub struct JobsQuery {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

/// Queue names with zeroed counts; the dashboard loads details per queue.
pub async fn get_queues(State(engine): State<QlensEngine>) -> impl IntoResponse {
    let names = engine.registry.discover().await;
    let queues: Vec<QueueStatistics> = names.iter().map(|name| QueueStatistics::empty(name)).collect();
    Json(queues)
}

pub async fn get_queue(
    State(engine): State<QlensEngine>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    Json(engine.stats.get_stats(&name).await)
}

pub async fn get_queue_keys(
    State(engine): State<QlensEngine>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    Json(engine.inspector.list_keys(&name).await)
}

pub async fn get_queue_jobs(
    State(engine): State<QlensEngine>,
    Path((name, status)): Path<(String, String)>,
    query: Result<Query<JobsQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let state: JobState = status.parse()?;
    let Query(query) = query?;

    let handle = match engine.registry.handle(&name) {
        Some(handle) => handle,
        None => {
            engine.registry.discover().await;
            engine
                .registry
                .handle(&name)
                .ok_or_else(|| ApiError::NotFound(format!("Queue '{}' not found", name)))?
        }
    };

    let offset = query.offset.unwrap_or(0);
    let limit = query.limit.unwrap_or(DEFAULT_JOB_PAGE);
    let jobs = match list_jobs(&handle, state, offset, limit, engine.key_fetch_concurrency).await {
        Ok(jobs) => jobs,
        Err(e) => {
            tracing::warn!(queue = %name, state = %state, "[Jobs] Listing failed: {}", e);
            Vec::new()
        }
    };
    Ok(Json(jobs))
}
