//! Job listing for one state of one queue, newest page first for sorted sets.

use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::queues::handle::{JobState, QueueHandle};
use crate::store::{StoreError, StoreResult, StoreValueType};

pub const DEFAULT_JOB_PAGE: usize = 50;
pub const MAX_JOB_PAGE: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub data: Value,
    pub options: Value,
    pub progress: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_on: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_on: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_reason: Option<String>,
}

impl JobSummary {
    /// Build from the fields of a job hash.
    pub fn from_fields(id: String, fields: Vec<(String, String)>) -> Self {
        let mut job = JobSummary {
            id,
            name: None,
            data: Value::Null,
            options: Value::Null,
            progress: Value::Null,
            timestamp: None,
            processed_on: None,
            finished_on: None,
            failed_reason: None,
        };
        for (field, value) in fields {
            match field.as_str() {
                "name" => job.name = Some(value),
                "data" => job.data = parse_json_or_text(value),
                "opts" => job.options = parse_json_or_text(value),
                "progress" => job.progress = parse_json_or_text(value),
                "timestamp" => job.timestamp = value.parse().ok(),
                "processedOn" => job.processed_on = value.parse().ok(),
                "finishedOn" => job.finished_on = value.parse().ok(),
                "failedReason" => job.failed_reason = Some(value),
                _ => {}
            }
        }
        job
    }
}

fn parse_json_or_text(raw: String) -> Value {
    serde_json::from_str(&raw).unwrap_or(Value::String(raw))
}

/// Page of jobs in `state`. Ids whose record hash is gone are skipped.
pub async fn list_jobs(
    handle: &QueueHandle,
    state: JobState,
    offset: usize,
    limit: usize,
    concurrency: usize,
) -> StoreResult<Vec<JobSummary>> {
    let limit = limit.min(MAX_JOB_PAGE);
    if limit == 0 {
        return Ok(Vec::new());
    }
    let ids = job_ids(handle, state, offset, limit).await?;

    let store = handle.store();
    let fetches: Vec<_> = ids
        .into_iter()
        .map(|id| async move {
            let fields = store.hgetall(&handle.key(&id)).await?;
            Ok::<_, StoreError>((!fields.is_empty()).then(|| JobSummary::from_fields(id, fields)))
        })
        .collect();
    let fetched: Vec<StoreResult<Option<JobSummary>>> = stream::iter(fetches)
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut jobs = Vec::with_capacity(fetched.len());
    for job in fetched {
        if let Some(job) = job? {
            jobs.push(job);
        }
    }
    Ok(jobs)
}

async fn job_ids(handle: &QueueHandle, state: JobState, offset: usize, limit: usize) -> StoreResult<Vec<String>> {
    let Some((key, value_type)) = handle.state_key(state).await? else {
        return Ok(Vec::new());
    };
    // Offsets past i64::MAX cannot address any element
    let Ok(start) = i64::try_from(offset) else {
        return Ok(Vec::new());
    };
    let stop = start.saturating_add(limit as i64 - 1);
    let store = handle.store();

    match value_type {
        StoreValueType::List => store.lrange(&key, start, stop).await,
        StoreValueType::ZSet => store.zrevrange(&key, start, stop).await,
        StoreValueType::Set => Ok(store
            .smembers(&key)
            .await?
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect()),
        _ => Ok(Vec::new()),
    }
}
