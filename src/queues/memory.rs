use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};

use crate::store::StoreClient;
use crate::utils::round2;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
    pub bytes: u64,
    pub megabytes: f64,
}

impl MemoryUsage {
    pub fn from_bytes(bytes: u64) -> Self {
        Self {
            bytes,
            megabytes: round2(bytes as f64 / BYTES_PER_MB),
        }
    }
}

/// Display size of a key, always in KB with two decimals.
pub fn format_size(bytes: u64) -> String {
    format!("{:.2} KB", bytes as f64 / 1024.0)
}

/// MEMORY USAGE for each key, in input order, at most `concurrency` in flight.
/// A failing or missing key counts as 0.
pub async fn measure_keys(store: &dyn StoreClient, keys: &[String], concurrency: usize) -> Vec<u64> {
    let lookups: Vec<_> = keys
        .iter()
        .map(|key| async move {
            match store.memory_usage(key).await {
                Ok(bytes) => bytes.unwrap_or(0),
                Err(e) => {
                    tracing::debug!(key = %key, "[Memory] MEMORY USAGE failed: {}", e);
                    0
                }
            }
        })
        .collect();

    stream::iter(lookups)
        .buffered(concurrency.max(1))
        .collect()
        .await
}
