//! Queue Discovery: finds queue namespaces by scanning `<prefix>:*` and keeps
//! a registry of handles. Entries are never removed; a queue whose keys
//! disappeared simply aggregates to zero.

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;

use crate::queues::handle::QueueHandle;
use crate::queues::QueueError;
use crate::store::StoreClient;

pub struct QueueRegistry {
    store: Arc<dyn StoreClient>,
    prefix: String,
    handles: DashMap<String, Arc<QueueHandle>>,
}

impl QueueRegistry {
    pub fn new(store: Arc<dyn StoreClient>, prefix: &str) -> Self {
        Self {
            store,
            prefix: prefix.to_string(),
            handles: DashMap::new(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Scan the store and return every known queue (not only new ones).
    /// An unreachable store yields an empty set.
    pub async fn discover(&self) -> BTreeSet<String> {
        let pattern = format!("{}:*", self.prefix);
        let keys = match self.store.scan(&pattern).await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!("[Discovery] Scan of '{}' failed: {}", pattern, e);
                return BTreeSet::new();
            }
        };

        let seen: BTreeSet<&str> = keys.iter().filter_map(|key| queue_name_of(key)).collect();
        for name in seen {
            if self.handles.contains_key(name) {
                continue;
            }
            if let Err(e) = self.register(name) {
                tracing::warn!(queue = %name, "[Discovery] Skipping queue: {}", e);
            }
        }

        self.known()
    }

    /// Names of all registered queues
    pub fn known(&self) -> BTreeSet<String> {
        self.handles.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn handle(&self, name: &str) -> Option<Arc<QueueHandle>> {
        self.handles.get(name).map(|h| h.value().clone())
    }

    /// Registered handle for `name`, or a transient one that is not registered.
    /// Only `discover` adds entries.
    pub fn lookup(&self, name: &str) -> Result<Arc<QueueHandle>, QueueError> {
        match self.handle(name) {
            Some(handle) => Ok(handle),
            None => Ok(Arc::new(QueueHandle::new(self.store.clone(), &self.prefix, name)?)),
        }
    }

    fn register(&self, name: &str) -> Result<Arc<QueueHandle>, QueueError> {
        let handle = Arc::new(QueueHandle::new(self.store.clone(), &self.prefix, name)?);
        let handle = self
            .handles
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::info!(queue = %name, "[Discovery] Registered queue");
                handle
            })
            .value()
            .clone();
        Ok(handle)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// Second colon-delimited segment of a key, if non-empty.
pub fn queue_name_of(key: &str) -> Option<&str> {
    key.split(':').nth(1).filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_name_is_second_segment() {
        assert_eq!(queue_name_of("bull:orders:wait"), Some("orders"));
        assert_eq!(queue_name_of("bull:orders"), Some("orders"));
        assert_eq!(queue_name_of("bull::wait"), None);
        assert_eq!(queue_name_of("bull"), None);
    }
}
