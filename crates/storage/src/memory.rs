//! In-memory storage backend for tests and throwaway sessions.

use std::collections::BTreeMap;
use helpboard_core::SessionId;
use super::{keys, Storage, StorageError, StorageEvent, Result};
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 64;

/// Process-local storage backend. Nothing outlives the value.
pub struct MemoryStorage {
    entries: BTreeMap<String, String>,
    events: broadcast::Sender<StorageEvent>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            entries: BTreeMap::new(),
            events,
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    async fn set(&mut self, origin: &SessionId, key: &str, value: &str) -> Result<()> {
        if !keys::is_valid(key) {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        self.entries.insert(key.to_string(), value.to_string());
        let _ = self.events.send(StorageEvent {
            key: key.to_string(),
            new_value: Some(value.to_string()),
            origin: origin.clone(),
        });
        Ok(())
    }

    async fn remove(&mut self, origin: &SessionId, key: &str) -> Result<()> {
        if self.entries.remove(key).is_some() {
            let _ = self.events.send(StorageEvent {
                key: key.to_string(),
                new_value: None,
                origin: origin.clone(),
            });
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.keys().cloned().collect())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events.subscribe()
    }
}
