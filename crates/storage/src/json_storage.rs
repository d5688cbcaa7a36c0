//! JSON file storage implementation.
//!
//! Stores each key as `<key>.json` in the data directory and keeps a small
//! per-key meta marker (version + updated_at) under `meta/`. Change events
//! reach every session holding this instance; separate processes opening
//! the same directory see each other's writes only on their next load.

use std::path::{Path, PathBuf};
use helpboard_core::SessionId;
use super::{keys, Storage, StorageError, StorageEvent, Result};
use tokio::fs;
use tokio::sync::broadcast;
use tracing::debug;

/// Capacity of the change announcement channel.
const EVENT_CAPACITY: usize = 64;

/// File-based JSON storage backend.
pub struct JsonStorage {
    root: PathBuf,
    events: broadcast::Sender<StorageEvent>,
}

impl JsonStorage {
    /// Create storage rooted at `root`, creating the data and meta
    /// directories if needed.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        fs::create_dir_all(&root).await?;
        fs::create_dir_all(root.join("meta")).await?;

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self { root, events })
    }

    /// Directory the data lives in.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of writes recorded for `key` so far.
    pub async fn version(&self, key: &str) -> Result<u64> {
        let path = self.meta_path(checked(key)?);
        match fs::read_to_string(&path).await {
            Ok(s) => {
                let json: serde_json::Value = serde_json::from_str(&s)?;
                Ok(json.get("version").and_then(|v| v.as_u64()).unwrap_or(0))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn value_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", key))
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.root.join("meta").join(format!("{}.meta.json", key))
    }

    /// Read and increment the per-key version, return the new version.
    async fn bump_version(&self, key: &str) -> Result<u64> {
        let version = self.version(key).await? + 1;
        let meta = serde_json::json!({"version": version, "updated_at": chrono::Utc::now()});
        fs::write(self.meta_path(key), serde_json::to_string_pretty(&meta)?.as_bytes()).await?;
        Ok(version)
    }

    fn announce(&self, origin: &SessionId, key: &str, new_value: Option<String>) {
        // No receivers is fine: nobody is listening yet.
        let _ = self.events.send(StorageEvent {
            key: key.to_string(),
            new_value,
            origin: origin.clone(),
        });
    }
}

#[async_trait::async_trait]
impl Storage for JsonStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.value_path(checked(key)?);
        match fs::read_to_string(&path).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&mut self, origin: &SessionId, key: &str, value: &str) -> Result<()> {
        let path = self.value_path(checked(key)?);
        fs::write(&path, value.as_bytes()).await?;

        let version = self.bump_version(key).await?;
        debug!(key, version, origin = %origin, "stored value");

        self.announce(origin, key, Some(value.to_string()));
        Ok(())
    }

    async fn remove(&mut self, origin: &SessionId, key: &str) -> Result<()> {
        let path = self.value_path(checked(key)?);
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        let version = self.bump_version(key).await?;
        debug!(key, version, origin = %origin, "removed value");
        self.announce(origin, key, None);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut rd = fs::read_dir(&self.root).await?;
        while let Some(entry) = rd.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events.subscribe()
    }
}

fn checked(key: &str) -> Result<&str> {
    if keys::is_valid(key) {
        Ok(key)
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{load_json, save_json};

    #[tokio::test]
    async fn set_then_get_round_trips_raw_text() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = JsonStorage::new(dir.path()).await.unwrap();
        let origin = SessionId::generate();

        storage.set(&origin, keys::TASKS, "[]").await.unwrap();

        assert_eq!(storage.get(keys::TASKS).await.unwrap().as_deref(), Some("[]"));
        assert_eq!(storage.get(keys::USERS).await.unwrap(), None);
        assert_eq!(storage.keys().await.unwrap(), vec![keys::TASKS.to_string()]);
    }

    #[tokio::test]
    async fn writes_bump_the_meta_version() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = JsonStorage::new(dir.path()).await.unwrap();
        let origin = SessionId::generate();

        assert_eq!(storage.version(keys::USERS).await.unwrap(), 0);
        save_json(&mut storage, &origin, keys::USERS, &serde_json::json!({})).await.unwrap();
        save_json(&mut storage, &origin, keys::USERS, &serde_json::json!({"a": 1})).await.unwrap();
        assert_eq!(storage.version(keys::USERS).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn writes_are_announced_with_their_origin() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = JsonStorage::new(dir.path()).await.unwrap();
        let mut rx = storage.subscribe();
        let origin = SessionId::from("tab-a");

        storage.set(&origin, keys::NOTIFICATIONS, "[]").await.unwrap();
        storage.remove(&origin, keys::NOTIFICATIONS).await.unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.key, keys::NOTIFICATIONS);
        assert_eq!(first.new_value.as_deref(), Some("[]"));
        assert_eq!(first.origin, origin);
        let second = rx.recv().await.unwrap();
        assert_eq!(second.new_value, None);
    }

    #[tokio::test]
    async fn data_survives_reopening_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let origin = SessionId::generate();
        {
            let mut storage = JsonStorage::new(dir.path()).await.unwrap();
            save_json(&mut storage, &origin, keys::CURRENT_USER_ID, "student1").await.unwrap();
        }
        let storage = JsonStorage::new(dir.path()).await.unwrap();
        let current: Option<String> = load_json(&storage, keys::CURRENT_USER_ID).await.unwrap();
        assert_eq!(current.as_deref(), Some("student1"));
    }

    #[tokio::test]
    async fn malformed_values_surface_as_json_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = JsonStorage::new(dir.path()).await.unwrap();
        storage.set(&SessionId::generate(), keys::TASKS, "{not json").await.unwrap();

        let result: Result<Option<Vec<String>>> = load_json(&storage, keys::TASKS).await;
        assert!(matches!(result, Err(StorageError::Json(_))));
    }

    #[tokio::test]
    async fn path_like_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = JsonStorage::new(dir.path()).await.unwrap();
        let err = storage.set(&SessionId::generate(), "../escape", "1").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn removing_a_missing_key_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = JsonStorage::new(dir.path()).await.unwrap();
        let mut rx = storage.subscribe();

        storage.remove(&SessionId::generate(), keys::TASKS).await.unwrap();

        assert!(rx.try_recv().is_err());
        assert_eq!(storage.version(keys::TASKS).await.unwrap(), 0);
    }
}
