//! Storage trait abstraction.

use std::sync::Arc;
use async_trait::async_trait;
use helpboard_core::SessionId;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::{broadcast, Mutex};

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Key contains characters the backend cannot store
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Announcement that a key changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    /// Key that changed
    pub key: String,

    /// New raw value, `None` when the key was removed
    pub new_value: Option<String>,

    /// Session that made the change
    pub origin: SessionId,
}

/// Durable key/value store of JSON documents.
///
/// Values are raw JSON text; use [`load_json`] and [`save_json`] for typed
/// access. Every successful write or removal is published to the
/// receivers handed out by [`Storage::subscribe`].
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read the raw value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key` on behalf of `origin`.
    async fn set(&mut self, origin: &SessionId, key: &str, value: &str) -> Result<()>;

    /// Remove `key` on behalf of `origin`. Removing a missing key is not an error.
    async fn remove(&mut self, origin: &SessionId, key: &str) -> Result<()>;

    /// List every stored key.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Receive change announcements for writes made after this call.
    fn subscribe(&self) -> broadcast::Receiver<StorageEvent>;
}

/// A backend shared by several sessions.
pub type SharedStorage<S> = Arc<Mutex<S>>;

/// Wrap a backend so several sessions can share it.
pub fn shared<S: Storage>(storage: S) -> SharedStorage<S> {
    Arc::new(Mutex::new(storage))
}

/// Read and deserialize the value under `key`.
///
/// A missing key is `Ok(None)`; a value that does not parse is
/// [`StorageError::Json`].
pub async fn load_json<S, T>(storage: &S, key: &str) -> Result<Option<T>>
where
    S: Storage + ?Sized,
    T: DeserializeOwned,
{
    match storage.get(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Serialize `value` and store it under `key`.
pub async fn save_json<S, T>(
    storage: &mut S,
    origin: &SessionId,
    key: &str,
    value: &T,
) -> Result<()>
where
    S: Storage + ?Sized,
    T: Serialize + ?Sized + Sync,
{
    let json = serde_json::to_string(value)?;
    storage.set(origin, key, &json).await
}
