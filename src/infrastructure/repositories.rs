//! Marker persistence capability.
//!
//! The core only reads markers and proposes new values; who owns the bytes is
//! the caller's business. The in-memory implementation backs tests and
//! one-shot runs.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::application::errors::StorageError;
use crate::domain::ChangeMarker;

/// Key/value store for per-updater change markers.
///
/// `find_marker` must be a plain read: implementations must not leave a write
/// lock or transaction open when it returns, because a slow network fetch
/// happens between the read and any later `persist_marker`.
#[async_trait]
pub trait MarkerRepository: Send + Sync {
    async fn find_marker(&self, key: &str) -> Result<Option<ChangeMarker>, StorageError>;

    async fn persist_marker(&self, key: &str, marker: &ChangeMarker) -> Result<(), StorageError>;
}

/// Process-local marker store.
#[derive(Default)]
pub struct InMemoryMarkerRepository {
    entries: RwLock<HashMap<String, ChangeMarker>>,
}

impl InMemoryMarkerRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MarkerRepository for InMemoryMarkerRepository {
    async fn find_marker(&self, key: &str) -> Result<Option<ChangeMarker>, StorageError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn persist_marker(&self, key: &str, marker: &ChangeMarker) -> Result<(), StorageError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), marker.clone());
        Ok(())
    }
}
