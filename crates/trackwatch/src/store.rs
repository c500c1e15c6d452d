//! Snapshot persistence on top of the storage provider.

use snafu::prelude::*;
use tracing::info;

use trackwatch_core::storage::StorageProviderRef;

use crate::error::{
    EncodeSnafu, MalformedSnafu, NotFoundSnafu, RetrievalSnafu, SaveSnafu, SnapshotStoreError,
};
use crate::model::Snapshot;

/// Reads and writes snapshots as pretty-printed JSON documents.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    storage: StorageProviderRef,
}

impl SnapshotStore {
    pub fn new(storage: StorageProviderRef) -> Self {
        Self { storage }
    }

    /// Load the snapshot stored under `key`.
    pub async fn get(&self, key: &str) -> Result<Snapshot, SnapshotStoreError> {
        let bytes = match self.storage.get(key).await {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => return NotFoundSnafu { key }.fail(),
            Err(e) => return Err(e).context(RetrievalSnafu { key }),
        };

        let snapshot: Snapshot = serde_json::from_slice(&bytes).context(MalformedSnafu { key })?;
        info!(
            key,
            location = self.storage.canonical_url(),
            tracks = snapshot.tracks.len(),
            "Retrieved stored snapshot"
        );
        Ok(snapshot)
    }

    /// Overwrite the snapshot stored under `key` and return what was written.
    pub async fn put(&self, key: &str, snapshot: Snapshot) -> Result<Snapshot, SnapshotStoreError> {
        let bytes = serde_json::to_vec_pretty(&snapshot).context(EncodeSnafu { key })?;
        self.storage
            .put(key, bytes)
            .await
            .context(SaveSnafu { key })?;

        info!(
            key,
            location = self.storage.canonical_url(),
            tracks = snapshot.tracks.len(),
            "Stored snapshot"
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Item;
    use std::sync::Arc;
    use tempfile::TempDir;
    use trackwatch_core::storage::{BackendConfig, LocalConfig, StorageProvider};

    async fn store(dir: &TempDir) -> SnapshotStore {
        let provider =
            StorageProvider::for_config(BackendConfig::Local(LocalConfig::new(dir.path())))
                .await
                .unwrap();
        SnapshotStore::new(Arc::new(provider))
    }

    fn snapshot() -> Snapshot {
        Snapshot {
            id: "p1".to_string(),
            name: "Mix".to_string(),
            external_link: "https://open.spotify.com/playlist/p1".to_string(),
            tracks: vec![Item {
                item_id: "t1".to_string(),
                title: "Song".to_string(),
                artist_names: vec!["Artist".to_string()],
                external_link: "https://open.spotify.com/track/t1".to_string(),
                added_by_id: Some("u1".to_string()),
            }],
        }
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir).await;

        let written = store.put("Mix.json", snapshot()).await.unwrap();
        assert_eq!(written, snapshot());

        let read = store.get("Mix.json").await.unwrap();
        assert_eq!(read, snapshot());
    }

    #[tokio::test]
    async fn test_written_document_is_pretty_json() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir).await;

        store.put("Mix.json", snapshot()).await.unwrap();

        let raw = std::fs::read_to_string(temp_dir.path().join("Mix.json")).unwrap();
        assert!(raw.contains('\n'));
        assert!(raw.contains("\"item_id\": \"t1\""));
    }

    #[tokio::test]
    async fn test_absent_key_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir).await;

        let err = store.get("Missing.json").await.unwrap_err();
        assert!(err.is_not_found(), "expected NotFound, got {err}");
    }

    #[tokio::test]
    async fn test_corrupt_document_is_not_not_found() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("Mix.json"), b"{ not json").unwrap();
        let store = store(&temp_dir).await;

        let err = store.get("Mix.json").await.unwrap_err();
        assert!(!err.is_not_found());
        assert!(matches!(err, SnapshotStoreError::Malformed { .. }));
    }
}
