//! Local filesystem storage backend implementation.

use object_store::ObjectStore;
use object_store::local::LocalFileSystem;
use snafu::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{IoSnafu, ObjectStoreSnafu, StorageError};

use super::StorageProvider;

/// Local filesystem configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalConfig {
    /// Directory under which every key is stored.
    pub root: PathBuf,
}

impl LocalConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl StorageProvider {
    pub(super) async fn construct_local(config: LocalConfig) -> Result<Self, StorageError> {
        // No-op when the directory already exists
        tokio::fs::create_dir_all(&config.root)
            .await
            .context(IoSnafu)?;

        let object_store: Arc<dyn ObjectStore> =
            Arc::new(LocalFileSystem::new_with_prefix(&config.root).context(ObjectStoreSnafu)?);

        let canonical_url = format!("file://{}", config.root.display());

        Ok(Self {
            object_store,
            canonical_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_creates_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("nested").join("state");
        assert!(!root.exists());

        StorageProvider::construct_local(LocalConfig::new(&root))
            .await
            .unwrap();

        assert!(root.is_dir());
    }

    #[tokio::test]
    async fn test_existing_root_is_reused() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("keep.json"), b"{}").unwrap();

        let storage = StorageProvider::construct_local(LocalConfig::new(temp_dir.path()))
            .await
            .unwrap();

        let bytes = storage.get("keep.json").await.unwrap();
        assert_eq!(bytes.as_ref(), b"{}");
    }
}
