//! Key/value storage abstraction.
//!
//! Provides a single `StorageProvider` over the local filesystem or an S3
//! bucket. The backend is chosen once, at construction, from a closed
//! `BackendConfig` enum; callers only ever see `get` and `put`.

mod local;
mod s3;

pub use local::LocalConfig;
pub use s3::S3Config;

use bytes::Bytes;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use snafu::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::emit;
use crate::error::{ObjectStoreSnafu, StorageError};
use crate::metrics::events::{RequestStatus, StorageOperation, StorageRequest};

/// A reference-counted storage provider.
pub type StorageProviderRef = Arc<StorageProvider>;

/// Backend selection for a storage provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    Local(LocalConfig),
    S3(S3Config),
}

impl BackendConfig {
    /// Short backend name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            BackendConfig::Local(_) => "filesystem",
            BackendConfig::S3(_) => "s3",
        }
    }
}

/// Storage provider that abstracts over the supported backends.
#[derive(Clone)]
pub struct StorageProvider {
    pub(crate) object_store: Arc<dyn ObjectStore>,
    pub(crate) canonical_url: String,
}

impl std::fmt::Debug for StorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StorageProvider<{}>", self.canonical_url)
    }
}

impl StorageProvider {
    /// Create a storage provider for the given backend.
    pub async fn for_config(config: BackendConfig) -> Result<Self, StorageError> {
        match config {
            BackendConfig::Local(config) => Self::construct_local(config).await,
            BackendConfig::S3(config) => Self::construct_s3(config).await,
        }
    }

    /// Human-readable location of the backend (e.g. `file:///data`).
    pub fn canonical_url(&self) -> &str {
        &self.canonical_url
    }

    /// Get the contents stored under `key`.
    ///
    /// A missing key surfaces as an error for which
    /// [`StorageError::is_not_found`] returns true.
    pub async fn get(&self, key: impl Into<Path>) -> Result<Bytes, StorageError> {
        let path = key.into();
        let start = Instant::now();

        let result = match self.object_store.get(&path).await {
            Ok(response) => response.bytes().await,
            Err(e) => Err(e),
        };

        let status = match &result {
            Ok(_) => RequestStatus::Success,
            Err(object_store::Error::NotFound { .. }) => RequestStatus::NotFound,
            Err(_) => RequestStatus::Error,
        };
        emit!(StorageRequest {
            operation: StorageOperation::Get,
            status,
            duration: start.elapsed(),
        });

        let bytes = result.context(ObjectStoreSnafu)?;
        debug!(%path, bytes = bytes.len(), "Read object");
        Ok(bytes)
    }

    /// Write `bytes` under `key`, replacing any previous value.
    pub async fn put(&self, key: impl Into<Path>, bytes: Vec<u8>) -> Result<(), StorageError> {
        let path = key.into();
        let size = bytes.len();
        let payload = PutPayload::from(Bytes::from(bytes));
        let start = Instant::now();

        let result = self.object_store.put(&path, payload).await;

        let status = if result.is_ok() {
            RequestStatus::Success
        } else {
            RequestStatus::Error
        };
        emit!(StorageRequest {
            operation: StorageOperation::Put,
            status,
            duration: start.elapsed(),
        });

        result.context(ObjectStoreSnafu)?;
        debug!(%path, bytes = size, "Wrote object");
        Ok(())
    }
}
