//! Error types for the trackwatch poller.

use snafu::prelude::*;
use std::time::Duration;

use trackwatch_core::retry::{RetryDecision, Retryable};

// Re-export common errors
pub use trackwatch_core::error::{ConfigError, MetricsError, StorageError};

/// Errors from the snapshot store.
///
/// `NotFound` is the only variant that means "no baseline yet"; every other
/// read failure belongs to the retrieval class and stops the cycle.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SnapshotStoreError {
    /// No snapshot is stored under the key.
    #[snafu(display("No snapshot stored under '{key}'"))]
    NotFound { key: String },

    /// Reading the stored snapshot failed.
    #[snafu(display("Failed to retrieve snapshot '{key}': {source}"))]
    Retrieval { key: String, source: StorageError },

    /// The stored snapshot is not valid JSON for a snapshot.
    #[snafu(display("Failed to decode snapshot '{key}': {source}"))]
    Malformed {
        key: String,
        source: serde_json::Error,
    },

    /// Writing the snapshot failed.
    #[snafu(display("Failed to save snapshot '{key}': {source}"))]
    Save { key: String, source: StorageError },

    /// The snapshot could not be serialized.
    #[snafu(display("Failed to encode snapshot '{key}': {source}"))]
    Encode {
        key: String,
        source: serde_json::Error,
    },
}

impl SnapshotStoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SnapshotStoreError::NotFound { .. })
    }
}

/// Errors talking to the playlist API.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum UpstreamError {
    /// The API answered with a non-success status.
    #[snafu(display("{endpoint} request failed with HTTP {status}: {body}"))]
    Status {
        endpoint: &'static str,
        status: u16,
        body: String,
    },

    /// The API answered 429.
    #[snafu(display("{endpoint} request was rate limited (retry after {retry_after:?})"))]
    RateLimited {
        endpoint: &'static str,
        retry_after: Option<Duration>,
    },

    /// The request never produced a response.
    #[snafu(display("{endpoint} request failed: {source}"))]
    Transport {
        endpoint: &'static str,
        source: reqwest::Error,
    },

    /// The response body was not what we expected.
    #[snafu(display("Failed to decode {endpoint} response: {source}"))]
    Decode {
        endpoint: &'static str,
        source: reqwest::Error,
    },

    /// The configured API base cannot carry a path.
    #[snafu(display("Invalid API URL '{url}'"))]
    InvalidUrl { url: String },
}

impl Retryable for UpstreamError {
    fn retry_decision(&self) -> RetryDecision {
        match self {
            UpstreamError::RateLimited { retry_after, .. } => {
                RetryDecision::RateLimited(*retry_after)
            }
            UpstreamError::Status { status, .. } if *status >= 500 => RetryDecision::Backoff,
            UpstreamError::Status { .. } => RetryDecision::Abort,
            UpstreamError::Transport { source, .. } if source.is_builder() => RetryDecision::Abort,
            UpstreamError::Transport { .. } => RetryDecision::Backoff,
            UpstreamError::Decode { .. } | UpstreamError::InvalidUrl { .. } => {
                RetryDecision::Abort
            }
        }
    }
}

/// Errors delivering a message.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DeliveryError {
    /// The send timed out.
    #[snafu(display("Message delivery timed out: {source}"))]
    Timeout { source: reqwest::Error },

    /// The messaging API asked us to back off.
    #[snafu(display("Message delivery was throttled (retry after {retry_after:?})"))]
    Throttled { retry_after: Option<Duration> },

    /// Connection-level failure.
    #[snafu(display("Message delivery failed: {source}"))]
    Network { source: reqwest::Error },

    /// The messaging API refused the message.
    #[snafu(display("Message rejected with HTTP {status}: {description}"))]
    Rejected { status: u16, description: String },

    /// The response body could not be read.
    #[snafu(display("Failed to decode delivery response: {source}"))]
    DeliveryDecode { source: reqwest::Error },
}

impl DeliveryError {
    /// Map a transport error into the timeout or network class.
    pub fn from_transport(source: reqwest::Error) -> Self {
        if source.is_timeout() {
            DeliveryError::Timeout { source }
        } else {
            DeliveryError::Network { source }
        }
    }
}

impl Retryable for DeliveryError {
    fn retry_decision(&self) -> RetryDecision {
        match self {
            DeliveryError::Timeout { .. } => RetryDecision::Backoff,
            DeliveryError::Throttled { retry_after } => RetryDecision::RateLimited(*retry_after),
            DeliveryError::Network { source } if source.is_builder() => RetryDecision::Abort,
            DeliveryError::Network { .. } => RetryDecision::Backoff,
            DeliveryError::Rejected { status, .. } if *status >= 500 => RetryDecision::Backoff,
            DeliveryError::Rejected { .. } => RetryDecision::Abort,
            DeliveryError::DeliveryDecode { .. } => RetryDecision::Abort,
        }
    }
}

/// Errors that abort a reconciliation cycle.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CycleError {
    /// The playlist could not be fetched.
    #[snafu(display("Failed to fetch playlist: {source}"))]
    Fetch { source: UpstreamError },

    /// The stored baseline could not be loaded or initialized.
    #[snafu(display("Failed to load baseline snapshot: {source}"))]
    Baseline { source: SnapshotStoreError },

    /// The fetched snapshot could not be persisted.
    #[snafu(display("Failed to persist snapshot: {source}"))]
    Persist { source: SnapshotStoreError },
}

/// Top-level errors reported by the binary.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum AppError {
    /// Configuration is missing or invalid.
    #[snafu(display("Configuration error: {source}"))]
    Config { source: ConfigError },

    /// The storage backend could not be initialized.
    #[snafu(display("Failed to initialize {backend} storage: {source}"))]
    StorageInit {
        backend: &'static str,
        source: StorageError,
    },

    /// The metrics endpoint could not be started.
    #[snafu(display("Failed to initialize metrics: {source}"))]
    Metrics { source: MetricsError },

    /// The HTTP client could not be built.
    #[snafu(display("Failed to build HTTP client: {source}"))]
    HttpClient { source: reqwest::Error },

    /// A single-shot cycle failed.
    #[snafu(display("Cycle failed: {source}"))]
    Cycle { source: CycleError },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_classification() {
        let err = UpstreamError::RateLimited {
            endpoint: "tracks",
            retry_after: Some(Duration::from_secs(3)),
        };
        assert_eq!(
            err.retry_decision(),
            RetryDecision::RateLimited(Some(Duration::from_secs(3)))
        );

        let err = UpstreamError::Status {
            endpoint: "tracks",
            status: 503,
            body: String::new(),
        };
        assert_eq!(err.retry_decision(), RetryDecision::Backoff);

        let err = UpstreamError::Status {
            endpoint: "tracks",
            status: 404,
            body: "not found".to_string(),
        };
        assert_eq!(err.retry_decision(), RetryDecision::Abort);
    }

    #[test]
    fn test_delivery_classification() {
        let err = DeliveryError::Throttled {
            retry_after: Some(Duration::from_secs(7)),
        };
        assert_eq!(
            err.retry_decision(),
            RetryDecision::RateLimited(Some(Duration::from_secs(7)))
        );

        let err = DeliveryError::Rejected {
            status: 502,
            description: "Bad Gateway".to_string(),
        };
        assert_eq!(err.retry_decision(), RetryDecision::Backoff);

        let err = DeliveryError::Rejected {
            status: 400,
            description: "Bad Request: can't parse entities".to_string(),
        };
        assert_eq!(err.retry_decision(), RetryDecision::Abort);
    }

    #[test]
    fn test_store_not_found() {
        let err = SnapshotStoreError::NotFound {
            key: "Mix.json".to_string(),
        };
        assert!(err.is_not_found());
        assert!(err.to_string().contains("Mix.json"));
    }
}
