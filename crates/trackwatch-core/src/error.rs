//! Common error types shared across trackwatch crates.
//!
//! Storage, configuration and metrics failures live here so both the core
//! runtime and the application crate can name them.

use snafu::prelude::*;

// ============ Storage Errors ============

/// Errors that can occur during storage operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StorageError {
    /// Object store operation failed.
    #[snafu(display("Storage operation failed: {source}"))]
    ObjectStore { source: object_store::Error },

    /// IO error during storage operations.
    #[snafu(display("IO error: {source}"))]
    Io { source: std::io::Error },

    /// S3 configuration error.
    #[snafu(display("S3 configuration error: {source}"))]
    S3Config { source: object_store::Error },
}

impl StorageError {
    /// Check if this error represents a "not found" condition (404, NoSuchKey, missing file).
    pub fn is_not_found(&self) -> bool {
        match self {
            StorageError::ObjectStore { source } => {
                matches!(source, object_store::Error::NotFound { .. })
            }
            StorageError::Io { source } => source.kind() == std::io::ErrorKind::NotFound,
            StorageError::S3Config { .. } => false,
        }
    }
}

// ============ Config Errors ============

/// Errors that can occur while assembling the runtime configuration.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// A required value was neither passed on the command line nor set in the environment.
    #[snafu(display(
        "The argument --{flag} was not provided and the corresponding environment variable {env} was not set"
    ))]
    MissingValue { flag: String, env: String },

    /// Unknown storage backend name.
    #[snafu(display(
        "Invalid storage backend '{value}', the only valid values are: filesystem and s3"
    ))]
    InvalidStorageBackend { value: String },

    /// Failed to read the `.env` file.
    #[snafu(display("Failed to load .env file: {message}"))]
    DotEnv { message: String },

    /// Failed to resolve the working directory used as default storage root.
    #[snafu(display("Failed to resolve current directory: {source}"))]
    CurrentDir { source: std::io::Error },
}

// ============ Metrics Errors ============

/// Errors that can occur during metrics initialization.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MetricsError {
    /// Failed to initialize Prometheus recorder.
    #[snafu(display("Failed to initialize Prometheus recorder"))]
    PrometheusInit {
        source: metrics_exporter_prometheus::BuildError,
    },

    /// Failed to bind the metrics listener.
    #[snafu(display("Failed to bind metrics server to {addr}: {source}"))]
    Bind {
        addr: std::net::SocketAddr,
        source: std::io::Error,
    },

    /// Metrics server already initialized (double-init attempted).
    #[snafu(display("Metrics server already initialized"))]
    AlreadyInitialized,

    /// Failed to parse metrics address.
    #[snafu(display("Failed to parse metrics address '{address}': {source}"))]
    AddressParse {
        address: String,
        source: std::net::AddrParseError,
    },
}
