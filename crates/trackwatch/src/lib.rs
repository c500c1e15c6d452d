//! trackwatch: Watches a Spotify playlist and announces new tracks on Telegram.
//!
//! This crate handles:
//! - Fetching playlist snapshots with a retained pagination cursor
//! - Diffing against the snapshot stored on the filesystem or in S3
//! - Announcing new tracks through the Telegram Bot API

pub mod config;
pub mod diff;
pub mod error;
pub mod model;
pub mod notify;
pub mod reconcile;
pub mod spotify;
pub mod store;

// Re-export commonly used items
pub use config::{CliArgs, Config};
pub use error::{AppError, CycleError, DeliveryError, SnapshotStoreError, UpstreamError};
pub use model::{Item, Snapshot};
pub use reconcile::{CycleReport, Reconciler};
pub use store::SnapshotStore;

pub use trackwatch_core::{StorageProvider, StorageProviderRef, init_metrics, init_tracing};
