//! trackwatch-core: Runtime building blocks for the trackwatch poller.
//!
//! - `storage/` - Key/value storage over the local filesystem or S3
//! - `metrics/` - Prometheus metrics infrastructure
//! - `retry` - Bounded retry with rate-limit awareness
//! - `polling` - Generic polling loop trait and runner
//! - `signal` - Signal handling for graceful shutdown
//! - `tracing` - Log subscriber setup
//! - `error` - Common error types

pub mod error;
pub mod metrics;
pub mod polling;
pub mod retry;
pub mod signal;
pub mod storage;
pub mod tracing;

// Re-export commonly used items
pub use crate::error::{ConfigError, MetricsError, StorageError};
pub use crate::metrics::init as init_metrics;
pub use crate::polling::{
    IterationResult, PollingProcessor, PollingStats, run_iteration, run_polling_loop,
};
pub use crate::retry::{RetryDecision, RetryPolicy, Retryable, random_jitter};
pub use crate::signal::{cancel_on_signal, shutdown_signal};
pub use crate::storage::{BackendConfig, LocalConfig, S3Config, StorageProvider, StorageProviderRef};
pub use crate::tracing::init_tracing;
