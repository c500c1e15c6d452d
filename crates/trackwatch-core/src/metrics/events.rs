//! Internal events for trackwatch metrics emission.
//!
//! Each event struct represents a measurable occurrence in a reconciliation
//! cycle. Events implement the `InternalEvent` trait which records the
//! corresponding Prometheus metric and leaves a `trace!` breadcrumb.

use metrics::{counter, gauge, histogram};
use std::time::Duration;
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

// ============================================================================
// Cycle events
// ============================================================================

/// Outcome of one reconciliation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Cycle finished and notifications (if any) were attempted.
    Completed,
    /// Cycle finished but notifications were suppressed (partial fetch).
    Recovering,
    /// Cycle aborted on a fetch or storage error.
    Failed,
}

impl CycleOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleOutcome::Completed => "completed",
            CycleOutcome::Recovering => "recovering",
            CycleOutcome::Failed => "failed",
        }
    }
}

/// Event emitted when a reconciliation cycle ends.
pub struct CycleCompleted {
    pub outcome: CycleOutcome,
    pub duration: Duration,
}

impl InternalEvent for CycleCompleted {
    fn emit(self) {
        trace!(
            outcome = self.outcome.as_str(),
            duration_ms = self.duration.as_millis(),
            "Cycle completed"
        );
        counter!("trackwatch_cycles_total", "outcome" => self.outcome.as_str()).increment(1);
        histogram!("trackwatch_cycle_duration_seconds").record(self.duration.as_secs_f64());
    }
}

/// Event emitted after a snapshot has been fetched.
pub struct TracksFetched {
    pub count: usize,
    pub offset: u64,
}

impl InternalEvent for TracksFetched {
    fn emit(self) {
        trace!(count = self.count, offset = self.offset, "Tracks fetched");
        counter!("trackwatch_tracks_fetched_total").increment(self.count as u64);
        gauge!("trackwatch_fetch_offset").set(self.offset as f64);
    }
}

/// Event emitted when the differencer found new tracks.
pub struct NewTracksDetected {
    pub count: usize,
}

impl InternalEvent for NewTracksDetected {
    fn emit(self) {
        trace!(count = self.count, "New tracks detected");
        counter!("trackwatch_new_tracks_total").increment(self.count as u64);
    }
}

// ============================================================================
// Upstream and delivery events
// ============================================================================

/// Event emitted for every HTTP request to the playlist API.
pub struct UpstreamRequest {
    pub endpoint: &'static str,
    pub status: u16,
    pub duration: Duration,
}

impl InternalEvent for UpstreamRequest {
    fn emit(self) {
        trace!(
            endpoint = self.endpoint,
            status = self.status,
            duration_ms = self.duration.as_millis(),
            "Upstream request"
        );
        counter!(
            "trackwatch_upstream_requests_total",
            "endpoint" => self.endpoint,
            "status" => self.status.to_string()
        )
        .increment(1);
        histogram!("trackwatch_upstream_request_duration_seconds", "endpoint" => self.endpoint)
            .record(self.duration.as_secs_f64());
    }
}

/// Reason a retry was scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    RateLimited,
    Backoff,
}

impl RetryReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetryReason::RateLimited => "rate_limited",
            RetryReason::Backoff => "backoff",
        }
    }
}

/// Event emitted when the retry policy schedules another attempt.
pub struct RetryScheduled {
    pub operation: &'static str,
    pub reason: RetryReason,
    pub delay: Duration,
}

impl InternalEvent for RetryScheduled {
    fn emit(self) {
        trace!(
            operation = self.operation,
            reason = self.reason.as_str(),
            delay_ms = self.delay.as_millis(),
            "Retry scheduled"
        );
        counter!(
            "trackwatch_retries_total",
            "operation" => self.operation,
            "reason" => self.reason.as_str()
        )
        .increment(1);
    }
}

/// Status of a single notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationStatus {
    Sent,
    Failed,
    Suppressed,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Sent => "sent",
            NotificationStatus::Failed => "failed",
            NotificationStatus::Suppressed => "suppressed",
        }
    }
}

/// Event emitted for notification outcomes.
pub struct NotificationsProcessed {
    pub status: NotificationStatus,
    pub count: usize,
}

impl InternalEvent for NotificationsProcessed {
    fn emit(self) {
        trace!(
            status = self.status.as_str(),
            count = self.count,
            "Notifications processed"
        );
        counter!("trackwatch_notifications_total", "status" => self.status.as_str())
            .increment(self.count as u64);
    }
}

// ============================================================================
// Storage operation events
// ============================================================================

/// Storage operation types.
#[derive(Debug, Clone, Copy)]
pub enum StorageOperation {
    Get,
    Put,
}

impl StorageOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageOperation::Get => "get",
            StorageOperation::Put => "put",
        }
    }
}

/// Request status for storage operations.
#[derive(Debug, Clone, Copy)]
pub enum RequestStatus {
    Success,
    NotFound,
    Error,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Success => "success",
            RequestStatus::NotFound => "not_found",
            RequestStatus::Error => "error",
        }
    }
}

/// Event emitted for each storage request.
pub struct StorageRequest {
    pub operation: StorageOperation,
    pub status: RequestStatus,
    pub duration: Duration,
}

impl InternalEvent for StorageRequest {
    fn emit(self) {
        trace!(
            operation = self.operation.as_str(),
            status = self.status.as_str(),
            duration_ms = self.duration.as_millis(),
            "Storage request"
        );
        counter!(
            "trackwatch_storage_requests_total",
            "operation" => self.operation.as_str(),
            "status" => self.status.as_str()
        )
        .increment(1);
        histogram!(
            "trackwatch_storage_request_duration_seconds",
            "operation" => self.operation.as_str()
        )
        .record(self.duration.as_secs_f64());
    }
}
