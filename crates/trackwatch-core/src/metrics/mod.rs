//! Metrics and observability infrastructure.
//!
//! - `events`: Internal event types and the `InternalEvent` trait
//! - `server`: Prometheus recorder and optional HTTP endpoint

pub mod events;
pub mod server;

pub use server::{init, parse_address};

/// Macro for emitting metric events.
///
/// Calls `InternalEvent::emit()` on the given event, which records the
/// corresponding Prometheus metric. Without an installed recorder the
/// metric calls are no-ops.
///
/// ```ignore
/// use trackwatch_core::emit;
/// use trackwatch_core::metrics::events::NewTracksDetected;
///
/// emit!(NewTracksDetected { count: 2 });
/// ```
#[macro_export]
macro_rules! emit {
    ($event:expr) => {
        $crate::metrics::events::InternalEvent::emit($event)
    };
}

pub use emit;
