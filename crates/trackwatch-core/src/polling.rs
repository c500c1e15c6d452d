//! Generic polling loop trait and runner.
//!
//! A processor is driven through `prepare` then `process` once per cycle.
//! Cycle failures (errors and panics alike) are logged and counted; the loop
//! keeps going until the shutdown token fires.

use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::emit;
use crate::metrics::events::{CycleCompleted, CycleOutcome};

/// Result of a single processing iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationResult {
    /// The cycle ran to completion.
    Completed,
    /// The cycle ran to completion, but its side effects were withheld
    /// because the observed state was incomplete.
    Recovering,
}

/// Trait for implementing a polling-based processor.
#[async_trait]
pub trait PollingProcessor: Send {
    /// The state type prepared for each iteration.
    type State: Send;
    /// The error type for this processor.
    type Error: std::error::Error + Send;

    /// Prepare state for a processing iteration.
    ///
    /// `cold_start` is true on the first iteration of the process.
    async fn prepare(&mut self, cold_start: bool) -> Result<Self::State, Self::Error>;

    /// Process the prepared state.
    async fn process(&mut self, state: Self::State) -> Result<IterationResult, Self::Error>;
}

/// Counters describing a finished polling loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollingStats {
    /// Cycles that were started and ran to an outcome.
    pub iterations: u64,
    /// Cycles that ended in an error or a panic.
    pub failures: u64,
}

/// Run one `prepare` + `process` cycle and record its outcome.
pub async fn run_iteration<P: PollingProcessor>(
    processor: &mut P,
    cold_start: bool,
    name: &str,
) -> Result<IterationResult, P::Error> {
    let start = Instant::now();
    debug!(target = name, cold_start, "Starting cycle");

    let result = async {
        let state = processor.prepare(cold_start).await?;
        processor.process(state).await
    }
    .await;

    let outcome = match &result {
        Ok(IterationResult::Completed) => CycleOutcome::Completed,
        Ok(IterationResult::Recovering) => CycleOutcome::Recovering,
        Err(_) => CycleOutcome::Failed,
    };
    emit!(CycleCompleted {
        outcome,
        duration: start.elapsed(),
    });

    result
}

/// Run a polling loop with the given processor.
///
/// 1. Run one cycle (with `cold_start = true` on the first)
/// 2. Log and count a failed or panicking cycle, then carry on
/// 3. Wait for `poll_interval` or the shutdown signal
/// 4. Repeat until shutdown
///
/// Shutdown is observed both while waiting and while a cycle is in flight;
/// an in-flight cycle is abandoned.
pub async fn run_polling_loop<P: PollingProcessor>(
    processor: &mut P,
    poll_interval: Duration,
    shutdown: CancellationToken,
    name: &str,
) -> PollingStats {
    let mut stats = PollingStats::default();
    let mut cold_start = true;

    loop {
        let cycle = AssertUnwindSafe(run_iteration(processor, cold_start, name)).catch_unwind();

        let result = tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!(target = name, "Shutdown requested during cycle");
                break;
            }

            result = cycle => result,
        };

        cold_start = false;
        stats.iterations += 1;

        match result {
            Ok(Ok(IterationResult::Completed)) => {
                debug!(target = name, "Cycle complete");
            }
            Ok(Ok(IterationResult::Recovering)) => {
                debug!(target = name, "Cycle complete while recovering");
            }
            Ok(Err(e)) => {
                stats.failures += 1;
                error!(target = name, error = %e, "Cycle failed");
            }
            Err(panic) => {
                stats.failures += 1;
                emit!(CycleCompleted {
                    outcome: CycleOutcome::Failed,
                    duration: Duration::ZERO,
                });
                error!(
                    target = name,
                    panic = panic_message(panic.as_ref()),
                    "Cycle panicked"
                );
            }
        }

        debug!(
            target = name,
            "Waiting {}s before next poll",
            poll_interval.as_secs()
        );

        if shutdown
            .run_until_cancelled(tokio::time::sleep(poll_interval))
            .await
            .is_none()
        {
            info!(target = name, "Shutdown requested during poll wait");
            break;
        }
    }

    stats
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}
