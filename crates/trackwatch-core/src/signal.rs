//! Signal handling for graceful shutdown.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Wait for a shutdown signal (SIGINT, SIGTERM, or SIGQUIT on Unix).
#[cfg(unix)]
pub async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let (Ok(mut sigint), Ok(mut sigterm), Ok(mut sigquit)) = (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
        signal(SignalKind::quit()),
    ) else {
        warn!("Failed to install unix signal handlers, falling back to ctrl-c");
        ctrl_c().await;
        return;
    };

    tokio::select! {
        _ = sigint.recv() => {
            info!(message = "Signal received.", signal = "SIGINT");
        }
        _ = sigterm.recv() => {
            info!(message = "Signal received.", signal = "SIGTERM");
        }
        _ = sigquit.recv() => {
            info!(message = "Signal received.", signal = "SIGQUIT");
        }
    }
}

/// Wait for ctrl-c on platforms without unix signals.
#[cfg(not(unix))]
pub async fn shutdown_signal() {
    ctrl_c().await;
}

async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!(message = "Signal received.", signal = "ctrl-c"),
        Err(e) => {
            warn!(error = %e, "Failed to listen for ctrl-c, shutdown only via process kill");
            std::future::pending::<()>().await;
        }
    }
}

/// Spawn a task that cancels `shutdown` when a shutdown signal arrives.
pub fn cancel_on_signal(shutdown: CancellationToken) {
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.cancel();
    });
}

#[cfg(test)]
mod tests {
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_cancellation_propagates_through_clones() {
        let original = CancellationToken::new();
        let for_loop = original.clone();
        let for_server = for_loop.clone();

        assert!(!for_loop.is_cancelled());
        original.cancel();

        assert!(for_loop.is_cancelled());
        assert!(for_server.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancellation_wakes_waiting_task() {
        let shutdown = CancellationToken::new();
        let waiter = shutdown.clone();

        let handle = tokio::spawn(async move {
            waiter
                .run_until_cancelled(tokio::time::sleep(Duration::from_secs(10)))
                .await
                .is_none()
        });

        shutdown.cancel();

        let interrupted = tokio::time::timeout(Duration::from_millis(500), handle)
            .await
            .expect("task should complete quickly")
            .expect("task should not panic");

        assert!(interrupted);
    }
}
