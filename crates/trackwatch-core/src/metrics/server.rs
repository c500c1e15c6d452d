//! Prometheus recorder and HTTP endpoint.
//!
//! The recorder is installed once per process. When an address is
//! configured, `/metrics` and `/health` are served from a background task.

use axum::{Extension, Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use snafu::prelude::*;
use std::net::SocketAddr;
use std::sync::OnceLock;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::error::{
    AddressParseSnafu, AlreadyInitializedSnafu, BindSnafu, MetricsError, PrometheusInitSnafu,
};

/// Histogram buckets for duration metrics (in seconds).
///
/// Cycles can include rate-limit sleeps, so the tail reaches several minutes.
const DURATION_BUCKETS: &[f64] = &[
    0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0,
];

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Parse a `host:port` metrics address.
pub fn parse_address(address: &str) -> Result<SocketAddr, MetricsError> {
    address.parse().context(AddressParseSnafu { address })
}

/// Bind `addr`, install the Prometheus recorder and serve it in the
/// background.
///
/// Returns the bound address, which differs from `addr` when port 0 is
/// requested.
pub async fn init(addr: SocketAddr) -> Result<SocketAddr, MetricsError> {
    let listener = TcpListener::bind(addr).await.context(BindSnafu { addr })?;
    let local_addr = listener.local_addr().context(BindSnafu { addr })?;

    let handle = PrometheusBuilder::new()
        .set_buckets(DURATION_BUCKETS)
        .context(PrometheusInitSnafu)?
        .install_recorder()
        .context(PrometheusInitSnafu)?;

    HANDLE
        .set(handle.clone())
        .map_err(|_| AlreadyInitializedSnafu.build())?;

    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .layer(Extension(handle));

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Metrics server error");
        }
    });

    info!(addr = %local_addr, "Metrics server started");
    Ok(local_addr)
}

async fn metrics_handler(Extension(handle): Extension<PrometheusHandle>) -> String {
    handle.render()
}

async fn health_handler() -> &'static str {
    "ok\n"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        let addr = parse_address("127.0.0.1:9090").unwrap();
        assert_eq!(addr.port(), 9090);
    }

    #[test]
    fn test_parse_address_rejects_garbage() {
        let err = parse_address("not-an-address").unwrap_err();
        assert!(err.to_string().contains("not-an-address"));
    }

    #[tokio::test]
    async fn test_health_handler() {
        assert_eq!(health_handler().await, "ok\n");
    }

    #[tokio::test]
    async fn test_init_fails_when_address_in_use() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = taken.local_addr().unwrap();

        let err = init(addr).await.unwrap_err();

        assert!(matches!(err, MetricsError::Bind { .. }), "got {err}");
        assert!(HANDLE.get().is_none());
    }
}
