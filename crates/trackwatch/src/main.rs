//! trackwatch CLI: announces new playlist tracks on Telegram.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use snafu::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use trackwatch::config::load_env_file;
use trackwatch::error::{
    AppError, ConfigSnafu, CycleSnafu, HttpClientSnafu, MetricsSnafu, StorageInitSnafu,
};
use trackwatch::notify::{TelegramClient, TelegramNotifier};
use trackwatch::spotify::{PlaylistFetcher, SpotifyClient};
use trackwatch::{CliArgs, Config, Reconciler, SnapshotStore, StorageProvider, init_tracing};
use trackwatch_core::metrics::parse_address;
use trackwatch_core::polling::{run_iteration, run_polling_loop};
use trackwatch_core::retry::RetryPolicy;
use trackwatch_core::signal::cancel_on_signal;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %snafu::Report::from_error(&e), "trackwatch failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), AppError> {
    load_env_file().context(ConfigSnafu)?;
    let config = Config::from_args(CliArgs::parse()).context(ConfigSnafu)?;
    config.log_summary();

    if config.dry_run {
        info!("Configuration is valid");
        return Ok(());
    }

    if let Some(address) = &config.metrics_address {
        let addr = parse_address(address).context(MetricsSnafu)?;
        trackwatch::init_metrics(addr).await.context(MetricsSnafu)?;
    }

    let storage = StorageProvider::for_config(config.storage.clone())
        .await
        .context(StorageInitSnafu {
            backend: config.storage.name(),
        })?;
    info!(location = storage.canonical_url(), "Storage backend ready");

    let http = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(concat!("trackwatch/", env!("CARGO_PKG_VERSION")))
        .build()
        .context(HttpClientSnafu)?;

    let spotify = SpotifyClient::new(http.clone(), config.spotify.clone(), RetryPolicy::default());
    let telegram = TelegramClient::new(http, config.telegram.clone(), RetryPolicy::default());
    let notifier = TelegramNotifier::new(telegram)
        .with_user_directory(Arc::new(spotify.clone()))
        .with_send_delay(config.send_delay);

    // A single run never sees a second fetch, so it reads the whole playlist
    let fetcher = if config.once {
        PlaylistFetcher::full_scan(spotify)
    } else {
        PlaylistFetcher::new(spotify)
    };
    let mut reconciler = Reconciler::new(
        fetcher,
        SnapshotStore::new(Arc::new(storage)),
        notifier,
    );
    let name = config.spotify.playlist_id.as_str();

    if config.once {
        run_iteration(&mut reconciler, true, name)
            .await
            .context(CycleSnafu)?;
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    cancel_on_signal(shutdown.clone());

    info!(
        playlist = name,
        interval_secs = config.check_interval.as_secs(),
        "Starting polling loop"
    );
    let stats = run_polling_loop(&mut reconciler, config.check_interval, shutdown, name).await;
    info!(
        iterations = stats.iterations,
        failures = stats.failures,
        "Shutdown complete"
    );

    Ok(())
}
