//! Runtime configuration.
//!
//! Values come from command-line flags, falling back to environment
//! variables, which may themselves come from a `.env` file in the working
//! directory. Required values are checked here rather than by clap so that
//! the storage backend decides which of them are needed.

use clap::Parser;
use snafu::prelude::*;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use trackwatch_core::error::{
    ConfigError, CurrentDirSnafu, DotEnvSnafu, InvalidStorageBackendSnafu, MissingValueSnafu,
};
use trackwatch_core::storage::{BackendConfig, LocalConfig, S3Config};

use crate::notify::{DelayRange, TelegramConfig};
use crate::spotify::SpotifyConfig;

/// Interval used when `CHECK_INTERVAL` is absent, zero or unparsable.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

const DEFAULT_SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const DEFAULT_SPOTIFY_API_URL: &str = "https://api.spotify.com/v1";
const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

#[derive(Parser, Debug, Default)]
#[command(version, about)]
pub struct CliArgs {
    /// Spotify client-credentials token endpoint
    #[arg(long, env = "SPOTIFY_TOKEN_URL", default_value = DEFAULT_SPOTIFY_TOKEN_URL)]
    pub spotify_token_url: String,

    /// Spotify Web API base URL
    #[arg(long, env = "SPOTIFY_API_URL", default_value = DEFAULT_SPOTIFY_API_URL)]
    pub spotify_api_url: String,

    #[arg(long, env = "SPOTIFY_CLIENT_ID")]
    pub spotify_client_id: Option<String>,

    #[arg(long, env = "SPOTIFY_CLIENT_SECRET", hide_env_values = true)]
    pub spotify_client_secret: Option<String>,

    /// Id of the playlist to watch
    #[arg(long, env = "SPOTIFY_PLAYLIST_ID")]
    pub spotify_playlist_id: Option<String>,

    /// Telegram bot token
    #[arg(long, env = "BOT_TOKEN", hide_env_values = true)]
    pub bot_token: Option<String>,

    /// Chat the announcements are posted to
    #[arg(long, env = "TARGET_CHAT_ID")]
    pub target_chat_id: Option<String>,

    /// Telegram Bot API base URL
    #[arg(long, env = "TELEGRAM_API_URL", default_value = DEFAULT_TELEGRAM_API_URL)]
    pub telegram_api_url: String,

    /// Where snapshots are stored: filesystem or s3
    #[arg(long, env = "STORAGE_BACKEND")]
    pub storage_backend: Option<String>,

    /// Directory for the filesystem backend
    #[arg(long, env = "FILESYSTEM_STORAGE_PATH")]
    pub filesystem_storage_path: Option<PathBuf>,

    #[arg(long, env = "S3_REGION")]
    pub s3_region: Option<String>,

    #[arg(long, env = "S3_BUCKET")]
    pub s3_bucket: Option<String>,

    #[arg(long, env = "S3_ACCESS_KEY_ID")]
    pub s3_access_key_id: Option<String>,

    #[arg(long, env = "S3_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub s3_secret_access_key: Option<String>,

    /// Custom endpoint for S3-compatible stores
    #[arg(long, env = "S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// Seconds between polling cycles
    #[arg(long, env = "CHECK_INTERVAL")]
    pub check_interval: Option<String>,

    /// Address for the Prometheus endpoint (e.g. 0.0.0.0:9090)
    #[arg(long, env = "METRICS_ADDRESS")]
    pub metrics_address: Option<String>,

    /// Lower bound of the pause after each sent message, in milliseconds
    #[arg(long, env = "SEND_DELAY_MIN_MS", default_value_t = 1000)]
    pub send_delay_min_ms: u64,

    /// Upper bound of the pause after each sent message, in milliseconds
    #[arg(long, env = "SEND_DELAY_MAX_MS", default_value_t = 3000)]
    pub send_delay_max_ms: u64,

    /// Run a single cycle and exit
    #[arg(long)]
    pub once: bool,

    /// Validate the configuration and exit
    #[arg(long)]
    pub dry_run: bool,
}

/// Storage backends accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackendKind {
    Filesystem,
    S3,
}

impl StorageBackendKind {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "filesystem" => Ok(Self::Filesystem),
            "s3" | "object-store" => Ok(Self::S3),
            _ => InvalidStorageBackendSnafu { value }.fail(),
        }
    }
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub spotify: SpotifyConfig,
    pub telegram: TelegramConfig,
    pub storage: BackendConfig,
    pub check_interval: Duration,
    pub metrics_address: Option<String>,
    pub send_delay: DelayRange,
    pub once: bool,
    pub dry_run: bool,
}

impl Config {
    /// Validate parsed arguments into a configuration.
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        let spotify = SpotifyConfig {
            token_url: args.spotify_token_url,
            api_url: trim_base_url(args.spotify_api_url),
            client_id: required(args.spotify_client_id, "spotify-client-id")?,
            client_secret: required(args.spotify_client_secret, "spotify-client-secret")?,
            playlist_id: required(args.spotify_playlist_id, "spotify-playlist-id")?,
        };

        let telegram = TelegramConfig {
            api_url: trim_base_url(args.telegram_api_url),
            bot_token: required(args.bot_token, "bot-token")?,
            chat_id: required(args.target_chat_id, "target-chat-id")?,
        };

        let backend = match args.storage_backend.as_deref() {
            Some(value) => StorageBackendKind::parse(value)?,
            None => {
                warn!("No storage backend provided, using the filesystem storage backend");
                StorageBackendKind::Filesystem
            }
        };

        let storage = match backend {
            StorageBackendKind::Filesystem => {
                let root = match args.filesystem_storage_path {
                    Some(path) => path,
                    None => {
                        let cwd = std::env::current_dir().context(CurrentDirSnafu)?;
                        warn!(
                            path = %cwd.display(),
                            "No storage path provided, using the current directory"
                        );
                        cwd
                    }
                };
                BackendConfig::Local(LocalConfig::new(root))
            }
            StorageBackendKind::S3 => BackendConfig::S3(S3Config {
                region: required(args.s3_region, "s3-region")?,
                bucket: required(args.s3_bucket, "s3-bucket")?,
                access_key_id: required(args.s3_access_key_id, "s3-access-key-id")?,
                secret_access_key: required(args.s3_secret_access_key, "s3-secret-access-key")?,
                endpoint: args.s3_endpoint.filter(|e| !e.is_empty()),
            }),
        };

        Ok(Self {
            spotify,
            telegram,
            storage,
            check_interval: parse_check_interval(args.check_interval.as_deref()),
            metrics_address: args.metrics_address.filter(|a| !a.is_empty()),
            send_delay: DelayRange::new(
                Duration::from_millis(args.send_delay_min_ms),
                Duration::from_millis(args.send_delay_max_ms),
            ),
            once: args.once,
            dry_run: args.dry_run,
        })
    }

    /// Log a summary of the configuration without secrets.
    pub fn log_summary(&self) {
        info!(
            playlist = %self.spotify.playlist_id,
            chat = %self.telegram.chat_id,
            backend = self.storage.name(),
            check_interval_secs = self.check_interval.as_secs(),
            "Configuration loaded"
        );
        match &self.storage {
            BackendConfig::Local(local) => {
                info!(path = %local.root.display(), "Storage path set");
            }
            BackendConfig::S3(s3) => {
                info!(region = %s3.region, bucket = %s3.bucket, "Storage bucket set");
            }
        }
    }
}

/// Load `.env` from the working directory, if there is one.
///
/// Variables already present in the environment take precedence.
pub fn load_env_file() -> Result<(), ConfigError> {
    match dotenvy::dotenv() {
        Ok(path) => {
            debug!(path = %path.display(), "Loaded environment file");
            Ok(())
        }
        Err(e) if e.not_found() => Ok(()),
        Err(e) => DotEnvSnafu {
            message: e.to_string(),
        }
        .fail(),
    }
}

/// Parse the polling interval in whole seconds.
///
/// Absent values use the default silently; zero or garbage use it with a
/// warning.
pub fn parse_check_interval(value: Option<&str>) -> Duration {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return DEFAULT_CHECK_INTERVAL;
    };

    match raw.parse::<u64>() {
        Ok(secs) if secs > 0 => Duration::from_secs(secs),
        _ => {
            warn!(
                value = raw,
                default_secs = DEFAULT_CHECK_INTERVAL.as_secs(),
                "Invalid check interval, using default"
            );
            DEFAULT_CHECK_INTERVAL
        }
    }
}

fn required(value: Option<String>, flag: &str) -> Result<String, ConfigError> {
    match value.filter(|v| !v.trim().is_empty()) {
        Some(v) => Ok(v),
        None => MissingValueSnafu {
            flag,
            env: flag.replace('-', "_").to_ascii_uppercase(),
        }
        .fail(),
    }
}

fn trim_base_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> CliArgs {
        CliArgs {
            spotify_token_url: DEFAULT_SPOTIFY_TOKEN_URL.to_string(),
            spotify_api_url: DEFAULT_SPOTIFY_API_URL.to_string(),
            spotify_client_id: Some("client".to_string()),
            spotify_client_secret: Some("secret".to_string()),
            spotify_playlist_id: Some("playlist".to_string()),
            bot_token: Some("123:ABC".to_string()),
            target_chat_id: Some("-100".to_string()),
            telegram_api_url: DEFAULT_TELEGRAM_API_URL.to_string(),
            filesystem_storage_path: Some(PathBuf::from("/var/lib/trackwatch")),
            send_delay_min_ms: 1000,
            send_delay_max_ms: 3000,
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_to_filesystem() {
        let config = Config::from_args(base_args()).unwrap();

        assert_eq!(
            config.storage,
            BackendConfig::Local(LocalConfig::new("/var/lib/trackwatch"))
        );
        assert_eq!(config.check_interval, DEFAULT_CHECK_INTERVAL);
        assert_eq!(config.spotify.api_url, "https://api.spotify.com/v1");
        assert!(!config.once);
    }

    #[test]
    fn test_missing_required_value() {
        let mut args = base_args();
        args.bot_token = None;

        let err = Config::from_args(args).unwrap_err();
        assert!(matches!(
            &err,
            ConfigError::MissingValue { flag, env } if flag == "bot-token" && env == "BOT_TOKEN"
        ));
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let mut args = base_args();
        args.spotify_playlist_id = Some("  ".to_string());

        assert!(Config::from_args(args).is_err());
    }

    #[test]
    fn test_s3_requires_credentials() {
        let mut args = base_args();
        args.storage_backend = Some("s3".to_string());
        args.s3_region = Some("eu-west-1".to_string());
        args.s3_bucket = Some("playlists".to_string());

        let err = Config::from_args(args).unwrap_err();
        assert!(err.to_string().contains("S3_ACCESS_KEY_ID"));
    }

    #[test]
    fn test_s3_backend() {
        let mut args = base_args();
        args.storage_backend = Some("object-store".to_string());
        args.s3_region = Some("eu-west-1".to_string());
        args.s3_bucket = Some("playlists".to_string());
        args.s3_access_key_id = Some("AKID".to_string());
        args.s3_secret_access_key = Some("secret".to_string());
        args.s3_endpoint = Some("http://localhost:9000".to_string());

        let config = Config::from_args(args).unwrap();
        let BackendConfig::S3(s3) = config.storage else {
            panic!("expected s3 backend");
        };
        assert_eq!(s3.bucket, "playlists");
        assert_eq!(s3.endpoint.as_deref(), Some("http://localhost:9000"));
    }

    #[test]
    fn test_unknown_backend() {
        let mut args = base_args();
        args.storage_backend = Some("gcs".to_string());

        let err = Config::from_args(args).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidStorageBackend { .. }));
    }

    #[test]
    fn test_parse_check_interval() {
        assert_eq!(parse_check_interval(None), DEFAULT_CHECK_INTERVAL);
        assert_eq!(parse_check_interval(Some("")), DEFAULT_CHECK_INTERVAL);
        assert_eq!(parse_check_interval(Some("15")), Duration::from_secs(15));
        assert_eq!(parse_check_interval(Some(" 30 ")), Duration::from_secs(30));
        assert_eq!(parse_check_interval(Some("0")), DEFAULT_CHECK_INTERVAL);
        assert_eq!(parse_check_interval(Some("soon")), DEFAULT_CHECK_INTERVAL);
        assert_eq!(parse_check_interval(Some("-5")), DEFAULT_CHECK_INTERVAL);
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let mut args = base_args();
        args.telegram_api_url = "http://127.0.0.1:8081/".to_string();

        let config = Config::from_args(args).unwrap();
        assert_eq!(config.telegram.api_url, "http://127.0.0.1:8081");
    }

    #[test]
    fn test_flags_parse() {
        let args = CliArgs::try_parse_from([
            "trackwatch",
            "--spotify-client-id",
            "client",
            "--check-interval",
            "5",
            "--once",
        ])
        .unwrap();

        assert_eq!(args.spotify_client_id.as_deref(), Some("client"));
        assert_eq!(args.check_interval.as_deref(), Some("5"));
        assert!(args.once);
        assert!(!args.dry_run);
    }
}
