//! Telegram Bot API delivery.

use async_trait::async_trait;
use rand::Rng;
use reqwest::StatusCode;
use reqwest::header::RETRY_AFTER;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use trackwatch_core::retry::RetryPolicy;

use super::message::{compose, first_name};
use super::{Notifier, UserDirectory};
use crate::error::{DeliveryDecodeSnafu, DeliveryError, RejectedSnafu, ThrottledSnafu};
use crate::model::{Item, Snapshot};

const PARSE_MODE: &str = "MarkdownV2";

/// Bot credentials and destination chat.
#[derive(Clone, PartialEq, Eq)]
pub struct TelegramConfig {
    pub api_url: String,
    pub bot_token: String,
    pub chat_id: String,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("api_url", &self.api_url)
            .field("bot_token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct BotReply {
    #[serde(default)]
    ok: bool,
    description: Option<String>,
    parameters: Option<ReplyParameters>,
}

#[derive(Debug, Default, Deserialize)]
struct ReplyParameters {
    retry_after: Option<u64>,
}

/// Sends messages through the Bot API.
#[derive(Debug, Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    config: TelegramConfig,
    retry: RetryPolicy,
}

impl TelegramClient {
    pub fn new(http: reqwest::Client, config: TelegramConfig, retry: RetryPolicy) -> Self {
        Self {
            http,
            config,
            retry,
        }
    }

    /// Send `text` to the configured chat, retrying per the delivery policy.
    pub async fn send_message(&self, text: &str) -> Result<(), DeliveryError> {
        let url = format!(
            "{}/bot{}/sendMessage",
            self.config.api_url, self.config.bot_token
        );
        let payload = SendMessage {
            chat_id: &self.config.chat_id,
            text,
            parse_mode: PARSE_MODE,
        };
        let (url, payload) = (&url, &payload);

        self.retry
            .run("telegram", || async move {
                let response = self
                    .http
                    .post(url)
                    .json(payload)
                    .send()
                    .await
                    .map_err(|e| DeliveryError::from_transport(e.without_url()))?;

                let status = response.status();
                if status.is_success() {
                    let reply: BotReply = response
                        .json()
                        .await
                        .map_err(|e| e.without_url())
                        .context(DeliveryDecodeSnafu)?;
                    ensure!(
                        reply.ok,
                        RejectedSnafu {
                            status: status.as_u16(),
                            description: reply.description.unwrap_or_default(),
                        }
                    );
                    return Ok(());
                }

                let header_retry_after = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok());
                let body = response
                    .text()
                    .await
                    .map_err(|e| DeliveryError::from_transport(e.without_url()))?;
                let reply: BotReply = serde_json::from_str(&body).unwrap_or_default();

                if status == StatusCode::TOO_MANY_REQUESTS {
                    let retry_after = reply
                        .parameters
                        .and_then(|p| p.retry_after)
                        .or(header_retry_after)
                        .map(Duration::from_secs);
                    return ThrottledSnafu { retry_after }.fail();
                }

                RejectedSnafu {
                    status: status.as_u16(),
                    description: reply.description.unwrap_or(body),
                }
                .fail()
            })
            .await
    }
}

/// Inclusive range for the pause after each delivered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min: Duration,
    pub max: Duration,
}

impl DelayRange {
    pub const ZERO: Self = Self {
        min: Duration::ZERO,
        max: Duration::ZERO,
    };

    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn sample(&self) -> Duration {
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        if max > min {
            Duration::from_millis(rand::rng().random_range(min..=max))
        } else {
            self.min
        }
    }
}

impl Default for DelayRange {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(3))
    }
}

/// Announces new tracks in a Telegram chat.
pub struct TelegramNotifier {
    telegram: TelegramClient,
    users: Option<Arc<dyn UserDirectory>>,
    send_delay: DelayRange,
}

impl TelegramNotifier {
    pub fn new(telegram: TelegramClient) -> Self {
        Self {
            telegram,
            users: None,
            send_delay: DelayRange::default(),
        }
    }

    /// Resolve "added by" names through `users`.
    pub fn with_user_directory(mut self, users: Arc<dyn UserDirectory>) -> Self {
        self.users = Some(users);
        self
    }

    pub fn with_send_delay(mut self, send_delay: DelayRange) -> Self {
        self.send_delay = send_delay;
        self
    }

    async fn resolve_adder(&self, item: &Item) -> Option<String> {
        let users = self.users.as_ref()?;
        let user_id = item.added_by_id.as_deref()?;

        match users.display_name(user_id).await {
            Ok(Some(name)) => first_name(&name).map(str::to_string),
            Ok(None) => None,
            Err(e) => {
                warn!(user_id, error = %e, "Failed to resolve user, sending without adder");
                None
            }
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, item: &Item, snapshot: &Snapshot) -> Result<(), DeliveryError> {
        let added_by = self.resolve_adder(item).await;
        let text = compose(item, snapshot, added_by.as_deref());

        self.telegram.send_message(&text).await?;

        let pause = self.send_delay.sample();
        debug!(track = %item.item_id, pause_ms = pause.as_millis() as u64, "Message sent");
        tokio::time::sleep(pause).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_range_sample_within_bounds() {
        let range = DelayRange::new(Duration::from_millis(10), Duration::from_millis(20));
        for _ in 0..100 {
            let d = range.sample();
            assert!(d >= Duration::from_millis(10) && d <= Duration::from_millis(20));
        }
    }

    #[test]
    fn test_delay_range_normalizes_order() {
        let range = DelayRange::new(Duration::from_secs(5), Duration::from_secs(2));
        assert_eq!(range.min, Duration::from_secs(2));
        assert_eq!(range.max, Duration::from_secs(5));
        assert_eq!(DelayRange::ZERO.sample(), Duration::ZERO);
    }

    #[test]
    fn test_reply_parses_retry_after() {
        let reply: BotReply = serde_json::from_str(
            r#"{"ok":false,"error_code":429,"description":"Too Many Requests: retry after 7","parameters":{"retry_after":7}}"#,
        )
        .unwrap();
        assert!(!reply.ok);
        assert_eq!(reply.parameters.and_then(|p| p.retry_after), Some(7));
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = TelegramConfig {
            api_url: "https://api.telegram.org".to_string(),
            bot_token: "123:ABC".to_string(),
            chat_id: "-100".to_string(),
        };
        assert!(!format!("{config:?}").contains("123:ABC"));
    }
}
