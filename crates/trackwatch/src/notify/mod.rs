//! New-track notifications.
//!
//! - `message`: MarkdownV2 composition and escaping
//! - `telegram`: Bot API client and the [`Notifier`] built on it

mod message;
mod telegram;

pub use message::{compose, escape_markdown, first_name};
pub use telegram::{DelayRange, TelegramClient, TelegramConfig, TelegramNotifier};

use async_trait::async_trait;

use crate::error::{DeliveryError, UpstreamError};
use crate::model::{Item, Snapshot};

/// Delivers one announcement per new item.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, item: &Item, snapshot: &Snapshot) -> Result<(), DeliveryError>;
}

/// Resolves user ids to display names.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn display_name(&self, user_id: &str) -> Result<Option<String>, UpstreamError>;
}
