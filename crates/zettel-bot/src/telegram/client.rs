//! Telegram Bot API client: long polling, photo download, sending.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, instrument};

use zettel_core::defaults::{PHOTO_MEDIA_TYPE, TELEGRAM_API_URL, TELEGRAM_POLL_TIMEOUT_SECS};
use zettel_core::{
    ChatTransport, Error, EventBody, IncomingEvent, MessageId, OutgoingMessage, Result,
};

use super::types::*;

/// Extra HTTP timeout on top of the long-poll timeout.
const HTTP_TIMEOUT_MARGIN_SECS: u64 = 10;

/// Configuration for the Telegram client.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub api_url: String,
    pub token: String,
    /// `timeout` passed to `getUpdates`, in seconds.
    pub poll_timeout_seconds: u64,
}

impl TelegramConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            api_url: TELEGRAM_API_URL.to_string(),
            token: token.into(),
            poll_timeout_seconds: TELEGRAM_POLL_TIMEOUT_SECS,
        }
    }

    /// Create config from environment variables.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `TELEGRAM_TOKEN` | (required) | Bot token from BotFather |
    /// | `TELEGRAM_API_URL` | `https://api.telegram.org` | Bot API endpoint |
    /// | `TELEGRAM_POLL_TIMEOUT` | `30` | Long-poll timeout (seconds) |
    pub fn from_env() -> Result<Self> {
        let token = std::env::var("TELEGRAM_TOKEN")
            .map_err(|_| Error::Config("TELEGRAM_TOKEN is not set".to_string()))?;
        let mut config = Self::new(token);
        if let Ok(api_url) = std::env::var("TELEGRAM_API_URL") {
            config.api_url = api_url;
        }
        if let Some(timeout) = std::env::var("TELEGRAM_POLL_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.poll_timeout_seconds = timeout;
        }
        Ok(config)
    }
}

/// Split `/name@bot args` into `("name", "args")`.
pub fn parse_command(text: &str) -> Option<(String, String)> {
    let rest = text.trim().strip_prefix('/')?;
    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((head, args)) => (head, args.trim()),
        None => (rest, ""),
    };
    let name = head.split('@').next().unwrap_or(head).to_lowercase();
    if name.is_empty() {
        return None;
    }
    Some((name, args.to_string()))
}

/// Escape user-supplied text for Telegram's legacy Markdown mode.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Telegram Bot API client.
pub struct TelegramClient {
    client: Client,
    config: TelegramConfig,
}

impl TelegramClient {
    pub fn new(config: TelegramConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(
                config.poll_timeout_seconds + HTTP_TIMEOUT_MARGIN_SECS,
            ))
            .build()
            .map_err(|e| Error::Transport(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "transport",
            component = "telegram",
            poll_timeout_secs = config.poll_timeout_seconds,
            "Initializing Telegram client"
        );

        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(TelegramConfig::from_env()?)
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_url.trim_end_matches('/'),
            self.config.token,
            method
        )
    }

    async fn call<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        method: &str,
    ) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::Transport(format!("{} failed: {}", method, e.without_url())))?;
        let status = response.status();
        let body: ApiResponse<T> = response.json().await.map_err(|e| {
            Error::Transport(format!(
                "{} returned {} with unreadable body: {}",
                method,
                status,
                e.without_url()
            ))
        })?;
        match body {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse { description, .. } => Err(Error::Transport(format!(
                "{} returned {}: {}",
                method,
                status,
                description.unwrap_or_else(|| "Unknown error".to_string())
            ))),
        }
    }

    /// Long-poll for updates after `offset`.
    #[instrument(skip(self), fields(subsystem = "transport", component = "telegram", op = "get_updates"))]
    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>> {
        let mut query = vec![("timeout", self.config.poll_timeout_seconds.to_string())];
        if let Some(offset) = offset {
            query.push(("offset", offset.to_string()));
        }
        let updates: Vec<Update> = self
            .call(self.client.get(self.method_url("getUpdates")).query(&query), "getUpdates")
            .await?;
        if !updates.is_empty() {
            debug!(count = updates.len(), "Updates received");
        }
        Ok(updates)
    }

    /// Download a file by its `file_id`.
    #[instrument(skip(self), fields(subsystem = "transport", component = "telegram", op = "download"))]
    pub async fn download_file(&self, file_id: &str) -> Result<Vec<u8>> {
        let file: File = self
            .call(
                self.client
                    .get(self.method_url("getFile"))
                    .query(&[("file_id", file_id)]),
                "getFile",
            )
            .await?;
        let file_path = file
            .file_path
            .ok_or_else(|| Error::Transport("getFile returned no file_path".to_string()))?;

        let url = format!(
            "{}/file/bot{}/{}",
            self.config.api_url.trim_end_matches('/'),
            self.config.token,
            file_path
        );
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("File download failed: {}", e.without_url())))?;
        if !response.status().is_success() {
            return Err(Error::Transport(format!(
                "File download returned {}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Transport(format!("File download failed: {}", e.without_url())))?;
        debug!(size = bytes.len(), "File downloaded");
        Ok(bytes.to_vec())
    }

    /// Map an update to an incoming event. Photos are downloaded here.
    /// Updates without a message, a sender, or supported content map to `None`.
    pub async fn to_event(&self, update: Update) -> Result<Option<IncomingEvent>> {
        let Some(message) = update.message else {
            return Ok(None);
        };
        let Some(sender) = &message.from else {
            return Ok(None);
        };

        let body = if let Some(photo) = message.largest_photo() {
            EventBody::Image {
                data: self.download_file(&photo.file_id).await?,
                media_type: PHOTO_MEDIA_TYPE.to_string(),
                caption: message.caption.clone().filter(|c| !c.trim().is_empty()),
            }
        } else if let Some(text) = &message.text {
            match parse_command(text) {
                Some((name, args)) => EventBody::Command { name, args },
                None => EventBody::Text(text.clone()),
            }
        } else {
            return Ok(None);
        };

        Ok(Some(IncomingEvent {
            sender_id: sender.id,
            chat_id: message.chat.id,
            message_id: message.message_id,
            reply_to_message_id: message.reply_to_message.as_ref().map(|m| m.message_id),
            body,
        }))
    }
}

#[async_trait]
impl ChatTransport for TelegramClient {
    #[instrument(skip(self, message), fields(subsystem = "transport", component = "telegram", op = "send"))]
    async fn send(&self, message: OutgoingMessage) -> Result<MessageId> {
        let body = SendMessageRequest {
            chat_id: message.chat_id,
            text: &message.text,
            reply_to_message_id: message.reply_to_message_id,
            parse_mode: message.markdown.then_some("Markdown"),
        };
        let sent: Message = self
            .call(self.client.post(self.method_url("sendMessage")).json(&body), "sendMessage")
            .await?;
        Ok(sent.message_id)
    }
}
