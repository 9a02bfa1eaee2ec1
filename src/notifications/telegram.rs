use super::NotificationChannel;
use crate::config::TelegramConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use std::time::Duration;

const TELEGRAM_API: &str = "https://api.telegram.org";

/// Request timeout for Telegram API calls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Telegram rejects photo captions longer than this.
const MAX_CAPTION_LEN: usize = 1024;

/// Telegram bot channel posting to one chat
pub struct TelegramChannel {
    client: Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramChannel {
    pub fn new(config: &TelegramConfig) -> Self {
        Self::with_api_base(config, TELEGRAM_API)
    }

    pub fn with_api_base(config: &TelegramConfig, api_base: &str) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout: {}", e);
                Client::new()
            });

        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }

    async fn send_photo(&self, caption: &str, image: &[u8]) -> Result<()> {
        let photo = Part::bytes(image.to_vec())
            .file_name("photo.jpg")
            .mime_str("image/jpeg")
            .context("Invalid photo mime type")?;

        let form = Form::new()
            .text("chat_id", self.chat_id.clone())
            .text("caption", caption.to_string())
            .text("parse_mode", "Markdown")
            .part("photo", photo);

        let response = self
            .client
            .post(self.method_url("sendPhoto"))
            .multipart(form)
            .send()
            .await
            .context("Failed to call Telegram sendPhoto")?;

        if !response.status().is_success() {
            let error = response.text().await.unwrap_or_default();
            anyhow::bail!("Telegram sendPhoto failed: {}", error);
        }
        Ok(())
    }

    async fn send_message(&self, text: &str) -> Result<()> {
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "Markdown",
        });

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .context("Failed to call Telegram sendMessage")?;

        if !response.status().is_success() {
            let error = response.text().await.unwrap_or_default();
            anyhow::bail!("Telegram sendMessage failed: {}", error);
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationChannel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, text: &str, image: Option<&[u8]>) -> Result<()> {
        if let Some(image) = image.filter(|_| text.chars().count() <= MAX_CAPTION_LEN) {
            match self.send_photo(text, image).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!("Photo upload failed, falling back to text message: {}", e);
                }
            }
        }
        self.send_message(text).await
    }
}
