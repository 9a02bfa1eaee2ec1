pub mod telegram;

pub use telegram::TelegramChannel;

use crate::config::Config;
use crate::library::LibraryClient;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// A finished notification, ready to go out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    /// Library item whose primary image illustrates the message.
    pub representative_item_id: String,
    /// Item whose image is used when the representative has none
    /// (usually the series of a season or episode).
    pub fallback_item_id: Option<String>,
    /// Markdown body.
    pub message_text: String,
}

impl NotificationRequest {
    pub fn new(representative_item_id: impl Into<String>, message_text: impl Into<String>) -> Self {
        Self {
            representative_item_id: representative_item_id.into(),
            fallback_item_id: None,
            message_text: message_text.into(),
        }
    }

    pub fn with_fallback(mut self, item_id: impl Into<String>) -> Self {
        self.fallback_item_id = Some(item_id.into());
        self
    }
}

/// Sends notification requests somewhere. The engine only sees this trait.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, request: &NotificationRequest) -> Result<()>;
}

/// One outbound channel (a chat, a bot).
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &str;

    /// Send `text`, attaching `image` when the channel supports it.
    async fn send(&self, text: &str, image: Option<&[u8]>) -> Result<()>;
}

/// Manages all notification targets (Telegram, etc.)
pub struct NotificationManager {
    library: Arc<dyn LibraryClient>,
    channels: Vec<Box<dyn NotificationChannel>>,
}

impl NotificationManager {
    pub fn new(config: &Config, library: Arc<dyn LibraryClient>) -> Self {
        let mut channels: Vec<Box<dyn NotificationChannel>> = Vec::new();
        if config.telegram.enabled {
            channels.push(Box::new(TelegramChannel::new(&config.telegram)));
        }
        Self::with_channels(library, channels)
    }

    pub fn with_channels(
        library: Arc<dyn LibraryClient>,
        channels: Vec<Box<dyn NotificationChannel>>,
    ) -> Self {
        Self { library, channels }
    }

    async fn fetch_image(&self, item_id: &str) -> Option<Vec<u8>> {
        match self.library.primary_image(item_id).await {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!(item_id = %item_id, error = %e, "Could not fetch primary image");
                None
            }
        }
    }

    /// Image of the representative item, else of the fallback item.
    async fn image_for(&self, request: &NotificationRequest) -> Option<Vec<u8>> {
        if let Some(image) = self.fetch_image(&request.representative_item_id).await {
            return Some(image);
        }
        let fallback = request.fallback_item_id.as_deref()?;
        tracing::debug!(
            item_id = %request.representative_item_id,
            fallback = %fallback,
            "No image for item; trying fallback"
        );
        self.fetch_image(fallback).await
    }
}

#[async_trait]
impl Dispatcher for NotificationManager {
    /// Fan out to every channel. Fails only when every channel failed.
    async fn dispatch(&self, request: &NotificationRequest) -> Result<()> {
        if self.channels.is_empty() {
            tracing::info!(
                item_id = %request.representative_item_id,
                "No notification channels configured; message:\n{}",
                request.message_text
            );
            return Ok(());
        }

        let image = self.image_for(request).await;
        if image.is_none() {
            tracing::info!(item_id = %request.representative_item_id, "No image available; sending text only");
        }

        let mut delivered = 0usize;
        for channel in &self.channels {
            match channel.send(&request.message_text, image.as_deref()).await {
                Ok(()) => {
                    delivered += 1;
                    tracing::info!(
                        channel = channel.name(),
                        item_id = %request.representative_item_id,
                        "Notification sent"
                    );
                }
                Err(e) => {
                    tracing::warn!(channel = channel.name(), error = %e, "Notification channel failed");
                }
            }
        }

        if delivered == 0 {
            anyhow::bail!("All {} notification channel(s) failed", self.channels.len());
        }
        Ok(())
    }
}
