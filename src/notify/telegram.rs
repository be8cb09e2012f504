//! Telegram Bot API notifier.

use super::{format_message, Notifier};
use crate::engine::NotificationEvent;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use wreq::Client;

const TELEGRAM_API: &str = "https://api.telegram.org";
const MAX_ATTEMPTS: u32 = 3;
const MAX_RETRY_AFTER_SECS: u64 = 60;

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

/// Sends messages to one or more Telegram chats.
pub struct TelegramNotifier {
    client: Client,
    token: String,
    chat_ids: Vec<String>,
    currency: String,
    base_url: String,
}

impl TelegramNotifier {
    /// Creates a notifier for the public Bot API.
    pub fn new(token: impl Into<String>, chat_ids: Vec<String>, currency: impl Into<String>) -> Result<Self> {
        Self::with_base_url(token, chat_ids, currency, TELEGRAM_API.to_string())
    }

    /// Creates a notifier against a custom API host (for testing).
    pub fn with_base_url(
        token: impl Into<String>,
        chat_ids: Vec<String>,
        currency: impl Into<String>,
        base_url: String,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build Telegram client")?;

        Ok(Self {
            client,
            token: token.into(),
            chat_ids,
            currency: currency.into(),
            base_url,
        })
    }

    /// Sends `text` to one chat, honouring `retry_after` on HTTP 429.
    async fn send_to(&self, chat_id: &str, text: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.token);
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
        })
        .to_string();

        for attempt in 1..=MAX_ATTEMPTS {
            let response = self
                .client
                .post(&url)
                .header("Content-Type", "application/json")
                .body(body.clone())
                .send()
                .await
                .context("Failed to reach Telegram")?;

            let status = response.status().as_u16();
            let raw = response.text().await.unwrap_or_default();

            if (200..300).contains(&status) {
                debug!("Delivered to chat {}", chat_id);
                return Ok(());
            }

            let api: Option<ApiResponse> = serde_json::from_str(&raw).ok();

            if status == 429 && attempt < MAX_ATTEMPTS {
                let wait = api
                    .as_ref()
                    .and_then(|a| a.parameters.as_ref())
                    .and_then(|p| p.retry_after)
                    .unwrap_or(1)
                    .min(MAX_RETRY_AFTER_SECS);
                warn!("Telegram rate limit for chat {}, retrying in {}s", chat_id, wait);
                tokio::time::sleep(Duration::from_secs(wait)).await;
                continue;
            }

            let description = api.and_then(|a| a.description).unwrap_or(raw);
            anyhow::bail!("Telegram returned HTTP {}: {}", status, description);
        }

        anyhow::bail!("Telegram rate limit persisted after {} attempts", MAX_ATTEMPTS)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, event: &NotificationEvent) -> Result<()> {
        let text = format_message(event, &self.currency);
        let mut delivered = 0;

        for chat_id in &self.chat_ids {
            match self.send_to(chat_id, &text).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!("Telegram delivery to {} failed: {:#}", chat_id, e),
            }
        }

        if delivered == 0 {
            anyhow::bail!("No Telegram recipient received {}", event.product_id);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "telegram"
    }
}
