//! Notification delivery.
//!
//! Delivery failures never feed back into history: by the time a notifier
//! runs, the decision has already been applied to the store.

pub mod telegram;

use crate::engine::{NotificationEvent, NotifyReason};
use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

pub use telegram::TelegramNotifier;

/// Delivers notification messages - enables mocking for tests.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends one event. Errors only when nobody received it.
    async fn notify(&self, event: &NotificationEvent) -> Result<()>;

    /// Channel name for logs.
    fn name(&self) -> &str;
}

/// Notifier used when no messaging channel is configured.
pub struct LogNotifier {
    currency: String,
}

impl LogNotifier {
    pub fn new(currency: impl Into<String>) -> Self {
        Self { currency: currency.into() }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &NotificationEvent) -> Result<()> {
        info!("{}", format_plain(event, &self.currency));
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// Renders an event as Telegram-flavoured HTML.
pub fn format_message(event: &NotificationEvent, currency: &str) -> String {
    let mut lines = Vec::new();

    match event.reason {
        NotifyReason::NewItem => lines.push("🆕 <b>New listing</b>".to_string()),
        NotifyReason::PriceDrop => lines.push(format!(
            "📉 <b>Price drop {:.1}%</b>",
            event.discount_percent.unwrap_or_default()
        )),
    }

    lines.push(format!("<b>{}</b>", escape_html(&event.name)));

    match event.previous_price {
        Some(previous) => lines.push(format!(
            "💰 {currency} {:.2} (was {currency} {:.2})",
            event.current_price, previous
        )),
        None => lines.push(format!("💰 {currency} {:.2}", event.current_price)),
    }

    lines.push(format!("📦 {}", escape_html(&event.condition)));
    lines.push(format!("🔎 {}", escape_html(&event.source_label)));
    lines.push(escape_html(&event.url));

    lines.join("\n")
}

/// Single-line rendering for logs.
pub fn format_plain(event: &NotificationEvent, currency: &str) -> String {
    let price = match (event.previous_price, event.discount_percent) {
        (Some(previous), Some(discount)) => format!(
            "{currency} {:.2} (was {:.2}, -{:.1}%)",
            event.current_price, previous, discount
        ),
        _ => format!("{currency} {:.2}", event.current_price),
    };
    format!(
        "[{}] {} | {} | {} | {}",
        event.reason, event.name, price, event.condition, event.url
    )
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
