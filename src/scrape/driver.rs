//! Per-source pagination state machine.
//!
//! Pages are loaded strictly in order. Each page is fetched and checked
//! inside one retry scope, so a transient error page is retried like a
//! network failure while CAPTCHA and explicit blocks abort the source at
//! once.

use super::{page_url, Diagnostics, Extractor, PageError, PageFetcher};
use crate::amazon::models::ObservedRecord;
use crate::config::Config;
use crate::engine::diff_and_notify;
use crate::filters::FilterChain;
use crate::history::HistoryStore;
use crate::notify::Notifier;
use crate::sources::Source;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::strategy::jitter;
use tokio_retry::RetryIf;
use tracing::{debug, error, info, warn};

const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Tunables for one driver.
#[derive(Debug, Clone)]
pub struct DriverSettings {
    pub min_discount_percent: Decimal,
    pub delay_ms: u64,
    pub delay_jitter_ms: u64,
    pub max_retries: usize,
    pub retry_backoff_ms: u64,
    pub empty_page_limit: u32,
}

impl DriverSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            min_discount_percent: config.min_discount_percent,
            delay_ms: config.delay_ms,
            delay_jitter_ms: config.delay_jitter_ms,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            empty_page_limit: config.empty_page_limit,
        }
    }
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Why a source finished normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    MaxPages,
    NoNextPage,
    EmptyPages,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::MaxPages => write!(f, "max pages reached"),
            StopReason::NoNextPage => write!(f, "no next page"),
            StopReason::EmptyPages => write!(f, "consecutive empty pages"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceOutcome {
    Completed(StopReason),
    Aborted(String),
}

impl SourceOutcome {
    pub fn is_aborted(&self) -> bool {
        matches!(self, SourceOutcome::Aborted(_))
    }
}

impl fmt::Display for SourceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceOutcome::Completed(reason) => write!(f, "completed ({})", reason),
            SourceOutcome::Aborted(reason) => write!(f, "aborted: {}", reason),
        }
    }
}

/// What happened while scraping one source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceReport {
    pub label: String,
    pub pages_loaded: u32,
    pub items_seen: usize,
    pub items_qualifying: usize,
    pub items_skipped: usize,
    pub notifications: usize,
    pub delivery_failures: usize,
    pub persist_warnings: usize,
    pub outcome: SourceOutcome,
}

impl SourceReport {
    fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            pages_loaded: 0,
            items_seen: 0,
            items_qualifying: 0,
            items_skipped: 0,
            notifications: 0,
            delivery_failures: 0,
            persist_warnings: 0,
            outcome: SourceOutcome::Completed(StopReason::NoNextPage),
        }
    }

    /// Report for a source that never got to load a page.
    pub fn aborted(label: &str, reason: impl Into<String>) -> Self {
        Self { outcome: SourceOutcome::Aborted(reason.into()), ..Self::new(label) }
    }
}

/// Drives one source from page 1 until a stop condition.
pub struct PaginationDriver {
    history: Arc<HistoryStore>,
    notifier: Arc<dyn Notifier>,
    filters: Arc<FilterChain>,
    diagnostics: Diagnostics,
    settings: DriverSettings,
}

impl PaginationDriver {
    pub fn new(
        history: Arc<HistoryStore>,
        notifier: Arc<dyn Notifier>,
        filters: Arc<FilterChain>,
        diagnostics: Diagnostics,
        settings: DriverSettings,
    ) -> Self {
        Self { history, notifier, filters, diagnostics, settings }
    }

    pub fn settings(&self) -> &DriverSettings {
        &self.settings
    }

    /// Scrapes `source` to completion or abort. Never returns an error:
    /// failures end up in the report's outcome.
    pub async fn run(
        &self,
        fetcher: &dyn PageFetcher,
        extractor: &dyn Extractor,
        source: &Source,
    ) -> SourceReport {
        let mut report = SourceReport::new(&source.label);
        let mut empty_streak = 0;
        let mut page = 1;

        info!("[{}] Starting at {}", source.label, source.base_url);

        let outcome = loop {
            if page > source.max_pages {
                break SourceOutcome::Completed(StopReason::MaxPages);
            }
            if page > 1 {
                self.pause().await;
            }

            let url = page_url(&source.base_url, page, Utc::now().timestamp_millis());
            let html = match self.load_page(fetcher, extractor, &source.label, page, &url).await {
                Ok(html) => html,
                Err(e) => {
                    error!("[{}] Aborting at page {}: {}", source.label, page, e);
                    break SourceOutcome::Aborted(e.to_string());
                }
            };
            report.pages_loaded += 1;

            let listing = extractor.extract(&html, &source.label);
            report.items_seen += listing.count();
            report.items_skipped += listing.skipped;

            let qualifying = self.process_records(listing.records, &mut report).await;

            if let Err(e) = self.history.checkpoint().await {
                warn!("[{}] History checkpoint failed: {:#}", source.label, e);
                report.persist_warnings += 1;
            }

            info!(
                "[{}] Page {}: {} qualifying, {} skipped",
                source.label, page, qualifying, listing.skipped
            );

            if qualifying == 0 {
                empty_streak += 1;
                if empty_streak >= self.settings.empty_page_limit {
                    break SourceOutcome::Completed(StopReason::EmptyPages);
                }
            } else {
                empty_streak = 0;
            }

            if !listing.has_next {
                break SourceOutcome::Completed(StopReason::NoNextPage);
            }
            page += 1;
        };

        info!("[{}] {} after {} page(s)", source.label, outcome, report.pages_loaded);
        report.outcome = outcome;
        report
    }

    /// Fetches and checks one page, retrying transient failures with
    /// jittered exponential backoff. Every failed attempt is snapshotted.
    async fn load_page(
        &self,
        fetcher: &dyn PageFetcher,
        extractor: &dyn Extractor,
        source_label: &str,
        page: u32,
        url: &str,
    ) -> Result<String, PageError> {
        let strategy = retry_delays(self.settings.retry_backoff_ms, self.settings.max_retries).map(jitter);
        let mut attempt = 0;

        RetryIf::spawn(
            strategy,
            || {
                attempt += 1;
                let attempt = attempt;
                async move {
                    let result = match fetcher.fetch(url).await {
                        Ok(html) => extractor.check_page(url, &html).map(|()| html),
                        Err(e) => Err(e),
                    };
                    if let Err(e) = &result {
                        self.diagnostics.capture(source_label, page, attempt, e).await;
                    }
                    result
                }
            },
            |e: &PageError| {
                let transient = e.is_transient();
                if transient {
                    warn!("{}, retrying", e);
                }
                transient
            },
        )
        .await
    }

    /// Runs qualifying records through the engine. Returns how many qualified.
    async fn process_records(&self, records: Vec<ObservedRecord>, report: &mut SourceReport) -> usize {
        let mut qualifying = 0;
        let min_discount = self.settings.min_discount_percent;

        for record in records {
            if !self.filters.matches(&record) {
                debug!("Filtered out {} ({})", record.id, record.name);
                continue;
            }
            qualifying += 1;

            let decided = self
                .history
                .update(&record.id, |existing| {
                    diff_and_notify(&record, existing, min_discount).map(|d| (d.entry, d.notification))
                })
                .await;

            let event = match decided {
                Ok(Some(event)) => event,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Skipping {}: {}", record.id, e);
                    report.items_skipped += 1;
                    continue;
                }
            };

            report.notifications += 1;
            if let Err(e) = self.notifier.notify(&event).await {
                warn!("{} delivery failed for {}: {:#}", self.notifier.name(), event.product_id, e);
                report.delivery_failures += 1;
            }
        }

        report.items_qualifying += qualifying;
        qualifying
    }

    /// Inter-page delay in `[delay_ms, delay_ms + delay_jitter_ms]`.
    async fn pause(&self) {
        let jitter = rand::random_range(0..=self.settings.delay_jitter_ms);
        let total = self.settings.delay_ms + jitter;
        if total > 0 {
            debug!("Waiting {}ms before next page", total);
            tokio::time::sleep(Duration::from_millis(total)).await;
        }
    }
}

/// Delays before each retry: `backoff_ms` doubled per attempt, capped at
/// [`MAX_BACKOFF`].
fn retry_delays(backoff_ms: u64, retries: usize) -> impl Iterator<Item = Duration> {
    (0..retries).map(move |n| {
        let factor = 2u64.saturating_pow(n.try_into().unwrap_or(u32::MAX));
        Duration::from_millis(backoff_ms.saturating_mul(factor)).min(MAX_BACKOFF)
    })
}
