//! Run command: scrape every configured source and notify on new listings
//! and price drops.

use crate::amazon::{AmazonClient, Parser};
use crate::config::Config;
use crate::history::HistoryStore;
use crate::notify::{LogNotifier, Notifier, TelegramNotifier};
use crate::scrape::{
    Diagnostics, DriverSettings, Extractor, PageFetcher, PaginationDriver, SourceReport,
};
use crate::sources::Source;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Opens one fetch session per source - enables mocking for tests.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self, source: &Source) -> Result<Box<dyn PageFetcher>>;
}

/// Gives every source its own HTTP client and cookie jar.
pub struct AmazonSessions {
    config: Config,
}

impl AmazonSessions {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionFactory for AmazonSessions {
    async fn open(&self, source: &Source) -> Result<Box<dyn PageFetcher>> {
        debug!("Opening session for {}", source.label);
        let client = AmazonClient::new(&self.config).context("Failed to create HTTP client")?;
        Ok(Box::new(client))
    }
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub sources_total: usize,
    pub sources_failed: usize,
    pub notifications: usize,
    pub persist_warnings: usize,
    pub interrupted: bool,
    pub reports: Vec<SourceReport>,
}

impl RunSummary {
    /// Sources without a report (cancelled or panicked) count as failed.
    pub fn new(
        sources_total: usize,
        reports: Vec<SourceReport>,
        final_persist_warnings: usize,
        interrupted: bool,
    ) -> Self {
        let aborted = reports.iter().filter(|r| r.outcome.is_aborted()).count();
        let missing = sources_total.saturating_sub(reports.len());

        Self {
            sources_total,
            sources_failed: aborted + missing,
            notifications: reports.iter().map(|r| r.notifications).sum(),
            persist_warnings: final_persist_warnings
                + reports.iter().map(|r| r.persist_warnings).sum::<usize>(),
            interrupted,
            reports,
        }
    }

    /// Summary where every report is accounted for.
    pub fn from_reports(reports: Vec<SourceReport>, final_persist_warnings: usize, interrupted: bool) -> Self {
        Self::new(reports.len(), reports, final_persist_warnings, interrupted)
    }

    /// Every source completed and history was saved.
    pub fn is_clean(&self) -> bool {
        self.sources_failed == 0 && self.persist_warnings == 0 && !self.interrupted
    }
}

/// Executes a scrape run.
pub struct RunCommand {
    config: Config,
    only: Vec<String>,
}

impl RunCommand {
    /// Creates a new run command.
    pub fn new(config: Config) -> Self {
        Self { config, only: Vec::new() }
    }

    /// Restricts the run to the given source labels.
    pub fn only(mut self, labels: Vec<String>) -> Self {
        self.only = labels;
        self
    }

    /// Runs against Amazon with the configured notifier and history file.
    pub async fn execute(&self) -> Result<RunSummary> {
        self.config.validate()?;

        let notifier = self.build_notifier()?;
        let history =
            Arc::new(HistoryStore::open(self.config.history_file(), self.config.history_flush_every).await);
        let sessions = Arc::new(AmazonSessions::new(self.config.clone()));
        let extractor = Arc::new(Parser::new(self.config.region));

        self.execute_with(sessions, extractor, notifier, history).await
    }

    /// Runs with provided collaborators (for testing).
    pub async fn execute_with(
        &self,
        sessions: Arc<dyn SessionFactory>,
        extractor: Arc<dyn Extractor>,
        notifier: Arc<dyn Notifier>,
        history: Arc<HistoryStore>,
    ) -> Result<RunSummary> {
        self.config.validate()?;
        let sources = self.config.resolve_sources(&self.only)?;

        let filters = self.config.filter_chain();
        if !filters.is_empty() {
            debug!("Active filters: {}", filters.descriptions().join(", "));
        }

        let driver = Arc::new(PaginationDriver::new(
            history.clone(),
            notifier,
            Arc::new(filters),
            Diagnostics::new(self.config.debug_dir.clone()),
            DriverSettings::from_config(&self.config),
        ));

        info!(
            "Scraping {} source(s), {} at a time, min discount {}%",
            sources.len(),
            self.config.concurrency,
            self.config.min_discount_percent
        );

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut tasks = JoinSet::new();

        for source in sources.iter().cloned() {
            let driver = driver.clone();
            let sessions = sessions.clone();
            let extractor = extractor.clone();
            let semaphore = semaphore.clone();

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return SourceReport::aborted(&source.label, "scheduler closed");
                };

                match sessions.open(&source).await {
                    Ok(fetcher) => driver.run(fetcher.as_ref(), extractor.as_ref(), &source).await,
                    Err(e) => {
                        error!("[{}] Could not open session: {:#}", source.label, e);
                        SourceReport::aborted(&source.label, format!("{:#}", e))
                    }
                }
            });
        }

        let mut reports = Vec::with_capacity(sources.len());
        let mut interrupted = false;

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut listening = true;

        loop {
            tokio::select! {
                joined = tasks.join_next() => match joined {
                    Some(Ok(report)) => reports.push(report),
                    Some(Err(e)) => error!("Source task failed: {}", e),
                    None => break,
                },
                signal = &mut ctrl_c, if listening => {
                    if let Err(e) = signal {
                        warn!("Cannot listen for Ctrl-C: {}", e);
                        listening = false;
                        continue;
                    }
                    warn!("Interrupted, stopping outstanding sources");
                    interrupted = true;
                    tasks.abort_all();
                    break;
                }
            }
        }

        // collect whatever finished before the abort took effect
        while let Some(joined) = tasks.join_next().await {
            if let Ok(report) = joined {
                reports.push(report);
            }
        }

        let mut persist_warnings = 0;
        if let Err(e) = history.flush().await {
            warn!("Could not save history: {:#}", e);
            persist_warnings += 1;
        }

        reports.sort_by_key(|r| sources.iter().position(|s| s.label == r.label));

        let summary = RunSummary::new(sources.len(), reports, persist_warnings, interrupted);
        info!(
            "Run finished: {} source(s), {} failed, {} notification(s)",
            summary.sources_total, summary.sources_failed, summary.notifications
        );
        Ok(summary)
    }

    fn build_notifier(&self) -> Result<Arc<dyn Notifier>> {
        let currency = self.config.region.currency();

        match self.config.telegram() {
            Some(telegram) => {
                info!("Sending notifications to {} Telegram chat(s)", telegram.chat_ids.len());
                let notifier = TelegramNotifier::new(
                    telegram.bot_token.clone(),
                    telegram.chat_ids.clone(),
                    currency,
                )?;
                Ok(Arc::new(notifier))
            }
            None => {
                info!("Telegram not configured, notifications go to the log");
                Ok(Arc::new(LogNotifier::new(currency)))
            }
        }
    }
}
