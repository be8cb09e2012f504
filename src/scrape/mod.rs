//! Scraping seams and the per-source pagination driver.
//!
//! The fetcher and extractor are the fragile, site-specific collaborators;
//! everything behind them (filters, history, notifications) only sees
//! [`ObservedRecord`](crate::amazon::models::ObservedRecord)s and [`PageError`] kinds.

pub mod diagnostics;
pub mod driver;

use crate::amazon::models::ListingPage;
use async_trait::async_trait;
use thiserror::Error;

pub use diagnostics::Diagnostics;
pub use driver::{DriverSettings, PaginationDriver, SourceOutcome, SourceReport, StopReason};

/// Why a page could not be loaded.
#[derive(Debug, Error)]
pub enum PageError {
    /// Anti-bot challenge; no amount of retrying defeats it within one run.
    #[error("CAPTCHA detected at {url}")]
    Captcha { url: String, html: String },

    /// Explicit block (HTTP 403 or equivalent).
    #[error("request blocked at {url} (HTTP {status})")]
    Blocked { url: String, status: u16 },

    /// Temporary error page served with a 200 (Amazon's "dog" page).
    #[error("error page served at {url}")]
    ErrorPage { url: String, html: String },

    /// Throttled by the marketplace.
    #[error("rate limited at {url} (HTTP {status})")]
    RateLimited { url: String, status: u16 },

    /// Any other non-success status.
    #[error("HTTP {status} at {url}")]
    Http { url: String, status: u16 },

    /// Transport failure or timeout.
    #[error("request to {url} failed: {message}")]
    Network { url: String, message: String },
}

impl PageError {
    /// Whether retrying the same page later in this run can succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            PageError::Captcha { .. } | PageError::Blocked { .. } => false,
            PageError::ErrorPage { .. }
            | PageError::RateLimited { .. }
            | PageError::Network { .. } => true,
            PageError::Http { status, .. } => *status >= 500,
        }
    }

    /// Rendered HTML that triggered the error, when there was one.
    pub fn snapshot(&self) -> Option<&str> {
        match self {
            PageError::Captcha { html, .. } | PageError::ErrorPage { html, .. } => Some(html),
            _ => None,
        }
    }

    /// Short tag used in diagnostic file names.
    pub fn kind(&self) -> &'static str {
        match self {
            PageError::Captcha { .. } => "captcha",
            PageError::Blocked { .. } => "blocked",
            PageError::ErrorPage { .. } => "error-page",
            PageError::RateLimited { .. } => "rate-limited",
            PageError::Http { .. } => "http",
            PageError::Network { .. } => "network",
        }
    }
}

/// Loads a rendered results page - enables mocking for tests.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches `url` and returns the rendered document.
    async fn fetch(&self, url: &str) -> Result<String, PageError>;
}

/// Swappable extraction strategy for one marketplace layout.
pub trait Extractor: Send + Sync {
    /// Detects CAPTCHA and error pages in an otherwise successful response.
    fn check_page(&self, url: &str, html: &str) -> Result<(), PageError>;

    /// Extracts listing records; single-card failures are counted, not raised.
    fn extract(&self, html: &str, source_label: &str) -> ListingPage;
}

/// Appends pagination parameters to a source's base URL.
pub fn page_url(base_url: &str, page: u32, qid: i64) -> String {
    let sep = if base_url.contains('?') { '&' } else { '?' };
    format!("{base_url}{sep}page={page}&qid={qid}&ref=sr_pg_{page}")
}
