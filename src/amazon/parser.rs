//! HTML extraction for Amazon used/open-box result pages.

use crate::amazon::models::{ListingPage, ObservedRecord};
use crate::amazon::regions::Region;
use crate::amazon::selectors::{errors, search};
use crate::scrape::{Extractor, PageError};
use rust_decimal::Decimal;
use scraper::{ElementRef, Html};
use thiserror::Error;
use tracing::{debug, trace, warn};

const MAX_CONDITION_CHARS: usize = 80;

/// Why a single result card was skipped.
#[derive(Debug, Error, PartialEq)]
pub enum CardError {
    #[error("card {asin}: no title")]
    MissingTitle { asin: String },
    #[error("card {asin}: no price")]
    MissingPrice { asin: String },
    #[error("card {asin}: unparseable price '{text}'")]
    InvalidPrice { asin: String, text: String },
}

/// Extractor for Amazon result pages of one region.
pub struct Parser {
    region: Region,
}

impl Parser {
    /// Creates a new parser for the given region.
    pub fn new(region: Region) -> Self {
        Self { region }
    }

    /// Parses a single result card. `Ok(None)` means a placeholder without ASIN.
    fn parse_card(
        &self,
        element: ElementRef,
        source_label: &str,
    ) -> Result<Option<ObservedRecord>, CardError> {
        let asin = match element.value().attr(search::ASIN_ATTR) {
            Some(asin) if !asin.trim().is_empty() => asin.trim().to_string(),
            _ => return Ok(None),
        };

        let title = element
            .select(&search::TITLE)
            .map(|e| normalize_text(&e.text().collect::<String>()))
            .find(|t| !t.is_empty())
            .ok_or_else(|| CardError::MissingTitle { asin: asin.clone() })?;

        let used_condition = self.used_condition(element);

        let price_text = used_condition
            .as_ref()
            .and_then(|_| first_text(element, &search::USED_OFFER_PRICE))
            .or_else(|| first_text(element, &search::PRICE_CURRENT))
            .ok_or_else(|| CardError::MissingPrice { asin: asin.clone() })?;

        let price = self
            .parse_price_value(&price_text)
            .filter(|p| *p > Decimal::ZERO)
            .ok_or_else(|| CardError::InvalidPrice { asin: asin.clone(), text: price_text })?;

        let url = self.region.product_url(&asin);
        let record = match used_condition {
            Some(condition) => ObservedRecord::new(asin, title, url, price, condition, source_label).used(),
            None => ObservedRecord::new(asin, title, url, price, "New", source_label),
        };

        Ok(Some(record))
    }

    /// Finds the first condition text carrying a used-offer keyword.
    fn used_condition(&self, element: ElementRef) -> Option<String> {
        element
            .select(&search::CONDITION)
            .map(|e| normalize_text(&e.text().collect::<String>()))
            .find(|text| self.region.match_used_keyword(text).is_some())
            .map(|text| text.chars().take(MAX_CONDITION_CHARS).collect())
    }

    /// Parses a price value from text, handling different regional formats.
    fn parse_price_value(&self, text: &str) -> Option<Decimal> {
        let cleaned: String = text
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',' || *c == '-')
            .collect();

        // "10 - 20" style ranges: take the lower bound
        let first = cleaned.split('-').map(str::trim).find(|p| !p.is_empty())?;
        self.parse_single_price(first)
    }

    /// Parses a single price number.
    fn parse_single_price(&self, text: &str) -> Option<Decimal> {
        let normalized = if self.region.uses_comma_decimal() {
            // 1.234,56 -> 1234.56
            text.replace('.', "").replace(',', ".")
        } else {
            // 1,234.56 -> 1234.56
            text.replace(',', "")
        };

        normalized.parse().ok()
    }
}

impl Extractor for Parser {
    fn check_page(&self, url: &str, html: &str) -> Result<(), PageError> {
        let document = Html::parse_document(html);

        if document.select(&errors::CAPTCHA).next().is_some() {
            return Err(PageError::Captcha { url: url.to_string(), html: html.to_string() });
        }

        if document.select(&errors::DOG_PAGE).next().is_some() {
            return Err(PageError::ErrorPage { url: url.to_string(), html: html.to_string() });
        }

        Ok(())
    }

    fn extract(&self, html: &str, source_label: &str) -> ListingPage {
        let document = Html::parse_document(html);
        let mut page = ListingPage::default();

        for element in document.select(&search::RESULT) {
            match self.parse_card(element, source_label) {
                Ok(Some(record)) => {
                    trace!("Extracted {} - {} ({:.2})", record.id, record.name, record.price);
                    page.records.push(record);
                }
                Ok(None) => trace!("Skipping placeholder card"),
                Err(e) => {
                    warn!("Skipping listing: {}", e);
                    page.skipped += 1;
                }
            }
        }

        page.has_next = document.select(&search::NEXT_PAGE).next().is_some();

        debug!(
            "Extracted {} records ({} skipped, has_next: {})",
            page.records.len(),
            page.skipped,
            page.has_next
        );

        page
    }
}

fn first_text(element: ElementRef, selector: &scraper::Selector) -> Option<String> {
    element
        .select(selector)
        .map(|e| normalize_text(&e.text().collect::<String>()))
        .find(|t| !t.is_empty())
}

fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
