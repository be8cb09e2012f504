//! Data models for listings observed on a results page.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One fresh extraction of a listing during the current scrape.
///
/// Produced by the extractor, consumed once by the decision engine and
/// never persisted verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedRecord {
    /// Amazon Standard Identification Number
    pub id: String,
    /// Listing title as displayed
    pub name: String,
    /// Canonical product URL
    pub url: String,
    /// Offer price, always > 0 once extracted
    pub price: Decimal,
    /// Condition label ("Usado - Como novo", "New", ...)
    pub condition: String,
    /// Whether the price belongs to a used/open-box offer
    pub is_used_offer: bool,
    /// When the record was extracted
    pub observed_at: DateTime<Utc>,
    /// Label of the source that produced it
    pub source_label: String,
}

impl ObservedRecord {
    /// Creates a record observed now.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        url: impl Into<String>,
        price: Decimal,
        condition: impl Into<String>,
        source_label: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: url.into(),
            price,
            condition: condition.into(),
            is_used_offer: false,
            observed_at: Utc::now(),
            source_label: source_label.into(),
        }
    }

    /// Marks the record as a used/open-box offer.
    pub fn used(mut self) -> Self {
        self.is_used_offer = true;
        self
    }
}

/// Everything extracted from one results page.
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    /// Records that were fully extracted
    pub records: Vec<ObservedRecord>,
    /// Cards that had an ASIN but failed extraction
    pub skipped: usize,
    /// Whether an enabled "next page" control is present
    pub has_next: bool,
}

impl ListingPage {
    /// Returns number of records.
    pub fn count(&self) -> usize {
        self.records.len()
    }

    /// Returns true if nothing was extracted.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
