//! Composable rules deciding which observed listings qualify.
//!
//! Only qualifying records reach the decision engine, and a page without
//! any counts toward the empty-page stop rule.

pub mod condition;
pub mod keyword;
pub mod price;

use crate::amazon::ObservedRecord;
use rust_decimal::Decimal;

pub use condition::ConditionFilter;
pub use keyword::KeywordFilter;
pub use price::PriceFilter;

/// Trait for filtering observed records.
pub trait Filter: Send + Sync {
    /// Returns true if the record passes the filter.
    fn matches(&self, record: &ObservedRecord) -> bool;

    /// Returns a description of this filter.
    fn description(&self) -> String;
}

/// A chain of filters that must all pass.
#[derive(Default)]
pub struct FilterChain {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterChain {
    /// Creates an empty filter chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a filter to the chain.
    pub fn add(&mut self, filter: impl Filter + 'static) -> &mut Self {
        self.filters.push(Box::new(filter));
        self
    }

    /// Checks if a record passes all filters.
    pub fn matches(&self, record: &ObservedRecord) -> bool {
        self.filters.iter().all(|f| f.matches(record))
    }

    /// Keeps the qualifying records.
    pub fn apply(&self, records: Vec<ObservedRecord>) -> Vec<ObservedRecord> {
        records.into_iter().filter(|r| self.matches(r)).collect()
    }

    /// Returns true if no filters are configured.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Returns the number of filters.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Returns descriptions of all filters.
    pub fn descriptions(&self) -> Vec<String> {
        self.filters.iter().map(|f| f.description()).collect()
    }
}

/// Builder for constructing a FilterChain from configuration.
#[derive(Default)]
pub struct FilterChainBuilder {
    chain: FilterChain,
}

impl FilterChainBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a price range filter.
    pub fn price_range(mut self, min: Option<Decimal>, max: Option<Decimal>) -> Self {
        if min.is_some() || max.is_some() {
            self.chain.add(PriceFilter::new(min, max));
        }
        self
    }

    /// Keeps only used/open-box offers.
    pub fn used_only(mut self, enabled: bool) -> Self {
        if enabled {
            self.chain.add(ConditionFilter::used_only());
        }
        self
    }

    /// Adds required keywords filter.
    pub fn keywords(mut self, keywords: Vec<String>) -> Self {
        if !keywords.is_empty() {
            self.chain.add(KeywordFilter::required(keywords));
        }
        self
    }

    /// Adds excluded keywords filter.
    pub fn exclude_keywords(mut self, keywords: Vec<String>) -> Self {
        if !keywords.is_empty() {
            self.chain.add(KeywordFilter::excluded(keywords));
        }
        self
    }

    /// Builds the filter chain.
    pub fn build(self) -> FilterChain {
        self.chain
    }
}
