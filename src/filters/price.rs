//! Price range filter.

use super::Filter;
use crate::amazon::ObservedRecord;
use rust_decimal::Decimal;

/// Filters records by offer price.
pub struct PriceFilter {
    min: Option<Decimal>,
    max: Option<Decimal>,
}

impl PriceFilter {
    /// Creates a new price filter with optional min/max bounds.
    pub fn new(min: Option<Decimal>, max: Option<Decimal>) -> Self {
        Self { min, max }
    }
}

impl Filter for PriceFilter {
    fn matches(&self, record: &ObservedRecord) -> bool {
        if self.min.is_some_and(|min| record.price < min) {
            return false;
        }
        if self.max.is_some_and(|max| record.price > max) {
            return false;
        }
        true
    }

    fn description(&self) -> String {
        match (self.min, self.max) {
            (Some(min), Some(max)) => format!("Price: {:.2} - {:.2}", min, max),
            (Some(min), None) => format!("Price: >= {:.2}", min),
            (None, Some(max)) => format!("Price: <= {:.2}", max),
            (None, None) => "Price: any".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn money(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    fn make_record(price: &str) -> ObservedRecord {
        ObservedRecord::new("B001", "Test", "u", money(price), "Used", "s")
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let filter = PriceFilter::new(Some(money("10")), Some(money("20")));
        assert!(filter.matches(&make_record("10.00")));
        assert!(filter.matches(&make_record("20")));
        assert!(!filter.matches(&make_record("9.99")));
        assert!(!filter.matches(&make_record("20.01")));
    }

    #[test]
    fn test_open_ended() {
        assert!(PriceFilter::new(Some(money("10")), None).matches(&make_record("1000000")));
        assert!(PriceFilter::new(None, Some(money("10"))).matches(&make_record("0.5")));
        assert!(PriceFilter::new(None, None).matches(&make_record("42")));
    }

    #[test]
    fn test_description() {
        assert_eq!(PriceFilter::new(Some(money("10")), Some(money("20"))).description(), "Price: 10.00 - 20.00");
        assert_eq!(PriceFilter::new(None, Some(money("5"))).description(), "Price: <= 5.00");
        assert_eq!(PriceFilter::new(None, None).description(), "Price: any");
    }
}
