//! Used/open-box offer filter.

use super::Filter;
use crate::amazon::ObservedRecord;

/// Keeps only records whose price belongs to a used/open-box offer.
pub struct ConditionFilter;

impl ConditionFilter {
    /// Creates the used-only filter.
    pub fn used_only() -> Self {
        Self
    }
}

impl Filter for ConditionFilter {
    fn matches(&self, record: &ObservedRecord) -> bool {
        record.is_used_offer
    }

    fn description(&self) -> String {
        "Used offers only".to_string()
    }
}
