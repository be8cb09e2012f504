//! Keyword filtering on listing names.

use super::Filter;
use crate::amazon::ObservedRecord;

/// Filters records by keywords in the listing name.
pub struct KeywordFilter {
    /// All must appear.
    required: Vec<String>,
    /// None may appear.
    excluded: Vec<String>,
}

impl KeywordFilter {
    /// Creates a new keyword filter; matching is case-insensitive.
    pub fn new(required: Vec<String>, excluded: Vec<String>) -> Self {
        let normalize = |words: Vec<String>| -> Vec<String> {
            words
                .into_iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect()
        };
        Self { required: normalize(required), excluded: normalize(excluded) }
    }

    /// Creates a filter with only required keywords.
    pub fn required(keywords: Vec<String>) -> Self {
        Self::new(keywords, Vec::new())
    }

    /// Creates a filter with only excluded keywords.
    pub fn excluded(keywords: Vec<String>) -> Self {
        Self::new(Vec::new(), keywords)
    }
}

impl Filter for KeywordFilter {
    fn matches(&self, record: &ObservedRecord) -> bool {
        let name = record.name.to_lowercase();
        self.required.iter().all(|k| name.contains(k.as_str()))
            && !self.excluded.iter().any(|k| name.contains(k.as_str()))
    }

    fn description(&self) -> String {
        let mut parts = Vec::new();

        if !self.required.is_empty() {
            parts.push(format!("Must contain: {}", self.required.join(", ")));
        }
        if !self.excluded.is_empty() {
            parts.push(format!("Must not contain: {}", self.excluded.join(", ")));
        }

        if parts.is_empty() {
            "Keywords: any".to_string()
        } else {
            parts.join("; ")
        }
    }
}
