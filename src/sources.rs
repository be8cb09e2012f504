//! Per-source scrape configuration.

use crate::amazon::Region;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

fn default_max_pages() -> u32 {
    5
}

/// One `[[sources]]` table from the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub label: String,
    /// Full search-results URL, used verbatim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Search terms for the region's used/open-box section
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// Amazon sort key, e.g. `price-asc-rank`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
}

impl SourceConfig {
    /// Source built from search terms.
    pub fn from_query(label: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: None,
            query: Some(query.into()),
            max_pages: default_max_pages(),
            sort: None,
        }
    }

    /// Source built from a results URL.
    pub fn from_url(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: Some(url.into()),
            query: None,
            max_pages: default_max_pages(),
            sort: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.label.trim().is_empty() {
            bail!("Source label must not be empty");
        }
        if self.max_pages == 0 {
            bail!("Source '{}': max_pages must be at least 1", self.label);
        }
        match (&self.url, &self.query) {
            (Some(_), Some(_)) => bail!("Source '{}': set either url or query, not both", self.label),
            (None, None) => bail!("Source '{}': one of url or query is required", self.label),
            (Some(url), None) if !url.starts_with("http") => {
                bail!("Source '{}': url must be absolute, got '{}'", self.label, url)
            }
            (None, Some(query)) if query.trim().is_empty() => {
                bail!("Source '{}': query must not be empty", self.label)
            }
            _ => Ok(()),
        }
    }

    /// Resolves the first-page URL for `region`.
    pub fn resolve(&self, region: Region) -> Result<Source> {
        self.validate()?;

        let base_url = match (&self.url, &self.query) {
            (Some(url), _) => url.clone(),
            (None, Some(query)) => region.used_search_url(query.trim(), self.sort.as_deref()),
            (None, None) => bail!("Source '{}': one of url or query is required", self.label),
        };

        Ok(Source {
            label: self.label.clone(),
            base_url,
            max_pages: self.max_pages,
        })
    }
}

/// A resolved source ready for the pagination driver.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub label: String,
    pub base_url: String,
    pub max_pages: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_resolves_to_warehouse_search() {
        let mut config = SourceConfig::from_query("gpus", "rtx 4060");
        config.sort = Some("price-asc-rank".to_string());

        let source = config.resolve(Region::Br).unwrap();
        assert_eq!(
            source.base_url,
            "https://www.amazon.com.br/s?k=rtx%204060&i=warehouse-deals&s=price-asc-rank"
        );
        assert_eq!(source.max_pages, 5);
    }

    #[test]
    fn test_url_is_verbatim() {
        let config = SourceConfig::from_url("deals", "https://www.amazon.com/s?i=warehouse-deals&rh=n%3A1");
        let source = config.resolve(Region::Uk).unwrap();
        assert_eq!(source.base_url, "https://www.amazon.com/s?i=warehouse-deals&rh=n%3A1");
    }

    #[test]
    fn test_validation() {
        let mut both = SourceConfig::from_query("x", "mouse");
        both.url = Some("https://www.amazon.com/s".to_string());
        assert!(both.validate().is_err());

        let mut neither = SourceConfig::from_query("x", "mouse");
        neither.query = None;
        assert!(neither.validate().is_err());

        let mut zero = SourceConfig::from_query("x", "mouse");
        zero.max_pages = 0;
        assert!(zero.validate().unwrap_err().to_string().contains("max_pages"));

        assert!(SourceConfig::from_url("x", "/relative").validate().is_err());
        assert!(SourceConfig::from_query("", "mouse").validate().is_err());
    }

    #[test]
    fn test_toml_defaults() {
        let config: SourceConfig = toml::from_str(
            r#"
            label = "mice"
            query = "mouse"
            "#,
        )
        .unwrap();
        assert_eq!(config.max_pages, 5);
        assert!(config.sort.is_none());
    }
}
