//! Amazon marketplaces that run a used/open-box ("warehouse deals") section.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Supported marketplaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    #[default]
    Us,
    Uk,
    De,
    Fr,
    Es,
    It,
    Ca,
    Jp,
    Br,
    Mx,
}

/// Static per-marketplace facts.
struct RegionInfo {
    code: &'static str,
    domain: &'static str,
    currency: &'static str,
    accept_language: &'static str,
    comma_decimal: bool,
    used_keywords: &'static [&'static str],
}

const ENGLISH_USED: &[&str] =
    &["used", "renewed", "refurbished", "open box", "pre-owned", "like new"];

impl Region {
    fn info(&self) -> RegionInfo {
        match self {
            Region::Us => RegionInfo {
                code: "us",
                domain: "amazon.com",
                currency: "USD",
                accept_language: "en-US,en;q=0.9",
                comma_decimal: false,
                used_keywords: ENGLISH_USED,
            },
            Region::Uk => RegionInfo {
                code: "uk",
                domain: "amazon.co.uk",
                currency: "GBP",
                accept_language: "en-GB,en;q=0.9",
                comma_decimal: false,
                used_keywords: ENGLISH_USED,
            },
            Region::De => RegionInfo {
                code: "de",
                domain: "amazon.de",
                currency: "EUR",
                accept_language: "de-DE,de;q=0.9,en;q=0.8",
                comma_decimal: true,
                used_keywords: &["gebraucht", "wie neu", "generalüberholt", "used"],
            },
            Region::Fr => RegionInfo {
                code: "fr",
                domain: "amazon.fr",
                currency: "EUR",
                accept_language: "fr-FR,fr;q=0.9,en;q=0.8",
                comma_decimal: true,
                used_keywords: &["occasion", "comme neuf", "reconditionné", "used"],
            },
            Region::Es => RegionInfo {
                code: "es",
                domain: "amazon.es",
                currency: "EUR",
                accept_language: "es-ES,es;q=0.9,en;q=0.8",
                comma_decimal: true,
                used_keywords: &["usado", "como nuevo", "reacondicionado", "used"],
            },
            Region::It => RegionInfo {
                code: "it",
                domain: "amazon.it",
                currency: "EUR",
                accept_language: "it-IT,it;q=0.9,en;q=0.8",
                comma_decimal: true,
                used_keywords: &["usato", "come nuovo", "ricondizionato", "used"],
            },
            Region::Ca => RegionInfo {
                code: "ca",
                domain: "amazon.ca",
                currency: "CAD",
                accept_language: "en-CA,en;q=0.9,fr;q=0.8",
                comma_decimal: false,
                used_keywords: ENGLISH_USED,
            },
            Region::Jp => RegionInfo {
                code: "jp",
                domain: "amazon.co.jp",
                currency: "JPY",
                accept_language: "ja-JP,ja;q=0.9,en;q=0.8",
                comma_decimal: false,
                used_keywords: &["中古", "整備済み", "used"],
            },
            Region::Br => RegionInfo {
                code: "br",
                domain: "amazon.com.br",
                currency: "BRL",
                accept_language: "pt-BR,pt;q=0.9,en;q=0.8",
                comma_decimal: true,
                used_keywords: &["usado", "quase novo", "seminovo", "recondicionado", "used"],
            },
            Region::Mx => RegionInfo {
                code: "mx",
                domain: "amazon.com.mx",
                currency: "MXN",
                accept_language: "es-MX,es;q=0.9,en;q=0.8",
                comma_decimal: false,
                used_keywords: &["usado", "como nuevo", "reacondicionado", "used"],
            },
        }
    }

    /// Returns the Amazon domain for this region.
    pub fn domain(&self) -> &'static str {
        self.info().domain
    }

    /// Returns the base URL for this region.
    pub fn base_url(&self) -> String {
        format!("https://www.{}", self.domain())
    }

    /// Returns the currency code for this region.
    pub fn currency(&self) -> &'static str {
        self.info().currency
    }

    /// Returns the Accept-Language header value for this region.
    pub fn accept_language(&self) -> &'static str {
        self.info().accept_language
    }

    /// Returns whether prices are written as `1.234,56`.
    pub fn uses_comma_decimal(&self) -> bool {
        self.info().comma_decimal
    }

    /// Lowercase words that mark an offer as used/open-box on this marketplace.
    pub fn used_keywords(&self) -> &'static [&'static str] {
        self.info().used_keywords
    }

    /// Returns the matching used-condition keyword contained in `text`, if any.
    pub fn match_used_keyword(&self, text: &str) -> Option<&'static str> {
        let lower = text.to_lowercase();
        self.used_keywords().iter().copied().find(|k| lower.contains(k))
    }

    /// Builds the used/open-box search URL for a free-text query.
    pub fn used_search_url(&self, query: &str, sort: Option<&str>) -> String {
        let mut url = format!(
            "{}/s?k={}&i=warehouse-deals",
            self.base_url(),
            urlencoding::encode(query.trim())
        );
        if let Some(sort) = sort.filter(|s| !s.is_empty()) {
            url.push_str("&s=");
            url.push_str(&urlencoding::encode(sort));
        }
        url
    }

    /// Canonical product page URL for an ASIN.
    pub fn product_url(&self, asin: &str) -> String {
        format!("{}/dp/{}", self.base_url(), asin)
    }

    /// Returns all supported regions.
    pub fn all() -> &'static [Region] {
        &[
            Region::Us,
            Region::Uk,
            Region::De,
            Region::Fr,
            Region::Es,
            Region::It,
            Region::Ca,
            Region::Jp,
            Region::Br,
            Region::Mx,
        ]
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.info().code)
    }
}

impl FromStr for Region {
    type Err = RegionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "us" | "usa" => Ok(Region::Us),
            "uk" | "gb" => Ok(Region::Uk),
            "de" | "germany" => Ok(Region::De),
            "fr" | "france" => Ok(Region::Fr),
            "es" | "spain" => Ok(Region::Es),
            "it" | "italy" => Ok(Region::It),
            "ca" | "canada" => Ok(Region::Ca),
            "jp" | "japan" => Ok(Region::Jp),
            "br" | "brazil" | "brasil" => Ok(Region::Br),
            "mx" | "mexico" => Ok(Region::Mx),
            _ => Err(RegionParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Unknown region '{0}'. Valid regions: us, uk, de, fr, es, it, ca, jp, br, mx")]
pub struct RegionParseError(String);
