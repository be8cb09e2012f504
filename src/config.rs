//! Configuration management with TOML, environment variables, and CLI overrides.

use crate::amazon::regions::Region;
use crate::engine::validate_threshold;
use crate::filters::{FilterChain, FilterChainBuilder};
use crate::sources::{Source, SourceConfig};
use rust_decimal::Decimal;
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

const APP_DIR: &str = "amz-used-watch";

/// Application configuration with layered loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Amazon region
    #[serde(default)]
    pub region: Region,

    /// Proxy URL (e.g., socks5://host:port)
    #[serde(default)]
    pub proxy: Option<String>,

    /// Base delay between pages in milliseconds
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Random jitter added to delay (0 to this value)
    #[serde(default = "default_delay_jitter_ms")]
    pub delay_jitter_ms: u64,

    /// Per-request timeout
    #[serde(default = "default_page_timeout_secs")]
    pub page_timeout_secs: u64,

    /// Minimum drop, in percent of the last seen price, that notifies
    #[serde(default = "default_min_discount_percent")]
    pub min_discount_percent: Decimal,

    /// Persist history between runs
    #[serde(default = "default_true")]
    pub use_history: bool,

    /// History file; defaults to the XDG data directory
    #[serde(default)]
    pub history_path: Option<PathBuf>,

    /// Flush history after this many updates
    #[serde(default = "default_history_flush_every")]
    pub history_flush_every: usize,

    /// Sources scraped at the same time
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Retries per page after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// First retry delay, doubled per attempt
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Consecutive pages without qualifying items before a source stops
    #[serde(default = "default_empty_page_limit")]
    pub empty_page_limit: u32,

    /// Where failed pages are saved; unset disables snapshots
    #[serde(default = "default_debug_dir")]
    pub debug_dir: Option<PathBuf>,

    /// Output format
    #[serde(default)]
    pub format: OutputFormat,

    /// Filter: minimum price
    #[serde(default)]
    pub min_price: Option<Decimal>,

    /// Filter: maximum price
    #[serde(default)]
    pub max_price: Option<Decimal>,

    /// Filter: used/open-box offers only
    #[serde(default = "default_true")]
    pub used_only: bool,

    /// Filter: keywords that must appear in the name
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Filter: keywords that must NOT appear in the name
    #[serde(default)]
    pub exclude_keywords: Vec<String>,

    #[serde(default)]
    pub telegram: Option<TelegramConfig>,

    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

/// Telegram bot credentials and recipients.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub chat_ids: Vec<String>,
}

impl TelegramConfig {
    /// Both a token and at least one recipient are set.
    pub fn is_configured(&self) -> bool {
        !self.bot_token.trim().is_empty() && !self.chat_ids.is_empty()
    }
}

fn default_delay_ms() -> u64 {
    2000
}

fn default_delay_jitter_ms() -> u64 {
    3000
}

fn default_page_timeout_secs() -> u64 {
    30
}

fn default_min_discount_percent() -> Decimal {
    Decimal::from(40)
}

fn default_true() -> bool {
    true
}

fn default_history_flush_every() -> usize {
    25
}

fn default_concurrency() -> usize {
    2
}

fn default_max_retries() -> usize {
    3
}

fn default_retry_backoff_ms() -> u64 {
    2000
}

fn default_empty_page_limit() -> u32 {
    2
}

fn default_debug_dir() -> Option<PathBuf> {
    Some(PathBuf::from("debug_pages"))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            region: Region::Us,
            proxy: None,
            delay_ms: default_delay_ms(),
            delay_jitter_ms: default_delay_jitter_ms(),
            page_timeout_secs: default_page_timeout_secs(),
            min_discount_percent: default_min_discount_percent(),
            use_history: true,
            history_path: None,
            history_flush_every: default_history_flush_every(),
            concurrency: default_concurrency(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            empty_page_limit: default_empty_page_limit(),
            debug_dir: default_debug_dir(),
            format: OutputFormat::Table,
            min_price: None,
            max_price: None,
            used_only: true,
            keywords: Vec::new(),
            exclude_keywords: Vec::new(),
            telegram: None,
            sources: Vec::new(),
        }
    }
}

impl Config {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading config from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Loads configuration with fallback to default locations.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::from_file(path);
        }

        let local_config = Path::new("config.toml");
        if local_config.exists() {
            debug!("Found config.toml in current directory");
            return Self::from_file(local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let xdg_config = config_dir.join(APP_DIR).join("config.toml");
            if xdg_config.exists() {
                debug!("Found config in XDG config directory");
                return Self::from_file(xdg_config);
            }
        }

        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Applies environment variable overrides from the process environment.
    pub fn with_env(self) -> Result<Self> {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides read through `lookup`. Unparsable values are errors.
    pub fn with_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(region) = lookup("AMZ_REGION") {
            self.region = region.parse().map_err(|e| anyhow!("Invalid AMZ_REGION: {}", e))?;
        }

        if let Some(proxy) = lookup("AMZ_PROXY") {
            self.proxy = Some(proxy).filter(|p| !p.trim().is_empty());
        }

        if let Some(delay) = lookup("AMZ_DELAY") {
            self.delay_ms = parse_env("AMZ_DELAY", &delay)?;
        }

        if let Some(discount) = lookup("AMZ_MIN_DISCOUNT") {
            self.min_discount_percent = parse_env("AMZ_MIN_DISCOUNT", &discount)?;
        }

        if let Some(use_history) = lookup("AMZ_USE_HISTORY") {
            self.use_history = parse_bool("AMZ_USE_HISTORY", &use_history)?;
        }

        if let Some(concurrency) = lookup("AMZ_CONCURRENCY") {
            self.concurrency = parse_env("AMZ_CONCURRENCY", &concurrency)?;
        }

        if let Some(path) = lookup("AMZ_HISTORY_FILE") {
            self.history_path = Some(PathBuf::from(path));
        }

        if let Some(token) = lookup("TELEGRAM_BOT_TOKEN") {
            self.telegram.get_or_insert_with(TelegramConfig::default).bot_token = token;
        }

        if let Some(chat_ids) = lookup("TELEGRAM_CHAT_IDS") {
            self.telegram.get_or_insert_with(TelegramConfig::default).chat_ids = chat_ids
                .split(',')
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .collect();
        }

        Ok(self)
    }

    /// Rejects out-of-range values instead of clamping them.
    pub fn validate(&self) -> Result<()> {
        validate_threshold(self.min_discount_percent)
            .context("min_discount_percent must be within 0-100")?;

        if self.concurrency == 0 {
            bail!("concurrency must be at least 1");
        }
        if self.history_flush_every == 0 {
            bail!("history_flush_every must be at least 1");
        }
        if self.empty_page_limit == 0 {
            bail!("empty_page_limit must be at least 1");
        }
        if self.page_timeout_secs == 0 {
            bail!("page_timeout_secs must be at least 1");
        }
        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                bail!("min_price ({}) is greater than max_price ({})", min, max);
            }
        }
        for source in &self.sources {
            source.validate()?;
        }
        Ok(())
    }

    /// History file for this run, or `None` when history is disabled.
    pub fn history_file(&self) -> Option<PathBuf> {
        if !self.use_history {
            return None;
        }
        Some(self.history_path.clone().unwrap_or_else(default_history_path))
    }

    /// Resolves configured sources, optionally restricted to `labels`.
    pub fn resolve_sources(&self, labels: &[String]) -> Result<Vec<Source>> {
        if self.sources.is_empty() {
            bail!("No sources configured. Add [[sources]] to the config file.");
        }

        for label in labels {
            if !self.sources.iter().any(|s| &s.label == label) {
                bail!("Unknown source '{}'", label);
            }
        }

        self.sources
            .iter()
            .filter(|s| labels.is_empty() || labels.contains(&s.label))
            .map(|s| s.resolve(self.region))
            .collect()
    }

    /// Builds the qualifying-item filter chain.
    pub fn filter_chain(&self) -> FilterChain {
        FilterChainBuilder::new()
            .price_range(self.min_price, self.max_price)
            .used_only(self.used_only)
            .keywords(self.keywords.clone())
            .exclude_keywords(self.exclude_keywords.clone())
            .build()
    }

    /// Telegram settings when complete enough to send.
    pub fn telegram(&self) -> Option<&TelegramConfig> {
        self.telegram.as_ref().filter(|t| t.is_configured())
    }
}

/// `<XDG data dir>/amz-used-watch/history.json`, else `./history.json`.
pub fn default_history_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR).join("history.json"))
        .unwrap_or_else(|| PathBuf::from("history.json"))
}

fn parse_env<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    value.trim().parse().map_err(|e| anyhow!("Invalid {}='{}': {}", key, value, e))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("Invalid {}='{}': expected true or false", key, value),
    }
}

/// Output format for results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Markdown,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown format: {}. Use: table, json, markdown, csv", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.region, Region::Us);
        assert_eq!(config.delay_ms, 2000);
        assert_eq!(config.delay_jitter_ms, 3000);
        assert_eq!(config.min_discount_percent, Decimal::from(40));
        assert!(config.use_history);
        assert_eq!(config.history_flush_every, 25);
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.empty_page_limit, 2);
        assert_eq!(config.debug_dir, Some(PathBuf::from("debug_pages")));
        assert!(config.used_only);
        assert!(config.telegram.is_none());
        assert!(config.sources.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("TABLE".parse::<OutputFormat>().unwrap(), OutputFormat::Table);
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("md".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert_eq!("csv".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);

        let err = "invalid".parse::<OutputFormat>().unwrap_err();
        assert!(err.contains("table, json, markdown, csv"));
    }

    #[test]
    fn test_config_from_toml_all_fields() {
        let toml = r#"
            region = "br"
            proxy = "socks5://localhost:1080"
            delay_ms = 5000
            delay_jitter_ms = 1000
            min_discount_percent = 30
            use_history = false
            history_path = "/tmp/h.json"
            concurrency = 4
            debug_dir = "snapshots"
            format = "json"
            min_price = 10.0
            max_price = 100.0
            used_only = false
            keywords = ["rtx"]
            exclude_keywords = ["capa"]

            [telegram]
            bot_token = "123:abc"
            chat_ids = ["111", "-100222"]

            [[sources]]
            label = "gpus"
            query = "placa de video"
            max_pages = 20
            sort = "price-asc-rank"

            [[sources]]
            label = "deals"
            url = "https://www.amazon.com.br/s?i=warehouse-deals"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.region, Region::Br);
        assert_eq!(config.min_discount_percent, Decimal::from(30));
        assert!(!config.use_history);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.format, OutputFormat::Json);
        assert!(!config.used_only);
        assert_eq!(config.telegram().unwrap().chat_ids, vec!["111", "-100222"]);
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].max_pages, 20);
        assert_eq!(config.sources[1].max_pages, 5);
        assert!(config.history_file().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            region = "fr"
            delay_ms = 4000
            "#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.region, Region::Fr);
        assert_eq!(config.delay_ms, 4000);
    }

    #[test]
    fn test_config_from_file_errors() {
        let err = Config::from_file("/nonexistent/path/config.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not valid toml {{{{").unwrap();
        let err = Config::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::new()
            .with_env_from(env(&[
                ("AMZ_REGION", "de"),
                ("AMZ_PROXY", "http://proxy:8080"),
                ("AMZ_DELAY", "5000"),
                ("AMZ_MIN_DISCOUNT", "25.5"),
                ("AMZ_USE_HISTORY", "no"),
                ("AMZ_CONCURRENCY", "5"),
                ("AMZ_HISTORY_FILE", "/data/h.json"),
                ("TELEGRAM_BOT_TOKEN", "t0k"),
                ("TELEGRAM_CHAT_IDS", "1, 2,,3"),
            ]))
            .unwrap();

        assert_eq!(config.region, Region::De);
        assert_eq!(config.proxy.as_deref(), Some("http://proxy:8080"));
        assert_eq!(config.delay_ms, 5000);
        assert_eq!(config.min_discount_percent, Decimal::new(255, 1));
        assert!(!config.use_history);
        assert_eq!(config.concurrency, 5);
        assert_eq!(config.history_path, Some(PathBuf::from("/data/h.json")));
        let telegram = config.telegram().unwrap();
        assert_eq!(telegram.bot_token, "t0k");
        assert_eq!(telegram.chat_ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_env_invalid_values_are_errors() {
        let err = Config::new().with_env_from(env(&[("AMZ_DELAY", "soon")])).unwrap_err();
        assert!(err.to_string().contains("AMZ_DELAY"));

        let err = Config::new().with_env_from(env(&[("AMZ_REGION", "atlantis")])).unwrap_err();
        assert!(err.to_string().contains("Valid regions"));

        assert!(Config::new().with_env_from(env(&[("AMZ_USE_HISTORY", "maybe")])).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = Config { min_discount_percent: Decimal::from(140), ..Config::default() };
        assert!(config.validate().is_err());

        let config = Config { concurrency: 0, ..Config::default() };
        assert!(config.validate().unwrap_err().to_string().contains("concurrency"));

        let config = Config { empty_page_limit: 0, ..Config::default() };
        assert!(config.validate().is_err());

        let config = Config { history_flush_every: 0, ..Config::default() };
        assert!(config.validate().is_err());

        let config = Config { min_price: Some(Decimal::from(50)), max_price: Some(Decimal::TEN), ..Config::default() };
        assert!(config.validate().is_err());

        let mut bad_source = SourceConfig::from_query("x", "y");
        bad_source.max_pages = 0;
        let config = Config { sources: vec![bad_source], ..Config::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolve_sources() {
        let config = Config {
            region: Region::Uk,
            sources: vec![
                SourceConfig::from_query("a", "lego"),
                SourceConfig::from_url("b", "https://www.amazon.co.uk/s?i=warehouse-deals"),
            ],
            ..Config::default()
        };

        let all = config.resolve_sources(&[]).unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[0].base_url.starts_with("https://www.amazon.co.uk/s?k=lego"));

        let only_b = config.resolve_sources(&["b".to_string()]).unwrap();
        assert_eq!(only_b.len(), 1);
        assert_eq!(only_b[0].label, "b");

        assert!(config.resolve_sources(&["zzz".to_string()]).is_err());
        assert!(Config::default().resolve_sources(&[]).is_err());
    }

    #[test]
    fn test_history_file() {
        let config = Config { history_path: Some(PathBuf::from("h.json")), ..Config::default() };
        assert_eq!(config.history_file(), Some(PathBuf::from("h.json")));
        assert!(Config::default().history_file().unwrap().ends_with("history.json"));
    }

    #[test]
    fn test_incomplete_telegram_is_ignored() {
        let config = Config {
            telegram: Some(TelegramConfig { bot_token: "t".to_string(), chat_ids: Vec::new() }),
            ..Config::default()
        };
        assert!(config.telegram().is_none());
    }

    #[test]
    fn test_filter_chain_from_config() {
        let config = Config { min_price: Some(Decimal::from(5)), keywords: vec!["rtx".to_string()], ..Config::default() };
        // price, used-only, keywords
        assert_eq!(config.filter_chain().len(), 3);
    }
}
