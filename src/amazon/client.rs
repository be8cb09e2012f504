//! HTTP page fetcher for Amazon using wreq for TLS fingerprint emulation.

use crate::amazon::regions::Region;
use crate::config::Config;
use crate::scrape::{PageError, PageFetcher};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};
use wreq::Client;
use wreq_util::Emulation;

/// One browsing session against an Amazon marketplace.
///
/// Each source task owns its own client so cookies never leak between
/// sources.
pub struct AmazonClient {
    client: Client,
    region: Region,
}

impl AmazonClient {
    /// Creates a new session with the given configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let mut builder = Client::builder()
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .timeout(Duration::from_secs(config.page_timeout_secs))
            .connect_timeout(Duration::from_secs(10));

        if let Some(proxy_url) = &config.proxy {
            debug!("Configuring proxy: {}", proxy_url);
            let proxy = wreq::Proxy::all(proxy_url).context("Failed to configure proxy")?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().context("Failed to build HTTP client")?;

        Ok(Self { client, region: config.region })
    }

    /// Returns the configured region.
    pub fn region(&self) -> Region {
        self.region
    }
}

#[async_trait]
impl PageFetcher for AmazonClient {
    async fn fetch(&self, url: &str) -> Result<String, PageError> {
        debug!("GET {}", url);

        let network = |e: wreq::Error| PageError::Network { url: url.to_string(), message: e.to_string() };

        let response = self
            .client
            .get(url)
            .emulation(Emulation::Chrome131)
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8")
            .header("Accept-Language", self.region.accept_language())
            .header("Accept-Encoding", "gzip, deflate, br")
            .header("Cache-Control", "no-cache")
            .header("Pragma", "no-cache")
            .header("Sec-Fetch-Dest", "document")
            .header("Sec-Fetch-Mode", "navigate")
            .header("Sec-Fetch-Site", "same-origin")
            .header("Upgrade-Insecure-Requests", "1")
            .send()
            .await
            .map_err(network)?;

        let status = response.status().as_u16();
        debug!("Response status: {}", status);

        match status {
            200..=299 => {}
            429 | 503 => {
                warn!("Rate limited ({}) at {}", status, url);
                return Err(PageError::RateLimited { url: url.to_string(), status });
            }
            403 => return Err(PageError::Blocked { url: url.to_string(), status }),
            _ => return Err(PageError::Http { url: url.to_string(), status }),
        }

        response.text().await.map_err(network)
    }
}
