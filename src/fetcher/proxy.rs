//! Process-wide proxy candidate cache used when a site blocks direct requests.

use async_trait::async_trait;
use scraper::{Html, Selector};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::FetcherConfig;
use crate::utils::error::Result;

/// Where proxy candidates come from.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProxySource: Send + Sync {
    async fn fetch_candidates(&self) -> Result<Vec<String>>;
}

/// Scrapes the public proxy table published at `proxy_list_url`.
pub struct FreeProxyListSource {
    client: reqwest::Client,
    url: String,
    limit: usize,
}

impl FreeProxyListSource {
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            client,
            url: config.proxy_list_url.clone(),
            limit: config.max_proxy_candidates,
        })
    }
}

#[async_trait]
impl ProxySource for FreeProxyListSource {
    async fn fetch_candidates(&self) -> Result<Vec<String>> {
        let response = self.client.get(&self.url).send().await?.error_for_status()?;
        let html = response.text().await?;
        Ok(parse_proxy_table(&html, self.limit))
    }
}

/// Extracts `http://ip:port` entries from an HTML proxy table.
///
/// Rows whose "Https" column says `no` are skipped since every watched site is
/// served over TLS and needs CONNECT support.
pub fn parse_proxy_table(html: &str, limit: usize) -> Vec<String> {
    let document = Html::parse_document(html);
    let (Ok(header_sel), Ok(row_sel), Ok(cell_sel)) = (
        Selector::parse("table thead th"),
        Selector::parse("table tbody tr"),
        Selector::parse("td"),
    ) else {
        return Vec::new();
    };

    let https_column = document
        .select(&header_sel)
        .position(|th| th.text().collect::<String>().trim().eq_ignore_ascii_case("https"));

    let mut proxies = Vec::new();
    for row in document.select(&row_sel) {
        let cells: Vec<String> = row
            .select(&cell_sel)
            .map(|td| td.text().collect::<String>().trim().to_string())
            .collect();

        let (Some(ip), Some(port)) = (cells.first(), cells.get(1)) else {
            continue;
        };
        if ip.parse::<IpAddr>().is_err() || port.parse::<u16>().is_err() {
            continue;
        }
        if let Some(col) = https_column {
            if cells.get(col).is_some_and(|v| v.eq_ignore_ascii_case("no")) {
                continue;
            }
        }

        let candidate = format!("http://{}:{}", ip, port);
        if !proxies.contains(&candidate) {
            proxies.push(candidate);
        }
        if proxies.len() >= limit {
            break;
        }
    }
    proxies
}

/// Lazily filled list of proxy candidates shared by all fetches.
///
/// The list is only refreshed when it is empty, so a single scrape of the
/// source serves many blocked requests. Candidates that fail are evicted, which
/// empties the list once every candidate is dead. [`ProxyCache::reset`] forces
/// the next use to refresh. Concurrent refreshes are last-writer-wins.
pub struct ProxyCache {
    source: Arc<dyn ProxySource>,
    candidates: RwLock<Vec<String>>,
}

impl ProxyCache {
    pub fn new(source: Arc<dyn ProxySource>) -> Self {
        Self {
            source,
            candidates: RwLock::new(Vec::new()),
        }
    }

    /// A fixed list that refills from the same candidates once exhausted.
    pub fn fixed(candidates: Vec<String>) -> Self {
        Self {
            source: Arc::new(StaticProxySource(candidates.clone())),
            candidates: RwLock::new(candidates),
        }
    }

    pub async fn candidates(&self) -> Vec<String> {
        {
            let cached = self.candidates.read().await;
            if !cached.is_empty() {
                return cached.clone();
            }
        }

        match self.source.fetch_candidates().await {
            Ok(fresh) => {
                if fresh.is_empty() {
                    warn!("proxy source returned no candidates");
                } else {
                    info!(count = fresh.len(), "refreshed proxy candidates");
                }
                *self.candidates.write().await = fresh.clone();
                fresh
            }
            Err(e) => {
                warn!("failed to refresh proxy candidates: {}", e);
                Vec::new()
            }
        }
    }

    /// Drops a candidate that failed, so an exhausted list refreshes on next use.
    pub async fn evict(&self, proxy: &str) {
        let mut cached = self.candidates.write().await;
        cached.retain(|candidate| candidate != proxy);
        debug!(proxy, remaining = cached.len(), "evicted proxy candidate");
    }

    pub async fn reset(&self) {
        self.candidates.write().await.clear();
        info!("proxy candidate cache reset");
    }

    pub async fn cached_len(&self) -> usize {
        self.candidates.read().await.len()
    }
}

struct StaticProxySource(Vec<String>);

#[async_trait]
impl ProxySource for StaticProxySource {
    async fn fetch_candidates(&self) -> Result<Vec<String>> {
        Ok(self.0.clone())
    }
}
