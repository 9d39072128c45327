//! Page retrieval with proxy fallback for blocked requests.

pub mod proxy;

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, ClientBuilder, Proxy, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::FetcherConfig;
use crate::models::PageContent;
use crate::utils::error::{FetchError, Result};

pub use proxy::{FreeProxyListSource, ProxyCache, ProxySource};

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> std::result::Result<PageContent, FetchError>;
}

/// Direct HTTP fetcher that retries through proxy candidates on HTTP 403.
///
/// Only an explicit block triggers the fallback. Any other non-success status
/// or transport error on the direct attempt fails immediately. Candidates that
/// fail are evicted from the shared cache.
pub struct HttpFetcher {
    client: Client,
    proxies: Arc<ProxyCache>,
    config: FetcherConfig,
}

impl HttpFetcher {
    pub fn new(config: FetcherConfig, proxies: Arc<ProxyCache>) -> Result<Self> {
        // Direct attempts never go through system proxies.
        let client = Self::client_builder(&config).no_proxy().build()?;

        Ok(Self {
            client,
            proxies,
            config,
        })
    }

    pub fn proxies(&self) -> &Arc<ProxyCache> {
        &self.proxies
    }

    fn client_builder(config: &FetcherConfig) -> ClientBuilder {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("ko-KR,ko;q=0.9,en-US;q=0.8,en;q=0.7"),
        );

        Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
    }

    async fn fetch_via_proxies(&self, url: &str) -> std::result::Result<PageContent, FetchError> {
        let candidates = self.proxies.candidates().await;
        if candidates.is_empty() {
            error!(url, "blocked and no proxy candidates available");
            return Err(FetchError::Blocked);
        }

        for (attempt, proxy) in candidates.iter().enumerate() {
            match self.fetch_through(url, proxy).await {
                Ok(body) => {
                    info!(url, proxy = %proxy, attempt = attempt + 1, "fetched through proxy");
                    return Ok(PageContent {
                        url: url.to_string(),
                        body,
                        via_proxy: Some(proxy.clone()),
                    });
                }
                Err(reason) => {
                    warn!(url, proxy = %proxy, "proxy attempt failed, dropping candidate: {}", reason);
                    self.proxies.evict(proxy).await;
                    if attempt + 1 < candidates.len() {
                        self.jitter().await;
                    }
                }
            }
        }

        error!(url, tried = candidates.len(), "every proxy candidate failed, list will be refreshed");
        Err(FetchError::Blocked)
    }

    /// Returns the body only for HTTP 200; anything else is a reason to move on.
    async fn fetch_through(&self, url: &str, proxy: &str) -> std::result::Result<String, String> {
        let proxy = Proxy::all(proxy).map_err(|e| format!("invalid proxy: {}", e))?;
        let client = Self::client_builder(&self.config)
            .proxy(proxy)
            .build()
            .map_err(|e| e.to_string())?;

        let response = client.get(url).send().await.map_err(|e| e.to_string())?;
        if response.status() != StatusCode::OK {
            return Err(format!("HTTP {}", response.status()));
        }
        response.text().await.map_err(|e| e.to_string())
    }

    async fn jitter(&self) {
        let (min, max) = (self.config.proxy_jitter_min_ms, self.config.proxy_jitter_max_ms);
        let wait = if max > min { fastrand::u64(min..=max) } else { min };
        if wait > 0 {
            debug!(wait_ms = wait, "waiting before next proxy");
            tokio::time::sleep(Duration::from_millis(wait)).await;
        }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<PageContent, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&e))?;

        let status = response.status();
        if status == StatusCode::FORBIDDEN {
            warn!(url, "direct request blocked (403), retrying through proxies");
            return self.fetch_via_proxies(url).await;
        }
        if !status.is_success() {
            return Err(FetchError::Network(format!("HTTP {} from {}", status, url)));
        }

        let body = response.text().await.map_err(|e| FetchError::from_reqwest(&e))?;
        debug!(url, bytes = body.len(), "fetched directly");
        Ok(PageContent::direct(url, body))
    }
}
