// Integration tests for Hotdeal Watcher
// These tests run whole ticks against local HTTP servers standing in for deal
// sites and proxies.

pub mod proxy_fallback_tests;
pub mod watch_cycle_tests;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hotdeal_watcher::{
    config::{FetcherConfig, SchedulerConfig},
    fetcher::{HttpFetcher, ProxyCache},
    notifier::{AlertMessage, Notifier},
    plugins::{NotificationSink, PluginManager, SiteParser},
    store::JsonFileStateStore,
    KeywordRegistry, SinkError, WatchEngine, WatchScheduler,
};

/// Sink that keeps every alert in memory.
#[derive(Default)]
pub struct RecordingSink {
    received: Mutex<Vec<AlertMessage>>,
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<AlertMessage> {
        self.received.lock().unwrap().clone()
    }

    pub fn subjects(&self) -> Vec<String> {
        self.messages().into_iter().map(|m| m.subject).collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, subject: &str, html_body: &str) -> Result<(), SinkError> {
        self.received.lock().unwrap().push(AlertMessage {
            subject: subject.to_string(),
            html_body: html_body.to_string(),
        });
        Ok(())
    }
}

pub fn test_fetcher_config() -> FetcherConfig {
    FetcherConfig {
        request_timeout_secs: 5,
        run_timeout_secs: 10,
        proxy_jitter_min_ms: 0,
        proxy_jitter_max_ms: 0,
        ..FetcherConfig::default()
    }
}

pub fn test_scheduler_config() -> SchedulerConfig {
    SchedulerConfig {
        cron: "0 0 0 1 1 *".to_string(),
        run_on_start: true,
        prune_stale_state: true,
    }
}

/// A running watcher wired like the binary does it, minus the real sites.
pub struct TestStack {
    pub registry: KeywordRegistry,
    pub sink: Arc<RecordingSink>,
    pub scheduler: WatchScheduler,
    pub state_dir: PathBuf,
}

pub async fn build_stack(
    data_dir: &Path,
    sites: Vec<Arc<dyn SiteParser>>,
    proxies: Vec<String>,
    keywords: &[&str],
) -> anyhow::Result<TestStack> {
    let registry = KeywordRegistry::new(data_dir.join("data.json"));
    for keyword in keywords {
        registry.add(keyword)?;
    }

    let state_dir = data_dir.join("state");
    let store = JsonFileStateStore::new(&state_dir)?;
    let fetcher = HttpFetcher::new(test_fetcher_config(), Arc::new(ProxyCache::fixed(proxies)))?;

    let plugins = PluginManager::new();
    for site in sites {
        plugins.register_site(site).await;
    }

    let sink = Arc::new(RecordingSink::default());
    let notifier = Notifier::new(vec![sink.clone() as Arc<dyn NotificationSink>]);
    let engine = WatchEngine::new(
        Arc::new(fetcher),
        Arc::new(store),
        Arc::new(notifier),
        Duration::from_secs(10),
    );

    let scheduler = WatchScheduler::new(Arc::new(engine), registry.clone(), plugins, test_scheduler_config()).await?;
    Ok(TestStack {
        registry,
        sink,
        scheduler,
        state_dir,
    })
}

/// An algumon search result page listing `(id, title, price)` newest first.
pub fn algumon_page(deals: &[(&str, &str, &str)]) -> String {
    let items: String = deals
        .iter()
        .map(|(id, title, price)| {
            format!(
                r#"<li data-post-id="{id}" data-action-uri="/l/d/{id}">
                     <a class="product-link" href="/l/d/{id}">{title}</a>
                     <small class="product-price">{price}</small>
                     <small class="deal-price-meta-info">쿠팡 | 무료배송</small>
                   </li>"#
            )
        })
        .collect();
    format!(r#"<html><body><ul class="product post-list">{items}</ul></body></html>"#)
}

/// An fmkorea hot-deal board page listing `(document id, title, price)`.
pub fn fmkorea_page(posts: &[(&str, &str, &str)]) -> String {
    let items: String = posts
        .iter()
        .map(|(id, title, price)| {
            format!(
                r#"<li class="li">
                     <h3 class="title"><a href="/{id}">{title} <span class="comment_count">[3]</span></a></h3>
                     <div class="hotdeal_info">
                       <span>쇼핑몰: <a>지마켓</a></span> / <span>가격: <a>{price}</a></span>
                     </div>
                   </li>"#
            )
        })
        .collect();
    format!(r#"<html><body><div class="fm_best_widget"><ul>{items}</ul></div></body></html>"#)
}
