use std::sync::Arc;
use tokio::sync::RwLock;

use super::notifiers::{DiscordSink, EmailSink, LogSink};
use super::sites::{AlgumonParser, FmKoreaParser};
use super::traits::{NotificationSink, SiteParser};
use crate::config::AppConfig;
use crate::utils::error::AppError;

pub type SitePluginBox = Arc<dyn SiteParser>;
pub type SinkPluginBox = Arc<dyn NotificationSink>;

pub const BUILTIN_SITES: &[&str] = &["algumon", "fmkorea"];

/// Registries of site parsers and notification sinks.
///
/// Both registries keep registration order, which is the order the scheduler
/// visits sites and the order sinks are called in.
#[derive(Clone, Default)]
pub struct PluginManager {
    sites: Arc<RwLock<Vec<SitePluginBox>>>,
    sinks: Arc<RwLock<Vec<SinkPluginBox>>>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a site parser, replacing any parser with the same name.
    pub async fn register_site(&self, plugin: SitePluginBox) {
        let mut sites = self.sites.write().await;
        match sites.iter().position(|s| s.name() == plugin.name()) {
            Some(index) => sites[index] = plugin,
            None => sites.push(plugin),
        }
    }

    /// Register a notification sink, replacing any sink with the same name.
    pub async fn register_sink(&self, plugin: SinkPluginBox) {
        let mut sinks = self.sinks.write().await;
        match sinks.iter().position(|s| s.name() == plugin.name()) {
            Some(index) => sinks[index] = plugin,
            None => sinks.push(plugin),
        }
    }

    pub async fn has_site(&self, name: &str) -> bool {
        self.sites.read().await.iter().any(|s| s.name() == name)
    }

    pub async fn has_sink(&self, name: &str) -> bool {
        self.sinks.read().await.iter().any(|s| s.name() == name)
    }

    pub async fn list_site_types(&self) -> Vec<String> {
        self.sites.read().await.iter().map(|s| s.name().to_string()).collect()
    }

    pub async fn list_sink_types(&self) -> Vec<String> {
        self.sinks.read().await.iter().map(|s| s.name().to_string()).collect()
    }

    pub async fn site(&self, name: &str) -> Option<SitePluginBox> {
        self.sites.read().await.iter().find(|s| s.name() == name).cloned()
    }

    pub async fn sites(&self) -> Vec<SitePluginBox> {
        self.sites.read().await.clone()
    }

    pub async fn sinks(&self) -> Vec<SinkPluginBox> {
        self.sinks.read().await.clone()
    }

    /// Instantiate a built-in site parser by name.
    pub fn create_site(name: &str) -> Result<SitePluginBox, AppError> {
        match name {
            "algumon" => Ok(Arc::new(AlgumonParser::new())),
            "fmkorea" => Ok(Arc::new(FmKoreaParser::new())),
            other => Err(AppError::Plugin {
                plugin_type: other.to_string(),
                message: format!("unknown site, expected one of {}", BUILTIN_SITES.join(", ")),
            }),
        }
    }

    /// Register the enabled sites and every configured sink.
    pub async fn initialize_from_config(&self, config: &AppConfig) -> Result<(), AppError> {
        for name in &config.sites.enabled {
            self.register_site(Self::create_site(name)?).await;
        }

        let notifications = &config.notifications;
        if notifications.smtp.enabled {
            self.register_sink(Arc::new(EmailSink::new(&notifications.smtp)?)).await;
        }
        if let Some(webhook_url) = &notifications.discord.webhook_url {
            let sink = DiscordSink::new(webhook_url.clone(), notifications.discord.username.clone())?;
            self.register_sink(Arc::new(sink)).await;
        }
        if notifications.log.enabled {
            self.register_sink(Arc::new(LogSink::new())).await;
        }

        if self.sinks.read().await.is_empty() {
            tracing::warn!("no notification sink configured, alerts will be dropped");
        }
        tracing::info!(
            sites = ?self.list_site_types().await,
            sinks = ?self.list_sink_types().await,
            "plugins initialized"
        );
        Ok(())
    }
}
