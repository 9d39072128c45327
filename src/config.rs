use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use url::Url;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data: DataConfig,
    pub fetcher: FetcherConfig,
    pub scheduler: SchedulerConfig,
    pub sites: SitesConfig,
    pub notifications: NotificationsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub dir: PathBuf,
    pub registry_file: PathBuf,
    pub state_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
            registry_file: PathBuf::from("data/data.json"),
            state_dir: PathBuf::from("data/state"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Per-request timeout, direct or proxied.
    pub request_timeout_secs: u64,
    /// Bound on one pair's whole fetch, proxy fallback included.
    pub run_timeout_secs: u64,
    pub user_agent: String,
    pub proxy_jitter_min_ms: u64,
    pub proxy_jitter_max_ms: u64,
    pub proxy_list_url: String,
    pub max_proxy_candidates: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 100,
            run_timeout_secs: 600,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".to_string(),
            proxy_jitter_min_ms: 500,
            proxy_jitter_max_ms: 2000,
            proxy_list_url: "https://free-proxy-list.net/".to_string(),
            max_proxy_candidates: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Six-field cron expression, seconds first.
    pub cron: String,
    pub run_on_start: bool,
    pub prune_stale_state: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cron: "0 0,30 * * * *".to_string(),
            run_on_start: true,
            prune_stale_state: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SitesConfig {
    pub enabled: Vec<String>,
}

impl Default for SitesConfig {
    fn default() -> Self {
        Self {
            enabled: vec!["algumon".to_string(), "fmkorea".to_string()],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    pub smtp: SmtpConfig,
    pub discord: DiscordConfig,
    pub log: LogSinkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    /// Account identity; also used as sender and recipient.
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_name: String,
    pub use_tls: bool,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "smtp.kakao.com".to_string(),
            port: 465,
            username: None,
            password: None,
            from_name: "Hotdeal Watcher".to_string(),
            use_tls: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    pub webhook_url: Option<String>,
    pub username: String,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            username: "Hotdeal Watcher".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSinkConfig {
    pub enabled: bool,
}

impl Default for LogSinkConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
    pub directory: Option<PathBuf>,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "hotdeal_watcher=info".to_string(),
            directory: None,
            json: false,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let mut builder = Config::builder()
            // Defaults come from the Default impls; files are all optional
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false));

        if let Some(path) = explicit {
            builder = builder.add_source(File::from(path).required(true));
        }

        let s = builder
            // Add environment variables with prefix "HOTDEAL_"
            .add_source(Environment::with_prefix("HOTDEAL").separator("__"))
            .build()?;

        let host_set = s.get_string("notifications.smtp.host").is_ok();
        let port_set = s.get_int("notifications.smtp.port").is_ok();
        let mut config: AppConfig = s.try_deserialize()?;
        config.apply_legacy_smtp(host_set, port_set, |name| env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// SMTP_SERVER / SMTP_PORT / SMTP_EMAIL / SMTP_PASSWORD fill in anything
    /// the config sources left unset.
    fn apply_legacy_smtp(&mut self, host_set: bool, port_set: bool, var: impl Fn(&str) -> Option<String>) {
        let lookup = |name: &str| var(name).filter(|v| !v.is_empty());
        let smtp = &mut self.notifications.smtp;

        if !host_set {
            if let Some(host) = lookup("SMTP_SERVER") {
                smtp.host = host;
            }
        }
        if !port_set {
            if let Some(port) = lookup("SMTP_PORT").and_then(|p| p.parse().ok()) {
                smtp.port = port;
            }
        }
        if smtp.username.is_none() {
            smtp.username = lookup("SMTP_EMAIL");
            if smtp.username.is_some() {
                smtp.enabled = true;
            }
        }
        if smtp.password.is_none() {
            smtp.password = lookup("SMTP_PASSWORD");
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate fetcher configuration
        if self.fetcher.request_timeout_secs == 0 {
            return Err(ConfigError::Message("Fetcher request_timeout_secs must be greater than 0".into()));
        }

        if self.fetcher.run_timeout_secs == 0 {
            return Err(ConfigError::Message("Fetcher run_timeout_secs must be greater than 0".into()));
        }

        if self.fetcher.proxy_jitter_min_ms > self.fetcher.proxy_jitter_max_ms {
            return Err(ConfigError::Message("Fetcher proxy_jitter_min_ms cannot exceed proxy_jitter_max_ms".into()));
        }

        if Url::parse(&self.fetcher.proxy_list_url).is_err() {
            return Err(ConfigError::Message("Invalid proxy_list_url format".into()));
        }

        // Validate scheduler configuration
        if !Self::is_valid_cron(&self.scheduler.cron) {
            return Err(ConfigError::Message("Invalid cron expression in scheduler.cron".into()));
        }

        if self.sites.enabled.is_empty() {
            return Err(ConfigError::Message("At least one site must be enabled".into()));
        }

        // Validate SMTP configuration
        let smtp = &self.notifications.smtp;
        if smtp.enabled {
            if smtp.port == 0 {
                return Err(ConfigError::Message("SMTP port must be greater than 0".into()));
            }
            if smtp.username.as_deref().unwrap_or("").is_empty() {
                return Err(ConfigError::Message("SMTP username is required when SMTP is enabled".into()));
            }
        }

        if let Some(webhook) = &self.notifications.discord.webhook_url {
            if !webhook.starts_with("https://discord.com/api/webhooks/") {
                return Err(ConfigError::Message("Invalid Discord webhook URL format".into()));
            }
        }

        Ok(())
    }

    pub fn is_valid_cron(cron_expr: &str) -> bool {
        // Six parts: second minute hour day month weekday
        let parts: Vec<&str> = cron_expr.split_whitespace().collect();
        if parts.len() != 6 {
            return false;
        }

        // Allow numbers, ranges, lists, wildcards, and steps
        parts.iter().all(|part| {
            part.chars()
                .all(|c| c.is_ascii_digit() || c == '*' || c == '-' || c == ',' || c == '/')
        })
    }
}
