use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

use hotdeal_watcher::config::LoggingConfig;
use hotdeal_watcher::fetcher::{FreeProxyListSource, HttpFetcher, ProxyCache};
use hotdeal_watcher::models::StateKey;
use hotdeal_watcher::notifier::Notifier;
use hotdeal_watcher::plugins::PluginManager;
use hotdeal_watcher::store::JsonFileStateStore;
use hotdeal_watcher::{AppConfig, KeywordRegistry, WatchEngine, WatchScheduler};

#[derive(Parser)]
#[command(name = "hotdeal-watcher", version, about = "Watches deal boards for keywords and alerts on new listings")]
struct Cli {
    /// Extra configuration file, layered over config/default and config/local.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Watch until interrupted (default).
    Run,
    /// Run a single tick and exit.
    Once,
    /// Manage watched keywords.
    Keyword {
        #[command(subcommand)]
        action: KeywordAction,
    },
    /// Inspect persisted state.
    State {
        #[command(subcommand)]
        action: StateAction,
    },
}

#[derive(Subcommand)]
enum KeywordAction {
    Add { keyword: String },
    Remove { keyword: String },
    List,
}

#[derive(Subcommand)]
enum StateAction {
    /// Print the record stored for a keyword on a site.
    Show { keyword: String, site: String },
}

fn init_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .context("invalid logging filter")?;

    let (writer, guard, ansi) = match &config.directory {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "hotdeal-watcher.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard), false)
        }
        None => (BoxMakeWriter::new(std::io::stdout), None, true),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(ansi);
    if config.json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(guard)
}

#[cfg(unix)]
fn reset_proxies_on_sighup(proxies: Arc<ProxyCache>) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangups = signal(SignalKind::hangup())?;
    tokio::spawn(async move {
        while hangups.recv().await.is_some() {
            info!("SIGHUP received, proxy candidates will be refreshed on next use");
            proxies.reset().await;
        }
    });
    Ok(())
}

#[cfg(not(unix))]
fn reset_proxies_on_sighup(_proxies: Arc<ProxyCache>) -> Result<()> {
    Ok(())
}

async fn build_scheduler(config: &AppConfig, registry: KeywordRegistry) -> Result<(WatchScheduler, Arc<ProxyCache>)> {
    let store = JsonFileStateStore::new(&config.data.state_dir)
        .with_context(|| format!("cannot create state directory {}", config.data.state_dir.display()))?
        .with_legacy_dir(&config.data.dir);

    let proxies = Arc::new(ProxyCache::new(Arc::new(FreeProxyListSource::new(&config.fetcher)?)));
    let fetcher = HttpFetcher::new(config.fetcher.clone(), Arc::clone(&proxies))?;

    let plugins = PluginManager::new();
    plugins.initialize_from_config(config).await?;
    let notifier = Notifier::new(plugins.sinks().await);
    if notifier.sink_count() == 0 {
        warn!("no notification sinks enabled, new deals will only update state");
    }

    let engine = WatchEngine::new(
        Arc::new(fetcher),
        Arc::new(store),
        Arc::new(notifier),
        Duration::from_secs(config.fetcher.run_timeout_secs),
    );

    let scheduler = WatchScheduler::new(Arc::new(engine), registry, plugins, config.scheduler.clone()).await?;
    Ok((scheduler, proxies))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    let _log_guard = init_tracing(&config.logging)?;
    let registry = KeywordRegistry::new(&config.data.registry_file);

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            info!("Starting hotdeal watcher...");
            let (mut scheduler, proxies) = build_scheduler(&config, registry).await?;
            reset_proxies_on_sighup(proxies)?;

            scheduler.start().await?;
            tokio::signal::ctrl_c().await?;
            info!("Shutting down...");
            scheduler.shutdown().await?;
        }
        Command::Once => {
            let (scheduler, _proxies) = build_scheduler(&config, registry).await?;
            let summary = scheduler.tick().await;
            println!(
                "pairs: {}, notified: {}, unchanged: {}, failed: {}, pruned: {}",
                summary.pairs, summary.notified, summary.unchanged, summary.failed, summary.pruned
            );
        }
        Command::Keyword { action } => match action {
            KeywordAction::Add { keyword } => {
                if registry.add(&keyword)? {
                    println!("Keyword '{}' added.", keyword.trim());
                } else {
                    println!("Keyword '{}' is already watched.", keyword.trim());
                }
            }
            KeywordAction::Remove { keyword } => {
                if registry.remove(&keyword)? {
                    println!("Keyword '{}' removed.", keyword.trim());
                } else {
                    println!("Keyword '{}' was not watched.", keyword.trim());
                }
            }
            KeywordAction::List => {
                let keywords = registry.list()?;
                if keywords.is_empty() {
                    println!("No keywords registered.");
                }
                for (index, keyword) in keywords.iter().enumerate() {
                    println!("{}. {}", index + 1, keyword);
                }
            }
        },
        Command::State { action } => match action {
            StateAction::Show { keyword, site } => {
                let store = JsonFileStateStore::new(&config.data.state_dir)?.with_legacy_dir(&config.data.dir);
                match store.read_record(&StateKey::new(keyword.as_str(), site.as_str()))? {
                    Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                    None => println!("No state recorded for '{}' on {}.", keyword, site),
                }
            }
        },
    }

    Ok(())
}
