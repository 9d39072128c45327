use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::config::SchedulerConfig;
use crate::engine::{PairOutcome, WatchEngine};
use crate::plugins::PluginManager;
use crate::registry::KeywordRegistry;

/// Counts for one pass over every keyword and site.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub pairs: usize,
    pub notified: usize,
    pub unchanged: usize,
    pub failed: usize,
    /// Keywords whose state was removed by housekeeping.
    pub pruned: usize,
}

impl TickSummary {
    fn record(&mut self, outcome: &PairOutcome) {
        self.pairs += 1;
        match outcome {
            PairOutcome::Notified { .. } => self.notified += 1,
            PairOutcome::Unchanged => self.unchanged += 1,
            PairOutcome::FetchFailed(_) | PairOutcome::StoreFailed(_) => self.failed += 1,
        }
    }
}

/// Everything a tick needs, shared between direct calls and the cron job.
struct TickRunner {
    engine: Arc<WatchEngine>,
    registry: KeywordRegistry,
    plugins: PluginManager,
    prune_stale_state: bool,
    // Serializes ticks so a slow run and a cron firing never overlap.
    running: Mutex<()>,
}

impl TickRunner {
    async fn tick(&self) -> TickSummary {
        let _running = self.running.lock().await;
        let started = Instant::now();
        let mut summary = TickSummary::default();

        let keywords = match self.registry.list() {
            Ok(keywords) => keywords,
            Err(e) => {
                tracing::error!(registry = %self.registry.path().display(), "could not read keywords: {}", e);
                return summary;
            }
        };
        if keywords.is_empty() {
            tracing::warn!(registry = %self.registry.path().display(), "no keywords registered, nothing to watch");
            return summary;
        }

        let sites = self.plugins.sites().await;
        for keyword in &keywords {
            for site in &sites {
                let outcome = self.engine.run_pair(keyword, site.as_ref()).await;
                summary.record(&outcome);
            }
        }

        if self.prune_stale_state {
            match self.engine.store().prune(&keywords) {
                Ok(removed) => summary.pruned = removed,
                Err(e) => tracing::warn!("state housekeeping failed: {}", e),
            }
        }

        tracing::info!(
            pairs = summary.pairs,
            notified = summary.notified,
            unchanged = summary.unchanged,
            failed = summary.failed,
            pruned = summary.pruned,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "tick completed"
        );
        summary
    }
}

pub struct WatchScheduler {
    scheduler: JobScheduler,
    runner: Arc<TickRunner>,
    config: SchedulerConfig,
}

impl WatchScheduler {
    pub async fn new(
        engine: Arc<WatchEngine>,
        registry: KeywordRegistry,
        plugins: PluginManager,
        config: SchedulerConfig,
    ) -> Result<Self> {
        let scheduler = JobScheduler::new().await?;
        let runner = Arc::new(TickRunner {
            engine,
            registry,
            plugins,
            prune_stale_state: config.prune_stale_state,
            running: Mutex::new(()),
        });

        Ok(Self {
            scheduler,
            runner,
            config,
        })
    }

    /// Evaluates every registered keyword on every site, one pair at a time.
    /// Per-pair failures are counted, never propagated.
    pub async fn tick(&self) -> TickSummary {
        self.runner.tick().await
    }

    /// Runs the first tick right away (when configured) and then on the
    /// configured cron schedule.
    pub async fn start(&mut self) -> Result<()> {
        if self.config.run_on_start {
            self.tick().await;
        }

        let runner = Arc::clone(&self.runner);
        let job = Job::new_async(self.config.cron.as_str(), move |_uuid, _lock| {
            let runner = Arc::clone(&runner);
            Box::pin(async move {
                runner.tick().await;
            })
        })?;

        self.scheduler.add(job).await?;
        self.scheduler.start().await?;
        tracing::info!(cron = %self.config.cron, "watch scheduler started");
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.scheduler.shutdown().await?;
        tracing::info!("watch scheduler shutdown");
        Ok(())
    }
}
