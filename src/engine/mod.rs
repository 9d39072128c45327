//! Fetch, parse, diff, persist and notify for one (keyword, site) pair.

pub mod diff;

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::fetcher::PageFetcher;
use crate::models::{PageContent, StateKey};
use crate::notifier::{DispatchReport, Notifier};
use crate::plugins::traits::SiteParser;
use crate::store::StateStore;
use crate::utils::error::FetchError;

pub use diff::{evaluate, DiffResult, Evaluation};

/// What happened to one pair during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairOutcome {
    /// State advanced and the diff was handed to the sinks.
    Notified {
        kind: &'static str,
        listings: usize,
        report: DispatchReport,
    },
    Unchanged,
    /// Nothing was persisted; the pair is retried next tick.
    FetchFailed(FetchError),
    /// The new state could not be written, so no alert was sent.
    StoreFailed(String),
}

impl PairOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, PairOutcome::FetchFailed(_) | PairOutcome::StoreFailed(_))
    }
}

pub struct WatchEngine {
    fetcher: Arc<dyn PageFetcher>,
    store: Arc<dyn StateStore>,
    notifier: Arc<Notifier>,
    run_timeout: Duration,
}

impl WatchEngine {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        store: Arc<dyn StateStore>,
        notifier: Arc<Notifier>,
        run_timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            store,
            notifier,
            run_timeout,
        }
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// Fetch bounded by the run timeout, proxy fallback included.
    async fn fetch_page(&self, url: &str) -> Result<PageContent, FetchError> {
        match tokio::time::timeout(self.run_timeout, self.fetcher.fetch(url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout),
        }
    }

    /// Runs one evaluation of `keyword` on `site`.
    ///
    /// State is saved before alerts go out. If saving fails nothing is sent,
    /// so the next run sees the same diff again instead of losing it; a
    /// failed sink, on the other hand, never rolls the state back.
    #[instrument(name = "pair", skip(self, site), fields(site = site.name()))]
    pub async fn run_pair(&self, keyword: &str, site: &dyn SiteParser) -> PairOutcome {
        let url = site.search_url(keyword);

        let page = match self.fetch_page(&url).await {
            Ok(page) => page,
            Err(e) => {
                warn!(%url, "fetch failed, skipping until next tick: {}", e);
                return PairOutcome::FetchFailed(e);
            }
        };

        let fresh = site.parse(keyword, &page);
        if fresh.is_empty() {
            warn!(%url, via_proxy = ?page.via_proxy, "no listings recognized on page");
        } else {
            debug!(count = fresh.len(), newest = %fresh[0].id, "listings parsed");
        }

        let key = StateKey::new(keyword, site.name());
        let previous = self.store.load(&key);
        let evaluation = evaluate(&previous, &fresh, Utc::now());

        if evaluation.needs_save {
            if let Err(e) = self.store.save(&key, &evaluation.next_state) {
                error!("could not persist new state, alerts withheld: {}", e);
                return PairOutcome::StoreFailed(e.to_string());
            }
        }

        let diff = evaluation.diff;
        if !diff.is_deliverable() {
            debug!("no new listings");
            return PairOutcome::Unchanged;
        }

        let report = self.notifier.notify(keyword, site.name(), &url, &diff).await;
        info!(
            diff = diff.kind(),
            listings = diff.listings().len(),
            head = evaluation.next_state.head_id().unwrap_or(""),
            accepted = report.accepted,
            sinks = report.attempted,
            "new deals detected"
        );

        PairOutcome::Notified {
            kind: diff.kind(),
            listings: diff.listings().len(),
            report,
        }
    }
}
