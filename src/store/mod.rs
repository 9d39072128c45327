//! Persistence of per-pair [`WatchState`].
//!
//! The engine only reads and replaces state; deleting state for keywords that
//! are no longer watched is housekeeping done by the scheduler via [`StateStore::prune`].

pub mod file;

use std::collections::HashMap;
use std::sync::RwLock;

use crate::models::{StateKey, WatchState};
use crate::utils::error::{AppError, Result};

pub use file::JsonFileStateStore;

pub trait StateStore: Send + Sync {
    /// Returns the never-observed sentinel when the key is absent or its
    /// record cannot be read.
    fn load(&self, key: &StateKey) -> WatchState;

    /// Replaces the state for `key`. Readers see either the old or the new
    /// state, never a partial write.
    fn save(&self, key: &StateKey, state: &WatchState) -> Result<()>;

    /// Removes state of every keyword not in `active_keywords`. Returns the
    /// number of keywords removed.
    fn prune(&self, active_keywords: &[String]) -> Result<usize>;
}

/// In-memory store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    states: RwLock<HashMap<StateKey, WatchState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.states.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &StateKey) -> bool {
        self.states
            .read()
            .map(|s| s.contains_key(key))
            .unwrap_or(false)
    }
}

fn poisoned(key: impl ToString) -> AppError {
    AppError::Store {
        key: key.to_string(),
        message: "state lock poisoned".to_string(),
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self, key: &StateKey) -> WatchState {
        match self.states.read() {
            Ok(states) => states.get(key).cloned().unwrap_or_default(),
            Err(_) => {
                tracing::error!(%key, "state lock poisoned, treating pair as never observed");
                WatchState::never_observed()
            }
        }
    }

    fn save(&self, key: &StateKey, state: &WatchState) -> Result<()> {
        let mut states = self.states.write().map_err(|_| poisoned(key))?;
        states.insert(key.clone(), state.clone());
        Ok(())
    }

    fn prune(&self, active_keywords: &[String]) -> Result<usize> {
        let mut states = self.states.write().map_err(|_| poisoned("*"))?;
        let mut stale: Vec<String> = states
            .keys()
            .filter(|k| !active_keywords.contains(&k.keyword))
            .map(|k| k.keyword.clone())
            .collect();
        stale.sort();
        stale.dedup();
        states.retain(|k, _| active_keywords.contains(&k.keyword));
        Ok(stale.len())
    }
}
