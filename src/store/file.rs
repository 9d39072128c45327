use std::collections::HashSet;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

use super::StateStore;
use crate::models::{StateKey, StateRecord, WatchState};
use crate::utils::error::{AppError, Result};

/// One JSON file per pair at `{root}/{keyword}/{site}.json`, with both path
/// components percent-encoded.
///
/// Writes go to a temp file in the same directory which is then renamed over
/// the target, so a crash mid-write leaves the previous record intact.
#[derive(Debug, Clone)]
pub struct JsonFileStateStore {
    root: PathBuf,
    legacy_dir: Option<PathBuf>,
}

impl JsonFileStateStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            legacy_dir: None,
        })
    }

    /// Fall back to the older `{dir}/{keyword}_data.json` files (one object
    /// per site) for pairs that have no record of their own yet.
    pub fn with_legacy_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.legacy_dir = Some(dir.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &StateKey) -> PathBuf {
        self.root
            .join(encode_component(&key.keyword))
            .join(format!("{}.json", encode_component(&key.site)))
    }

    /// Reads the raw record for `key`. `Ok(None)` when no record exists.
    pub fn read_record(&self, key: &StateKey) -> Result<Option<StateRecord>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => self.read_legacy_record(key),
            Err(e) => Err(e.into()),
        }
    }

    fn read_legacy_record(&self, key: &StateKey) -> Result<Option<StateRecord>> {
        let Some(dir) = &self.legacy_dir else {
            return Ok(None);
        };
        let path = dir.join(format!("{}_data.json", key.keyword));
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut by_site: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&raw)?;
        match by_site.remove(&key.site) {
            Some(value) => {
                debug!(%key, path = %path.display(), "using legacy state record");
                Ok(Some(serde_json::from_value(value)?))
            }
            None => Ok(None),
        }
    }
}

impl StateStore for JsonFileStateStore {
    fn load(&self, key: &StateKey) -> WatchState {
        match self.read_record(key) {
            Ok(Some(record)) => record.into(),
            Ok(None) => {
                debug!(%key, "no state recorded yet");
                WatchState::never_observed()
            }
            Err(e) => {
                error!(
                    %key,
                    path = %self.path_for(key).display(),
                    "state record unreadable ({}); treating pair as never observed, its current head may be notified again",
                    e
                );
                WatchState::never_observed()
            }
        }
    }

    fn save(&self, key: &StateKey, state: &WatchState) -> Result<()> {
        let path = self.path_for(key);
        let dir = path.parent().ok_or_else(|| AppError::Store {
            key: key.to_string(),
            message: format!("no parent directory for {}", path.display()),
        })?;
        fs::create_dir_all(dir)?;

        let record = StateRecord::from(state);
        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, &record)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| AppError::Io(e.error))?;

        debug!(%key, head = state.head_id().unwrap_or(""), "state saved");
        Ok(())
    }

    fn prune(&self, active_keywords: &[String]) -> Result<usize> {
        let active: HashSet<String> = active_keywords.iter().map(|k| encode_component(k)).collect();
        let mut removed = 0;

        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(root = %self.root.display(), "state directory does not exist");
                return Ok(0);
            }
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if active.contains(&name) {
                continue;
            }
            info!(keyword_dir = %name, "removing state of keyword no longer watched");
            fs::remove_dir_all(entry.path())?;
            removed += 1;
        }

        Ok(removed)
    }
}

/// Percent-encodes a keyword or site name into a single safe path component.
fn encode_component(raw: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(raw.as_bytes()).collect();
    match encoded.as_str() {
        "" => "%".to_string(),
        "." | ".." => encoded.replace('.', "%2E"),
        _ => encoded,
    }
}
