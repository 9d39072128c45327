use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::Listing;

/// Identifies one watched (keyword, site) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateKey {
    pub keyword: String,
    pub site: String,
}

impl StateKey {
    pub fn new(keyword: impl Into<String>, site: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            site: site.into(),
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.keyword, self.site)
    }
}

/// Last observed head of a pair.
///
/// `head == None` is the never-observed sentinel. Once a head is set it is only
/// ever replaced by a newer run's first listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchState {
    pub head: Option<Listing>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl WatchState {
    pub fn never_observed() -> Self {
        Self::default()
    }

    pub fn observed(head: Listing, at: DateTime<Utc>) -> Self {
        Self {
            head: Some(head),
            last_updated: Some(at),
        }
    }

    /// An attempt was made but no listing existed to record.
    pub fn attempted(at: DateTime<Utc>) -> Self {
        Self {
            head: None,
            last_updated: Some(at),
        }
    }

    pub fn head_id(&self) -> Option<&str> {
        self.head.as_ref().map(|h| h.id.as_str())
    }

    pub fn is_observed(&self) -> bool {
        self.head.is_some()
    }
}

/// On-disk shape of a [`WatchState`].
///
/// Field names follow the layout the deployment has always used, so existing
/// data files keep loading. Absent values are written as empty strings; `null`
/// is accepted on read.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateRecord {
    #[serde(default)]
    pub current_id: Option<String>,
    #[serde(default)]
    pub current_title: Option<String>,
    #[serde(default)]
    pub current_link: Option<String>,
    #[serde(default)]
    pub current_price: Option<String>,
    #[serde(default)]
    pub current_meta_data: Option<String>,
    #[serde(default)]
    pub wdate: Option<String>,
}

impl From<&WatchState> for StateRecord {
    fn from(state: &WatchState) -> Self {
        let head = state.head.as_ref();
        let text = |value: Option<&String>| Some(value.cloned().unwrap_or_default());

        Self {
            current_id: text(head.map(|h| &h.id)),
            current_title: text(head.map(|h| &h.title)),
            current_link: text(head.map(|h| &h.link)),
            current_price: text(head.map(|h| &h.price)),
            current_meta_data: text(head.map(|h| &h.metadata)),
            wdate: Some(
                state
                    .last_updated
                    .map(|t| t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
                    .unwrap_or_default(),
            ),
        }
    }
}

impl From<StateRecord> for WatchState {
    fn from(record: StateRecord) -> Self {
        let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());

        let head = non_empty(record.current_id).map(|id| Listing {
            id,
            title: record.current_title.unwrap_or_default(),
            link: record.current_link.unwrap_or_default(),
            price: record.current_price.unwrap_or_default(),
            metadata: record.current_meta_data.unwrap_or_default(),
        });

        Self {
            head,
            last_updated: non_empty(record.wdate).and_then(|w| parse_wdate(&w)),
        }
    }
}

/// Accepts RFC 3339 as well as the naive ISO-8601 timestamps older data files
/// contain (interpreted as UTC).
pub fn parse_wdate(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
