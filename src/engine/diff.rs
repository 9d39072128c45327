//! Ordered diff between the last recorded head and a freshly fetched,
//! newest-first listing sequence.

use chrono::{DateTime, Utc};

use crate::models::{Listing, WatchState};

/// What changed for a pair since its last recorded head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffResult {
    /// No head existed before; this is the first listing ever seen.
    Initial(Listing),
    NoChange,
    /// Listings strictly newer than the previous head, newest first.
    Updates(Vec<Listing>),
}

impl DiffResult {
    pub fn is_deliverable(&self) -> bool {
        !matches!(self, DiffResult::NoChange)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DiffResult::Initial(_) => "initial",
            DiffResult::NoChange => "no_change",
            DiffResult::Updates(_) => "updates",
        }
    }

    pub fn listings(&self) -> &[Listing] {
        match self {
            DiffResult::Initial(first) => std::slice::from_ref(first),
            DiffResult::NoChange => &[],
            DiffResult::Updates(listings) => listings,
        }
    }
}

/// Outcome of [`evaluate`]: the diff plus the state the pair should hold next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub diff: DiffResult,
    pub next_state: WatchState,
    /// `false` when `next_state` equals the previous state and nothing needs
    /// to be written.
    pub needs_save: bool,
}

impl Evaluation {
    fn unchanged(previous: &WatchState) -> Self {
        Self {
            diff: DiffResult::NoChange,
            next_state: previous.clone(),
            needs_save: false,
        }
    }
}

/// Compare `fresh` (newest first) against `previous` and compute the new head.
///
/// Never mutates `previous`. Identity is the listing id only, so listings with
/// a blank id are ignored: they could never be stored as a head.
pub fn evaluate(previous: &WatchState, fresh: &[Listing], now: DateTime<Utc>) -> Evaluation {
    let fresh: Vec<&Listing> = fresh.iter().filter(|listing| !listing.id.trim().is_empty()).collect();
    let Some(&newest) = fresh.first() else {
        if previous.last_updated.is_none() && !previous.is_observed() {
            // First attempt for this pair: record it without claiming a head.
            return Evaluation {
                diff: DiffResult::NoChange,
                next_state: WatchState::attempted(now),
                needs_save: true,
            };
        }
        return Evaluation::unchanged(previous);
    };

    let Some(head) = previous.head.as_ref() else {
        return Evaluation {
            diff: DiffResult::Initial(newest.clone()),
            next_state: WatchState::observed(newest.clone(), now),
            needs_save: true,
        };
    };

    if newest.same_deal(head) {
        return Evaluation::unchanged(previous);
    }

    // Everything before the old head is new. If the old head scrolled out of
    // the visible window, the whole page is new.
    let updates: Vec<Listing> = fresh
        .iter()
        .take_while(|listing| !listing.same_deal(head))
        .map(|&listing| listing.clone())
        .collect();

    Evaluation {
        diff: DiffResult::Updates(updates),
        next_state: WatchState::observed(newest.clone(), now),
        needs_save: true,
    }
}
