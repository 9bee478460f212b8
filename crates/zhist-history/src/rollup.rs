//! Compressing a version timeline into change events.
//!
//! Consecutive versions are compared pairwise. Identical states produce
//! nothing, so any run of snapshots that captured an unchanged file
//! collapses to zero events.

use crate::version::{Field, Payload};
use crate::Version;
use serde::Serialize;
use std::path::PathBuf;

/// Fields shown for a newly appeared path.
const ADDED_FIELDS: [Field; 2] = [Field::ModifyTime, Field::Size];

/// Classification of an observable transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Added,
    ContentChanged,
    PermissionChanged,
    Deleted,
}

impl EventKind {
    /// Single-letter code used in text reports.
    pub fn code(&self) -> char {
        match self {
            EventKind::Added => 'A',
            EventKind::ContentChanged => 'C',
            EventKind::PermissionChanged => 'P',
            EventKind::Deleted => 'D',
        }
    }
}

/// One entry in a roll-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollupEvent {
    pub kind: EventKind,
    /// Path of the version that introduced the change.
    pub path: PathBuf,
    /// Timestamp of that version.
    pub timestamp: i64,
    pub payload: Payload,
}

/// Roll a sorted timeline up into events, in timeline order.
pub fn rollup(timeline: &[Version]) -> Vec<RollupEvent> {
    timeline
        .windows(2)
        .filter_map(|pair| transition(&pair[0], &pair[1]))
        .collect()
}

fn transition(prev: &Version, curr: &Version) -> Option<RollupEvent> {
    let (kind, payload) = match (&prev.attributes, &curr.attributes) {
        (None, None) => return None,
        (None, Some(added)) => (EventKind::Added, added.select(&ADDED_FIELDS)),
        (Some(_), None) => (EventKind::Deleted, Payload::new()),
        (Some(before), Some(after)) if before == after => return None,
        (Some(before), Some(after)) => {
            let mut diff = before.diff(after);
            if diff.contains_key(&Field::ModifyTime) {
                // A content write always bumps ctime as well.
                diff.remove(&Field::ChangeTime);
                (EventKind::ContentChanged, diff)
            } else {
                diff.remove(&Field::ModifyTime);
                (EventKind::PermissionChanged, diff)
            }
        }
    };

    Some(RollupEvent {
        kind,
        path: curr.path.clone(),
        timestamp: curr.timestamp,
        payload,
    })
}
