//! Watch event types and conversion from raw notify events.

use chrono::{DateTime, Utc};
use notify::event::ModifyKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A single filesystem change reported by an event source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatchEvent {
    /// Path affected by the change.
    pub path: PathBuf,

    /// Kind of change.
    pub kind: EventKind,

    /// Time the event was received from the source.
    pub timestamp: DateTime<Utc>,
}

impl WatchEvent {
    /// Create a new event stamped with the current time.
    pub fn new(kind: EventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind,
            timestamp: Utc::now(),
        }
    }

    /// Split a notify event into one watch event per affected path.
    pub fn from_notify(event: notify::Event) -> Vec<Self> {
        let kind = EventKind::from(&event.kind);
        event
            .paths
            .into_iter()
            .map(|path| Self::new(kind, path))
            .collect()
    }

    /// Whether this event reports the removal of its path.
    pub fn is_removal(&self) -> bool {
        self.kind == EventKind::Remove
    }
}

/// Kinds of changes that an event source can report.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Entry was created.
    Create,
    /// Entry contents were written.
    Write,
    /// Entry was removed.
    Remove,
    /// Entry was renamed, either away from or onto this path.
    Rename,
    /// Entry metadata (permissions, timestamps, ownership) changed.
    Chmod,
    /// Anything the source could not classify, including plain access.
    Other,
}

impl EventKind {
    /// Get a string representation of the event kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Write => "write",
            Self::Remove => "remove",
            Self::Rename => "rename",
            Self::Chmod => "chmod",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&notify::EventKind> for EventKind {
    fn from(kind: &notify::EventKind) -> Self {
        match kind {
            notify::EventKind::Create(_) => Self::Create,
            notify::EventKind::Modify(ModifyKind::Name(_)) => Self::Rename,
            notify::EventKind::Modify(ModifyKind::Metadata(_)) => Self::Chmod,
            notify::EventKind::Modify(_) => Self::Write,
            notify::EventKind::Remove(_) => Self::Remove,
            notify::EventKind::Access(_) | notify::EventKind::Any | notify::EventKind::Other => {
                Self::Other
            }
        }
    }
}
