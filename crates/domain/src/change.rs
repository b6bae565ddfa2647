//! Change notifications: what the storage collaborator reports after a
//! record was created, updated or deleted.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::id::TenantId;
use crate::value::Snapshot;

/// The kind of data change that happened to a subject record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
}

impl EventKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown [`EventKind`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown event kind {0:?}")]
pub struct UnknownEventKind(pub String);

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "updated" => Ok(Self::Updated),
            "deleted" => Ok(Self::Deleted),
            other => Err(UnknownEventKind(other.to_string())),
        }
    }
}

/// One data-change notification pushed by the storage collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeNotification {
    pub tenant_id: TenantId,
    pub subject_type: String,
    pub event_kind: EventKind,
    pub subject_id: String,
    #[serde(default)]
    pub before: Option<Snapshot>,
    #[serde(default)]
    pub after: Option<Snapshot>,
}

impl ChangeNotification {
    /// The snapshot describing the subject "as it is now": the after-image,
    /// except for deletions where only the before-image is meaningful.
    #[must_use]
    pub fn current(&self) -> Option<&Snapshot> {
        match self.event_kind {
            EventKind::Deleted => self.before.as_ref().or(self.after.as_ref()),
            EventKind::Created | EventKind::Updated => {
                self.after.as_ref().or(self.before.as_ref())
            }
        }
    }
}
