//! Trigger context: the data carried through one rule evaluation.

use serde::{Deserialize, Serialize};

use crate::change::ChangeNotification;
use crate::execution::TriggerSnapshot;
use crate::id::TenantId;
use crate::rule::TriggerKind;
use crate::time::Timestamp;

/// What caused the evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerSource {
    /// A data change reported by the storage collaborator.
    Change(ChangeNotification),
    /// A scheduler tick, truncated to the minute.
    Schedule { tick: Timestamp },
}

/// The bundle of data passed through one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerContext {
    pub tenant_id: TenantId,
    /// When the trigger fired; system fields (`$now`, `$hour`, …) read this.
    pub fired_at: Timestamp,
    pub source: TriggerSource,
}

impl TriggerContext {
    #[must_use]
    pub fn from_change(notification: ChangeNotification, fired_at: Timestamp) -> Self {
        Self {
            tenant_id: notification.tenant_id.clone(),
            fired_at,
            source: TriggerSource::Change(notification),
        }
    }

    #[must_use]
    pub fn from_tick(tenant_id: TenantId, tick: Timestamp) -> Self {
        Self {
            tenant_id,
            fired_at: tick,
            source: TriggerSource::Schedule { tick },
        }
    }

    #[must_use]
    pub fn kind(&self) -> TriggerKind {
        match self.source {
            TriggerSource::Change(_) => TriggerKind::Event,
            TriggerSource::Schedule { .. } => TriggerKind::Schedule,
        }
    }

    /// The change notification, for event-triggered contexts.
    #[must_use]
    pub fn change(&self) -> Option<&ChangeNotification> {
        match &self.source {
            TriggerSource::Change(n) => Some(n),
            TriggerSource::Schedule { .. } => None,
        }
    }

    /// Compact description stored on the execution record.
    #[must_use]
    pub fn snapshot(&self) -> TriggerSnapshot {
        match &self.source {
            TriggerSource::Change(n) => TriggerSnapshot::Event {
                subject_type: n.subject_type.clone(),
                subject_id: n.subject_id.clone(),
                event_kind: n.event_kind,
            },
            TriggerSource::Schedule { tick } => TriggerSnapshot::Schedule { tick: *tick },
        }
    }
}
