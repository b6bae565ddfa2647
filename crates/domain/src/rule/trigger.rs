//! Trigger: what makes a rule fire: a data change or a schedule.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::change::{ChangeNotification, EventKind};
use crate::cron::CronExpr;
use crate::time::Timestamp;

/// Discriminator of [`Trigger`], used for repository filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Event,
    Schedule,
}

impl TriggerKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::Schedule => "schedule",
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown [`TriggerKind`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown trigger kind {0:?}")]
pub struct UnknownTriggerKind(pub String);

impl FromStr for TriggerKind {
    type Err = UnknownTriggerKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "event" => Ok(Self::Event),
            "schedule" => Ok(Self::Schedule),
            other => Err(UnknownTriggerKind(other.to_string())),
        }
    }
}

/// Describes when a rule activates.
///
/// Exactly one of the event fields or the schedule is populated, by
/// construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    /// Fires when a record of `subject_type` sees a change of `event_kind`.
    Event {
        subject_type: String,
        event_kind: EventKind,
    },
    /// Fires on each UTC minute selected by the cron expression.
    Schedule { cron: CronExpr },
}

impl Trigger {
    #[must_use]
    pub fn kind(&self) -> TriggerKind {
        match self {
            Self::Event { .. } => TriggerKind::Event,
            Self::Schedule { .. } => TriggerKind::Schedule,
        }
    }

    /// Exact match on subject type and event kind; no wildcards.
    #[must_use]
    pub fn matches_change(&self, notification: &ChangeNotification) -> bool {
        match self {
            Self::Event {
                subject_type,
                event_kind,
            } => {
                *subject_type == notification.subject_type
                    && *event_kind == notification.event_kind
            }
            Self::Schedule { .. } => false,
        }
    }

    /// Whether a scheduler tick at `tick` selects this trigger.
    #[must_use]
    pub fn matches_tick(&self, tick: Timestamp) -> bool {
        match self {
            Self::Schedule { cron } => cron.matches(tick),
            Self::Event { .. } => false,
        }
    }

    #[must_use]
    pub fn event_kind(&self) -> Option<EventKind> {
        match self {
            Self::Event { event_kind, .. } => Some(*event_kind),
            Self::Schedule { .. } => None,
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Event {
                subject_type,
                event_kind,
            } => write!(f, "event({subject_type}, {event_kind})"),
            Self::Schedule { cron } => write!(f, "schedule({cron})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::TenantId;

    fn notification(subject_type: &str, kind: EventKind) -> ChangeNotification {
        ChangeNotification {
            tenant_id: TenantId::new("acme"),
            subject_type: subject_type.to_string(),
            event_kind: kind,
            subject_id: "1".to_string(),
            before: None,
            after: None,
        }
    }

    fn on_order_updated() -> Trigger {
        Trigger::Event {
            subject_type: "order".to_string(),
            event_kind: EventKind::Updated,
        }
    }

    #[test]
    fn should_match_when_subject_and_kind_are_equal() {
        assert!(on_order_updated().matches_change(&notification("order", EventKind::Updated)));
    }

    #[test]
    fn should_not_match_other_kind_or_subject() {
        let trigger = on_order_updated();
        assert!(!trigger.matches_change(&notification("order", EventKind::Created)));
        assert!(!trigger.matches_change(&notification("orders", EventKind::Updated)));
        assert!(!trigger.matches_change(&notification("Order", EventKind::Updated)));
    }

    #[test]
    fn should_never_match_schedule_trigger_against_changes() {
        let trigger = Trigger::Schedule {
            cron: CronExpr::parse("* * * * *").unwrap(),
        };
        assert!(!trigger.matches_change(&notification("order", EventKind::Updated)));
        assert!(trigger.matches_tick("2024-01-01T00:00:00Z".parse().unwrap()));
        assert!(!on_order_updated().matches_tick("2024-01-01T00:00:00Z".parse().unwrap()));
    }

    #[test]
    fn should_display_trigger_variants() {
        assert_eq!(on_order_updated().to_string(), "event(order, updated)");
        let trigger = Trigger::Schedule {
            cron: CronExpr::parse("0 2 * * *").unwrap(),
        };
        assert_eq!(trigger.to_string(), "schedule(0 2 * * *)");
    }

    #[test]
    fn should_deserialize_tagged_schedule_trigger() {
        let json = serde_json::json!({"type": "schedule", "cron": "0 2 * * *"});
        let trigger: Trigger = serde_json::from_value(json).unwrap();
        assert_eq!(trigger.kind(), TriggerKind::Schedule);
    }
}
