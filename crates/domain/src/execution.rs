//! Execution log records: one per (rule, trigger) pair.
//!
//! An [`ExecutionRecord`] walks a small state machine:
//!
//! ```text
//! Pending → Evaluating → ConditionsNotMet
//!                      → ConditionsMet → RunningActions → Completed
//!                                                       → Failed
//! ```
//!
//! Any non-terminal state may also move to `Failed` (unexpected error) or
//! `Abandoned` (found incomplete at startup). Terminal records are immutable.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::change::EventKind;
use crate::context::TriggerContext;
use crate::error::TransitionError;
use crate::id::{ExecutionId, RuleId, TenantId};
use crate::rule::{Operator, Rule, TriggerKind};
use crate::time::Timestamp;
use crate::value::{Parameters, Value};

/// Lifecycle state of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Evaluating,
    ConditionsNotMet,
    ConditionsMet,
    RunningActions,
    Completed,
    Failed,
    Abandoned,
}

impl ExecutionStatus {
    pub const ALL: [Self; 8] = [
        Self::Pending,
        Self::Evaluating,
        Self::ConditionsNotMet,
        Self::ConditionsMet,
        Self::RunningActions,
        Self::Completed,
        Self::Failed,
        Self::Abandoned,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Evaluating => "evaluating",
            Self::ConditionsNotMet => "conditions_not_met",
            Self::ConditionsMet => "conditions_met",
            Self::RunningActions => "running_actions",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Abandoned => "abandoned",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::ConditionsNotMet | Self::Completed | Self::Failed | Self::Abandoned
        )
    }

    /// Whether the state machine has an edge from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            Self::Failed | Self::Abandoned => true,
            Self::Evaluating => self == Self::Pending,
            Self::ConditionsNotMet | Self::ConditionsMet => self == Self::Evaluating,
            Self::RunningActions => self == Self::ConditionsMet,
            Self::Completed => self == Self::RunningActions,
            Self::Pending => false,
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown [`ExecutionStatus`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown execution status {0:?}")]
pub struct UnknownExecutionStatus(pub String);

impl FromStr for ExecutionStatus {
    type Err = UnknownExecutionStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownExecutionStatus(s.to_string()))
    }
}

/// What fired the rule, as stored on the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerSnapshot {
    Event {
        subject_type: String,
        subject_id: String,
        event_kind: EventKind,
    },
    Schedule {
        tick: Timestamp,
    },
}

/// Trace entry for one evaluated condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionResult {
    pub field: String,
    pub operator: Operator,
    pub expected: Value,
    /// `None` when the path did not resolve.
    pub resolved: Option<Value>,
    /// The before-image value, for change operators.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<Value>,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Success,
    Failure,
}

/// Trace entry for one attempted action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionStep {
    pub order: u32,
    pub action_type: String,
    /// Echo of the parameters the handler was called with.
    #[serde(default)]
    pub parameters: Parameters,
    pub outcome: StepOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// What the handler reports it did, if anything.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<Value>,
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
}

impl ActionStep {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.outcome == StepOutcome::Success
    }
}

/// Audit entry for one evaluation of one rule against one trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: ExecutionId,
    pub tenant_id: TenantId,
    pub rule_id: RuleId,
    /// Rule name at the time of the run.
    pub rule_name: String,
    pub trigger_kind: TriggerKind,
    pub trigger: TriggerSnapshot,
    pub status: ExecutionStatus,
    #[serde(default)]
    pub conditions: Vec<ConditionResult>,
    #[serde(default)]
    pub steps: Vec<ActionStep>,
    #[serde(default)]
    pub error: Option<String>,
    /// Set while the run is parked on the rule's execution delay.
    #[serde(default)]
    pub delayed_until: Option<Timestamp>,
    pub started_at: Timestamp,
    #[serde(default)]
    pub finished_at: Option<Timestamp>,
}

impl ExecutionRecord {
    /// A fresh `Pending` record for `rule` fired by `context`.
    #[must_use]
    pub fn pending(rule: &Rule, context: &TriggerContext, now: Timestamp) -> Self {
        Self {
            id: ExecutionId::new(),
            tenant_id: context.tenant_id.clone(),
            rule_id: rule.id,
            rule_name: rule.name.clone(),
            trigger_kind: context.kind(),
            trigger: context.snapshot(),
            status: ExecutionStatus::Pending,
            conditions: Vec::new(),
            steps: Vec::new(),
            error: None,
            delayed_until: None,
            started_at: now,
            finished_at: None,
        }
    }

    /// Move to `next`, stamping `finished_at` when it is terminal.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] if the state machine has no such edge.
    pub fn transition(
        &mut self,
        next: ExecutionStatus,
        now: Timestamp,
    ) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next.is_terminal() {
            self.finished_at = Some(now);
            self.delayed_until = None;
        }
        Ok(())
    }

    /// Shortcut for a transition to `Failed` carrying an error message.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] if the record is already terminal.
    pub fn fail(
        &mut self,
        error: impl Into<String>,
        now: Timestamp,
    ) -> Result<(), TransitionError> {
        self.transition(ExecutionStatus::Failed, now)?;
        self.error = Some(error.into());
        Ok(())
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::ChangeNotification;
    use crate::rule::{Action, Condition};

    fn rule() -> Rule {
        Rule::builder()
            .tenant("acme")
            .name("Flag active orders")
            .on_event("order", EventKind::Updated)
            .condition(Condition::new("status", Operator::Equal, "active"))
            .action(Action::new(0, "log"))
            .build()
            .unwrap()
    }

    fn context() -> TriggerContext {
        TriggerContext::from_change(
            ChangeNotification {
                tenant_id: TenantId::new("acme"),
                subject_type: "order".to_string(),
                event_kind: EventKind::Updated,
                subject_id: "42".to_string(),
                before: None,
                after: None,
            },
            "2024-01-01T00:00:00Z".parse().unwrap(),
        )
    }

    fn at(text: &str) -> Timestamp {
        text.parse().unwrap()
    }

    #[test]
    fn should_create_pending_record_from_rule_and_context() {
        let rule = rule();
        let record = ExecutionRecord::pending(&rule, &context(), at("2024-01-01T00:00:01Z"));
        assert_eq!(record.status, ExecutionStatus::Pending);
        assert_eq!(record.rule_id, rule.id);
        assert_eq!(record.rule_name, "Flag active orders");
        assert_eq!(record.trigger_kind, TriggerKind::Event);
        assert!(matches!(
            record.trigger,
            TriggerSnapshot::Event { ref subject_id, .. } if subject_id == "42"
        ));
        assert!(record.finished_at.is_none());
    }

    #[test]
    fn should_walk_happy_path_and_stamp_finish() {
        let mut record = ExecutionRecord::pending(&rule(), &context(), at("2024-01-01T00:00:01Z"));
        for next in [
            ExecutionStatus::Evaluating,
            ExecutionStatus::ConditionsMet,
            ExecutionStatus::RunningActions,
        ] {
            record.transition(next, at("2024-01-01T00:00:02Z")).unwrap();
            assert!(record.finished_at.is_none());
        }
        record
            .transition(ExecutionStatus::Completed, at("2024-01-01T00:00:03Z"))
            .unwrap();
        assert_eq!(record.finished_at, Some(at("2024-01-01T00:00:03Z")));
    }

    #[test]
    fn should_reject_skipping_states() {
        let mut record = ExecutionRecord::pending(&rule(), &context(), at("2024-01-01T00:00:01Z"));
        let err = record
            .transition(ExecutionStatus::RunningActions, at("2024-01-01T00:00:02Z"))
            .unwrap_err();
        assert_eq!(err.from, ExecutionStatus::Pending);
        assert_eq!(err.to, ExecutionStatus::RunningActions);
        assert_eq!(record.status, ExecutionStatus::Pending);
    }

    #[test]
    fn should_freeze_terminal_records() {
        let mut record = ExecutionRecord::pending(&rule(), &context(), at("2024-01-01T00:00:01Z"));
        record.fail("boom", at("2024-01-01T00:00:02Z")).unwrap();
        assert_eq!(record.error.as_deref(), Some("boom"));
        for next in ExecutionStatus::ALL {
            assert!(record.transition(next, at("2024-01-01T00:00:03Z")).is_err());
        }
    }

    #[test]
    fn should_allow_failure_and_abandon_from_any_open_state() {
        for status in ExecutionStatus::ALL.into_iter().filter(|s| !s.is_terminal()) {
            assert!(status.can_transition_to(ExecutionStatus::Failed));
            assert!(status.can_transition_to(ExecutionStatus::Abandoned));
        }
    }

    #[test]
    fn should_parse_every_status_from_its_name() {
        for status in ExecutionStatus::ALL {
            assert_eq!(status.as_str().parse::<ExecutionStatus>(), Ok(status));
        }
        assert!("done".parse::<ExecutionStatus>().is_err());
    }
}
