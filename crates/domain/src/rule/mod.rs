//! Rule: trigger → conditions → ordered actions.
//!
//! A [`Rule`] is the aggregate owned by the authoring collaborator: its
//! [`Trigger`] decides when it is evaluated, its [`Condition`]s (combined
//! with [`Combination`]) decide whether it proceeds, and its [`Action`]s run
//! in ascending `order`. The engine only reads rules, apart from the
//! `last_scheduled_tick` bookkeeping value.

mod action;
mod condition;
mod operator;
mod trigger;

pub use action::Action;
pub use condition::{Condition, PATH_SEPARATOR};
pub use operator::{Operator, Verdict};
pub use trigger::{Trigger, TriggerKind, UnknownTriggerKind};

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::change::EventKind;
use crate::cron::CronExpr;
use crate::error::{AutoruleError, ValidationError};
use crate::id::{RuleId, TenantId};
use crate::time::{self, Timestamp};

/// How per-condition results are folded into one verdict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Combination {
    /// Logical AND; vacuously true with no conditions.
    #[default]
    All,
    /// Logical OR; vacuously false with no conditions.
    Any,
}

impl Combination {
    #[must_use]
    pub fn combine(self, results: impl IntoIterator<Item = bool>) -> bool {
        let mut results = results.into_iter();
        match self {
            Self::All => results.all(|passed| passed),
            Self::Any => results.any(|passed| passed),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Any => "any",
        }
    }
}

/// One automation rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub tenant_id: TenantId,
    /// Unique per tenant.
    pub name: String,
    pub trigger: Trigger,
    #[serde(default)]
    pub combination: Combination,
    pub active: bool,
    /// Pause between conditions passing and the actions running.
    #[serde(default)]
    pub execution_delay_secs: Option<u64>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub actions: Vec<Action>,
    /// Last scheduler minute this rule was submitted for.
    #[serde(default)]
    pub last_scheduled_tick: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Rule {
    /// Create a builder for constructing a [`Rule`].
    #[must_use]
    pub fn builder() -> RuleBuilder {
        RuleBuilder::default()
    }

    /// Check definition invariants.
    ///
    /// # Errors
    ///
    /// Returns [`AutoruleError::Validation`] when:
    /// - `name` or `tenant_id` is blank
    /// - a condition is malformed for this trigger (see [`Condition::validate`])
    /// - an action has an empty type or reuses another action's `order`
    pub fn validate(&self) -> Result<(), AutoruleError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.tenant_id.is_empty() {
            return Err(ValidationError::EmptyTenant.into());
        }
        for condition in &self.conditions {
            condition.validate(&self.trigger)?;
        }

        let mut seen = HashSet::new();
        for action in &self.actions {
            if action.action_type.trim().is_empty() {
                return Err(ValidationError::EmptyActionType {
                    order: action.order,
                }
                .into());
            }
            if !seen.insert(action.order) {
                return Err(ValidationError::DuplicateActionOrder(action.order).into());
            }
        }
        Ok(())
    }

    /// Actions sorted by ascending `order`.
    #[must_use]
    pub fn ordered_actions(&self) -> Vec<&Action> {
        let mut actions: Vec<&Action> = self.actions.iter().collect();
        actions.sort_by_key(|action| action.order);
        actions
    }

    /// The configured execution delay, if any and non-zero.
    #[must_use]
    pub fn execution_delay(&self) -> Option<chrono::TimeDelta> {
        self.execution_delay_secs
            .filter(|secs| *secs > 0)
            .and_then(|secs| i64::try_from(secs).ok())
            .map(chrono::TimeDelta::seconds)
    }
}

/// Step-by-step builder for [`Rule`].
#[derive(Debug, Default)]
pub struct RuleBuilder {
    id: Option<RuleId>,
    tenant_id: Option<TenantId>,
    name: Option<String>,
    trigger: Option<Trigger>,
    schedule: Option<String>,
    combination: Combination,
    active: Option<bool>,
    execution_delay_secs: Option<u64>,
    conditions: Vec<Condition>,
    actions: Vec<Action>,
    last_scheduled_tick: Option<Timestamp>,
    created_at: Option<Timestamp>,
}

impl RuleBuilder {
    #[must_use]
    pub fn id(mut self, id: RuleId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn tenant(mut self, tenant_id: impl Into<TenantId>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = Some(trigger);
        self.schedule = None;
        self
    }

    /// Shortcut for an [`Trigger::Event`] trigger.
    #[must_use]
    pub fn on_event(self, subject_type: impl Into<String>, event_kind: EventKind) -> Self {
        self.trigger(Trigger::Event {
            subject_type: subject_type.into(),
            event_kind,
        })
    }

    /// Schedule trigger from a cron expression, parsed by [`build`](Self::build).
    #[must_use]
    pub fn schedule(mut self, expression: impl Into<String>) -> Self {
        self.schedule = Some(expression.into());
        self.trigger = None;
        self
    }

    #[must_use]
    pub fn combination(mut self, combination: Combination) -> Self {
        self.combination = combination;
        self
    }

    #[must_use]
    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    #[must_use]
    pub fn execution_delay_secs(mut self, secs: u64) -> Self {
        self.execution_delay_secs = Some(secs);
        self
    }

    #[must_use]
    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    #[must_use]
    pub fn action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    #[must_use]
    pub fn last_scheduled_tick(mut self, ts: Timestamp) -> Self {
        self.last_scheduled_tick = Some(ts);
        self
    }

    #[must_use]
    pub fn created_at(mut self, ts: Timestamp) -> Self {
        self.created_at = Some(ts);
        self
    }

    /// Consume the builder, validate, and return a [`Rule`].
    ///
    /// # Errors
    ///
    /// Returns [`AutoruleError::Validation`] if the trigger is missing, the
    /// cron expression does not parse, or [`Rule::validate`] fails.
    pub fn build(self) -> Result<Rule, AutoruleError> {
        let trigger = match (self.trigger, self.schedule) {
            (Some(trigger), _) => trigger,
            (None, Some(expression)) => Trigger::Schedule {
                cron: CronExpr::parse(&expression).map_err(ValidationError::from)?,
            },
            (None, None) => return Err(ValidationError::MissingTrigger.into()),
        };
        let created_at = self.created_at.unwrap_or_else(time::now);

        let rule = Rule {
            id: self.id.unwrap_or_default(),
            tenant_id: self.tenant_id.unwrap_or_else(|| TenantId::new("")),
            name: self.name.unwrap_or_default(),
            trigger,
            combination: self.combination,
            active: self.active.unwrap_or(true),
            execution_delay_secs: self.execution_delay_secs,
            conditions: self.conditions,
            actions: self.actions,
            last_scheduled_tick: self.last_scheduled_tick,
            created_at,
            updated_at: created_at,
        };
        rule.validate()?;
        Ok(rule)
    }
}
