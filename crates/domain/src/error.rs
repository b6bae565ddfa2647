//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`AutoruleError`] via `#[from]`; adapters box theirs into
//! [`AutoruleError::Storage`].

use crate::cron::CronError;
use crate::execution::ExecutionStatus;
use crate::rule::Operator;

/// Top-level error crossing every port boundary.
#[derive(Debug, thiserror::Error)]
pub enum AutoruleError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("not found")]
    NotFound(#[from] NotFoundError),

    #[error("conflict")]
    Conflict(#[from] ConflictError),

    #[error("invalid execution transition")]
    Transition(#[from] TransitionError),

    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("job queue is closed")]
    QueueClosed,
}

/// Rule definition errors, detected when a rule is saved.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("tenant must not be empty")]
    EmptyTenant,

    #[error("rule has no trigger")]
    MissingTrigger,

    #[error("invalid cron expression")]
    InvalidCron(#[from] CronError),

    #[error("condition field path must not be empty")]
    EmptyFieldPath,

    #[error("operator {operator} on {field:?} requires a list literal")]
    ListLiteralRequired { field: String, operator: Operator },

    #[error("list literal for {field:?} must only contain scalars")]
    NestedList { field: String },

    #[error("operator {operator} on {field:?} is only valid for updated-event rules")]
    ChangeOperatorRequiresUpdate { field: String, operator: Operator },

    #[error("action at order {order} has an empty action type")]
    EmptyActionType { order: u32 },

    #[error("action order {0} is used more than once")]
    DuplicateActionOrder(u32),
}

/// A looked-up record does not exist.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// A write collides with existing data (e.g. rule name already taken).
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("{entity} {key:?} already exists")]
pub struct ConflictError {
    pub entity: &'static str,
    pub key: String,
}

/// An execution record was asked to move along an edge the state machine
/// does not have.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("cannot move execution from {from} to {to}")]
pub struct TransitionError {
    pub from: ExecutionStatus,
    pub to: ExecutionStatus,
}
