//! Condition: a guard evaluated against the trigger context.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Operator, Trigger};
use crate::change::EventKind;
use crate::error::ValidationError;
use crate::value::Value;

/// Separator between relation hops in a field path (`order.customer.tier`).
pub const PATH_SEPARATOR: char = '.';

/// A single `field operator literal` test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Dotted path, resolved against the subject and its relations.
    pub field: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: Value,
}

impl Condition {
    #[must_use]
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    /// Shape checks that can be done without any data.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found.
    pub fn validate(&self, trigger: &Trigger) -> Result<(), ValidationError> {
        if self.field.trim().is_empty() || self.field.split(PATH_SEPARATOR).any(str::is_empty) {
            return Err(ValidationError::EmptyFieldPath);
        }

        if self.operator.requires_list() && self.value.as_list().is_none() {
            return Err(ValidationError::ListLiteralRequired {
                field: self.field.clone(),
                operator: self.operator,
            });
        }

        if self
            .value
            .as_list()
            .is_some_and(|items| !items.iter().all(Value::is_scalar))
        {
            return Err(ValidationError::NestedList {
                field: self.field.clone(),
            });
        }

        if self.operator.is_change() && trigger.event_kind() != Some(EventKind::Updated) {
            return Err(ValidationError::ChangeOperatorRequiresUpdate {
                field: self.field.clone(),
                operator: self.operator,
            });
        }

        Ok(())
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.operator, self.value)
    }
}
