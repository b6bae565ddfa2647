//! Action: one registered effect to run when a rule's conditions pass.

use serde::{Deserialize, Serialize};

use crate::value::{Parameters, Value};

/// A step of a rule, dispatched to the handler registered for `action_type`.
///
/// Whether a handler exists is only known at dispatch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Position in the rule; unique per rule, executed ascending.
    pub order: u32,
    pub action_type: String,
    /// Passed verbatim to the handler.
    #[serde(default)]
    pub parameters: Parameters,
}

impl Action {
    #[must_use]
    pub fn new(order: u32, action_type: impl Into<String>) -> Self {
        Self {
            order,
            action_type: action_type.into(),
            parameters: Parameters::new(),
        }
    }

    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{} {}", self.order, self.action_type)
    }
}
