//! Actions: the handler contract, the registry keyed by action type, and
//! the executor that runs one action at a time.

mod executor;
mod log_handler;
mod registry;

pub use executor::ActionExecutor;
pub use log_handler::LogHandler;
pub use registry::ActionRegistry;

use async_trait::async_trait;

use autorule_domain::context::TriggerContext;
use autorule_domain::value::{Parameters, Value};

/// Unexpected handler error. Treated exactly like a failed outcome.
pub type ActionFault = Box<dyn std::error::Error + Send + Sync>;

/// What a handler reports back for one call.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    pub success: bool,
    pub message: String,
    pub effect: Option<Value>,
}

impl ActionOutcome {
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            effect: None,
        }
    }

    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            effect: None,
        }
    }

    #[must_use]
    pub fn with_effect(mut self, effect: impl Into<Value>) -> Self {
        self.effect = Some(effect.into());
        self
    }
}

/// A business action registered under an action type.
///
/// Expected business failures are returned as `success = false`; only
/// unexpected problems should surface as [`ActionFault`].
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn execute(
        &self,
        parameters: &Parameters,
        context: &TriggerContext,
    ) -> Result<ActionOutcome, ActionFault>;
}
