//! Runs one action through its registered handler.

use std::sync::Arc;
use std::time::Duration;

use autorule_domain::context::TriggerContext;
use autorule_domain::execution::{ActionStep, StepOutcome};
use autorule_domain::rule::Action;

use super::{ActionOutcome, ActionRegistry};
use crate::ports::Clock;

/// Dispatches actions to their registered handlers.
///
/// Each call yields one [`ActionStep`]; the caller owns ordering, stopping
/// at the first failure and persisting the steps.
pub struct ActionExecutor<C> {
    registry: Arc<ActionRegistry>,
    timeout: Duration,
    clock: C,
}

impl<C: Clock> ActionExecutor<C> {
    pub fn new(registry: Arc<ActionRegistry>, timeout: Duration, clock: C) -> Self {
        Self {
            registry,
            timeout,
            clock,
        }
    }

    /// Run `action` against `context`. Never fails: a missing handler, a
    /// fault, a panic or a timeout all come back as a failed step.
    pub async fn run_step(&self, action: &Action, context: &Arc<TriggerContext>) -> ActionStep {
        let started_at = self.clock.now();
        let outcome = self.call_handler(action, context).await;
        ActionStep {
            order: action.order,
            action_type: action.action_type.clone(),
            parameters: action.parameters.clone(),
            outcome: if outcome.success {
                StepOutcome::Success
            } else {
                StepOutcome::Failure
            },
            message: Some(outcome.message),
            effect: outcome.effect,
            started_at,
            finished_at: self.clock.now(),
        }
    }

    /// Call the handler in its own task, so that a panic or an overrun
    /// comes back as a plain failure.
    async fn call_handler(
        &self,
        action: &Action,
        context: &Arc<TriggerContext>,
    ) -> ActionOutcome {
        let Some(handler) = self.registry.lookup(&action.action_type) else {
            return ActionOutcome::failure(format!("handler not found: {}", action.action_type));
        };

        let parameters = action.parameters.clone();
        let context = Arc::clone(context);
        let mut task = tokio::spawn(async move { handler.execute(&parameters, &context).await });

        match tokio::time::timeout(self.timeout, &mut task).await {
            Ok(Ok(Ok(outcome))) => outcome,
            Ok(Ok(Err(fault))) => ActionOutcome::failure(fault.to_string()),
            Ok(Err(join_error)) if join_error.is_panic() => {
                ActionOutcome::failure("handler panicked")
            }
            Ok(Err(_)) => ActionOutcome::failure("handler cancelled"),
            Err(_) => {
                task.abort();
                ActionOutcome::failure("timeout")
            }
        }
    }
}
