//! Built-in `log` action: writes a message through `tracing`.

use async_trait::async_trait;

use autorule_domain::context::TriggerContext;
use autorule_domain::value::{Parameters, Value};

use super::{ActionFault, ActionHandler, ActionOutcome};

/// Logs the `message` parameter at the `level` parameter (`info` by default).
#[derive(Debug, Clone, Copy, Default)]
pub struct LogHandler;

impl LogHandler {
    pub const ACTION_TYPE: &'static str = "log";
}

#[async_trait]
impl ActionHandler for LogHandler {
    async fn execute(
        &self,
        parameters: &Parameters,
        context: &TriggerContext,
    ) -> Result<ActionOutcome, ActionFault> {
        let Some(message) = parameters.get("message").filter(|m| !m.is_null()) else {
            return Ok(ActionOutcome::failure("missing \"message\" parameter"));
        };
        let level = parameters
            .get("level")
            .and_then(Value::as_str)
            .unwrap_or("info");
        let subject = context.change().map(|n| n.subject_id.as_str());

        let tenant = &context.tenant_id;
        match level {
            "debug" => tracing::debug!(%tenant, subject, %message, "rule action"),
            "info" => tracing::info!(%tenant, subject, %message, "rule action"),
            "warn" => tracing::warn!(%tenant, subject, %message, "rule action"),
            "error" => tracing::error!(%tenant, subject, %message, "rule action"),
            other => {
                return Ok(ActionOutcome::failure(format!(
                    "unknown log level {other:?}"
                )));
            }
        }
        Ok(ActionOutcome::success(format!("logged at {level}")).with_effect(message.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    fn parameters<const N: usize>(fields: [(&str, Value); N]) -> Parameters {
        testing::snapshot(fields)
    }

    #[tokio::test]
    async fn should_log_message_and_echo_it_as_effect() {
        let context = testing::updated_order("1", "active", "new");
        let outcome = LogHandler
            .execute(&parameters([("message", Value::from("hello"))]), &context)
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.message, "logged at info");
        assert_eq!(outcome.effect, Some(Value::from("hello")));
    }

    #[tokio::test]
    async fn should_fail_without_message() {
        let context = testing::updated_order("1", "active", "new");
        let outcome = LogHandler
            .execute(&parameters([]), &context)
            .await
            .unwrap();
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn should_fail_on_unknown_level() {
        let context = testing::updated_order("1", "active", "new");
        let outcome = LogHandler
            .execute(
                &parameters([
                    ("message", Value::from("hello")),
                    ("level", Value::from("loud")),
                ]),
                &context,
            )
            .await
            .unwrap();
        assert!(!outcome.success);
        assert!(outcome.message.contains("loud"));
    }
}
