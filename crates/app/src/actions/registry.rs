//! Concurrent map from action type to handler.

use std::sync::Arc;

use dashmap::DashMap;

use super::ActionHandler;

/// Handlers keyed by action type.
///
/// Safe to share: registration and lookup can happen while jobs run. A
/// lookup hands out its own `Arc`, so deregistering never pulls a handler
/// from under a running call.
#[derive(Default)]
pub struct ActionRegistry {
    handlers: DashMap<String, Arc<dyn ActionHandler>>,
}

impl ActionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `action_type`, returning the handler it replaced.
    pub fn register(
        &self,
        action_type: impl Into<String>,
        handler: impl ActionHandler + 'static,
    ) -> Option<Arc<dyn ActionHandler>> {
        let action_type = action_type.into();
        tracing::debug!(%action_type, "action handler registered");
        self.handlers.insert(action_type, Arc::new(handler))
    }

    /// Remove the handler for `action_type`. Returns whether one was present.
    pub fn deregister(&self, action_type: &str) -> bool {
        self.handlers.remove(action_type).is_some()
    }

    #[must_use]
    pub fn lookup(&self, action_type: &str) -> Option<Arc<dyn ActionHandler>> {
        self.handlers
            .get(action_type)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Registered action types, sorted.
    #[must_use]
    pub fn action_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.iter().map(|e| e.key().clone()).collect();
        types.sort();
        types
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("action_types", &self.action_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingHandler, RejectingHandler};

    #[test]
    fn should_lookup_registered_handler() {
        let registry = ActionRegistry::new();
        assert!(registry.register("notify", RecordingHandler::default()).is_none());
        assert!(registry.lookup("notify").is_some());
        assert!(registry.lookup("Notify").is_none());
    }

    #[test]
    fn should_replace_handler_on_reregistration() {
        let registry = ActionRegistry::new();
        registry.register("notify", RecordingHandler::default());
        assert!(registry.register("notify", RejectingHandler).is_some());
        assert_eq!(registry.action_types(), ["notify"]);
    }

    #[test]
    fn should_forget_deregistered_handler() {
        let registry = ActionRegistry::new();
        registry.register("notify", RecordingHandler::default());
        let held = registry.lookup("notify");

        assert!(registry.deregister("notify"));
        assert!(!registry.deregister("notify"));
        assert!(registry.lookup("notify").is_none());
        assert!(held.is_some());
    }

    #[test]
    fn should_list_action_types_sorted() {
        let registry = ActionRegistry::new();
        registry.register("webhook", RejectingHandler);
        registry.register("email", RejectingHandler);
        assert_eq!(registry.action_types(), ["email", "webhook"]);
    }
}
