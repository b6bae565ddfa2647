//! Change feed port: where the storage collaborator pushes notifications.

use std::future::Future;
use std::sync::Arc;

use autorule_domain::change::ChangeNotification;
use autorule_domain::error::AutoruleError;

/// Publishes change notifications to the trigger dispatcher.
pub trait ChangePublisher {
    /// Publish a notification to all current subscribers.
    fn publish(
        &self,
        notification: ChangeNotification,
    ) -> impl Future<Output = Result<(), AutoruleError>> + Send;
}

impl<T: ChangePublisher + Send + Sync> ChangePublisher for Arc<T> {
    fn publish(
        &self,
        notification: ChangeNotification,
    ) -> impl Future<Output = Result<(), AutoruleError>> + Send {
        (**self).publish(notification)
    }
}
