//! In-process change feed backed by a tokio broadcast channel.

use tokio::sync::broadcast;

use autorule_domain::change::ChangeNotification;
use autorule_domain::error::AutoruleError;

use crate::ports::ChangePublisher;

/// In-process change feed using a tokio [`broadcast`] channel.
///
/// Publishing succeeds even when there are no active subscribers
/// (the notification is simply dropped). A subscriber that falls more than
/// `capacity` notifications behind loses the oldest ones.
#[derive(Clone)]
pub struct InProcessChangeFeed {
    sender: broadcast::Sender<ChangeNotification>,
}

impl InProcessChangeFeed {
    /// Create a new feed with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to notifications published *after* this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeNotification> {
        self.sender.subscribe()
    }
}

impl ChangePublisher for InProcessChangeFeed {
    fn publish(
        &self,
        notification: ChangeNotification,
    ) -> impl Future<Output = Result<(), AutoruleError>> + Send {
        // Only fails when nobody listens.
        let _ = self.sender.send(notification);
        async { Ok(()) }
    }
}
