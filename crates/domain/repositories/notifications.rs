use mockall::automock;

use crate::domain::value_objects::notifications::NotificationEvent;

/// Fire-and-forget delivery. Implementations must not block or fail the caller.
#[automock]
pub trait NotificationDispatcher: Send + Sync {
    fn trigger(&self, event: NotificationEvent);
}
