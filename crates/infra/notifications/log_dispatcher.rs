use tracing::info;

use crate::domain::{
    repositories::notifications::NotificationDispatcher,
    value_objects::notifications::NotificationEvent,
};

/// Used when no notification endpoint is configured.
#[derive(Debug, Default, Clone)]
pub struct LogNotificationDispatcher;

impl NotificationDispatcher for LogNotificationDispatcher {
    fn trigger(&self, event: NotificationEvent) {
        info!(
            event = event.name(),
            payload = %event.payload(),
            "notifications: no endpoint configured, event logged only"
        );
    }
}
