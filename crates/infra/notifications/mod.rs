pub mod log_dispatcher;
pub mod webhook_dispatcher;

use std::sync::Arc;

use tracing::warn;
use url::Url;

use crate::domain::repositories::notifications::NotificationDispatcher;

/// Webhook delivery when a valid endpoint is configured, log-only otherwise.
/// Must be called from inside a tokio runtime.
pub fn dispatcher_from_config(webhook_url: Option<&str>) -> Arc<dyn NotificationDispatcher> {
    match webhook_url.map(Url::parse) {
        Some(Ok(endpoint)) => Arc::new(webhook_dispatcher::WebhookNotificationDispatcher::new(
            endpoint,
        )),
        Some(Err(err)) => {
            warn!(error = %err, "notifications: invalid webhook url, falling back to log delivery");
            Arc::new(log_dispatcher::LogNotificationDispatcher)
        }
        None => Arc::new(log_dispatcher::LogNotificationDispatcher),
    }
}
