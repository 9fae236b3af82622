use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use url::Url;

use crate::domain::{
    repositories::notifications::NotificationDispatcher,
    value_objects::notifications::NotificationEvent,
};

const QUEUE_CAPACITY: usize = 256;

/// Posts events as JSON to a single endpoint from a background task.
/// `trigger` never waits on the network; a full queue drops the event.
#[derive(Clone)]
pub struct WebhookNotificationDispatcher {
    tx: mpsc::Sender<NotificationEvent>,
}

impl WebhookNotificationDispatcher {
    /// Must be called from inside a tokio runtime.
    pub fn new(endpoint: Url) -> Self {
        let (tx, mut rx) = mpsc::channel::<NotificationEvent>(QUEUE_CAPACITY);
        let http = reqwest::Client::new();

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let body = envelope(&event, Utc::now());
                match http.post(endpoint.clone()).json(&body).send().await {
                    Ok(resp) if resp.status().is_success() => {
                        debug!(event = event.name(), "notifications: delivered");
                    }
                    Ok(resp) => {
                        warn!(
                            event = event.name(),
                            status = %resp.status(),
                            "notifications: endpoint rejected event"
                        );
                    }
                    Err(err) => {
                        warn!(
                            event = event.name(),
                            error = %err,
                            "notifications: delivery failed"
                        );
                    }
                }
            }
        });

        Self { tx }
    }
}

impl NotificationDispatcher for WebhookNotificationDispatcher {
    fn trigger(&self, event: NotificationEvent) {
        let name = event.name();
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(event = name, "notifications: queue full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(event = name, "notifications: queue closed, dropping event");
            }
        }
    }
}

pub fn envelope(event: &NotificationEvent, occurred_at: DateTime<Utc>) -> Value {
    json!({
        "event": event.name(),
        "occurred_at": occurred_at,
        "payload": event.payload(),
    })
}
