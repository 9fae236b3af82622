use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use mockall::automock;
use reqwest::Client;
use serde::Serialize;
use serde_json::{Value, json};
use std::{collections::BTreeMap, sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tracing::{Level, warn};
use url::Url;

const QUEUE_CAPACITY: usize = 256;
const SEND_TIMEOUT: Duration = Duration::from_secs(3);

/// A log event at or above the alert threshold, with secret fields already redacted.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub(crate) struct AlertEvent {
    #[serde(serialize_with = "level_name")]
    pub(crate) level: Level,
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) service: String,
    pub(crate) environment: String,
    pub(crate) component: String,
    pub(crate) target: String,
    pub(crate) location: Option<String>,
    pub(crate) message: Option<String>,
    pub(crate) fields: BTreeMap<String, String>,
    pub(crate) spans: Vec<String>,
}

fn level_name<S: serde::Serializer>(level: &Level, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(level.as_str())
}

impl AlertEvent {
    /// One-line digest for chat webhooks that only render `text`.
    pub(crate) fn summary(&self) -> String {
        let mut line = format!(
            "[{}] {}/{} {} {}",
            self.level,
            self.service,
            self.environment,
            self.target,
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        if let Some(message) = self.message.as_deref().filter(|m| !m.trim().is_empty()) {
            line.push_str(": ");
            line.push_str(message.trim());
        }
        line
    }
}

#[automock]
#[async_trait]
pub(crate) trait AlertSink: Send + Sync {
    async fn deliver(&self, event: &AlertEvent) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Posts each alert as JSON to an operator webhook.
pub(crate) struct WebhookAlertSink {
    url: Url,
    client: Client,
}

impl WebhookAlertSink {
    pub(crate) fn new(url: Url) -> Result<Self> {
        let client = Client::builder().timeout(SEND_TIMEOUT).build()?;
        Ok(Self { url, client })
    }
}

fn payload(event: &AlertEvent) -> Value {
    json!({ "text": event.summary(), "alert": event })
}

#[async_trait]
impl AlertSink for WebhookAlertSink {
    async fn deliver(&self, event: &AlertEvent) -> Result<()> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&payload(event))
            .send()
            .await
            // The webhook URL carries its credential; keep it out of the error.
            .map_err(|err| anyhow!("alert webhook request failed: {}", err.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("alert webhook returned {status}"));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}

/// Bounded queue between the tracing layer and the sinks. Events are dropped when it is full.
#[derive(Clone)]
pub(crate) struct AlertDispatcher {
    tx: mpsc::Sender<AlertEvent>,
}

impl AlertDispatcher {
    /// Must be called from inside a tokio runtime.
    pub(crate) fn spawn(sinks: Vec<Arc<dyn AlertSink>>) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        tokio::spawn(drain(rx, sinks));
        Self::from_sender(tx)
    }

    pub(crate) fn from_sender(tx: mpsc::Sender<AlertEvent>) -> Self {
        Self { tx }
    }

    pub(crate) fn dispatch(&self, event: AlertEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("observability: alert queue full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("observability: alert queue closed, dropping event");
            }
        }
    }
}

pub(crate) async fn drain(mut rx: mpsc::Receiver<AlertEvent>, sinks: Vec<Arc<dyn AlertSink>>) {
    while let Some(event) = rx.recv().await {
        for sink in &sinks {
            if let Err(err) = sink.deliver(&event).await {
                warn!(sink = sink.name(), error = %err, "observability: alert delivery failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn alert(message: &str) -> AlertEvent {
        AlertEvent {
            level: Level::ERROR,
            timestamp: Utc.with_ymd_and_hms(2025, 3, 4, 9, 30, 0).unwrap(),
            service: "worker".to_string(),
            environment: "production".to_string(),
            component: "worker".to_string(),
            target: "worker::usecases::process_payment_transfers".to_string(),
            location: None,
            message: Some(message.to_string()),
            fields: BTreeMap::from([("transfer_id".to_string(), "t-1".to_string())]),
            spans: Vec::new(),
        }
    }

    #[test]
    fn payload_carries_a_text_digest_and_the_structured_event() {
        let body = payload(&alert("payout escalated"));

        assert_eq!(
            body["text"],
            "[ERROR] worker/production worker::usecases::process_payment_transfers \
             2025-03-04T09:30:00Z: payout escalated"
        );
        assert_eq!(body["alert"]["level"], "ERROR");
        assert_eq!(body["alert"]["fields"]["transfer_id"], "t-1");
    }

    #[tokio::test]
    async fn failing_sink_does_not_stop_the_others() {
        let mut broken = MockAlertSink::new();
        broken
            .expect_deliver()
            .times(2)
            .returning(|_| Err(anyhow!("503")));
        broken.expect_name().return_const("broken");
        let mut healthy = MockAlertSink::new();
        healthy
            .expect_deliver()
            .withf(|event| event.message.is_some())
            .times(2)
            .returning(|_| Ok(()));
        healthy.expect_name().return_const("healthy");

        let (tx, rx) = mpsc::channel(4);
        let dispatcher = AlertDispatcher::from_sender(tx);
        dispatcher.dispatch(alert("first"));
        dispatcher.dispatch(alert("second"));
        drop(dispatcher);

        let sinks: Vec<Arc<dyn AlertSink>> = vec![Arc::new(broken), Arc::new(healthy)];
        drain(rx, sinks).await;
    }

    #[test]
    fn full_queue_drops_instead_of_blocking() {
        let (tx, mut rx) = mpsc::channel(1);
        let dispatcher = AlertDispatcher::from_sender(tx);

        dispatcher.dispatch(alert("kept"));
        dispatcher.dispatch(alert("dropped"));

        assert_eq!(rx.try_recv().unwrap().message.as_deref(), Some("kept"));
        assert!(rx.try_recv().is_err());
    }
}
