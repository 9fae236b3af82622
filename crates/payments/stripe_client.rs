use std::collections::HashMap;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{
    StatusCode,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{error, warn};

use super::gateway::{
    CreatePaymentIntentRequest, CreateTransferRequest, CreatedPaymentIntent, GatewayEvent,
    PaymentGateway, PaymentGatewayError, SucceededPayment,
};

type HmacSha256 = Hmac<Sha256>;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";
/// Signed webhooks older than this are rejected as replays.
const WEBHOOK_TOLERANCE_SECONDS: i64 = 300;

/// Minimal Stripe client built on reqwest.
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    webhook_secret: String,
}

#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub type_: String,
    pub created: Option<i64>,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct StripePaymentIntent {
    id: String,
    #[serde(default)]
    amount_received: Option<i64>,
    amount: i64,
    currency: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

/// Charges and disputes both carry the originating payment intent.
#[derive(Debug, Deserialize)]
struct StripePaymentIntentRef {
    payment_intent: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
}

/// Maps a failed Stripe response onto the retry taxonomy.
pub fn classify_failure(
    status: StatusCode,
    error_type: Option<&str>,
    error_code: Option<&str>,
    message: &str,
) -> PaymentGatewayError {
    let reason = match error_code {
        Some(code) => format!("{status} {code}: {message}"),
        None => format!("{status}: {message}"),
    };

    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::CONFLICT
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        return PaymentGatewayError::Transient(reason);
    }

    match error_type {
        Some("api_error") | Some("rate_limit_error") | Some("api_connection_error") => {
            PaymentGatewayError::Transient(reason)
        }
        _ => PaymentGatewayError::Permanent(reason),
    }
}

fn classify_transport(err: reqwest::Error) -> PaymentGatewayError {
    // Nothing reached Stripe or the answer was lost; the idempotency key makes a retry safe.
    PaymentGatewayError::Transient(format!("stripe transport error: {err}"))
}

impl StripeClient {
    pub fn new(secret_key: String, webhook_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key,
            webhook_secret,
        }
    }

    /// A client that moves money but rejects every webhook.
    pub fn without_webhooks(secret_key: String) -> Self {
        Self::new(secret_key, String::new())
    }

    async fn ensure_success(
        resp: reqwest::Response,
        context: &str,
    ) -> Result<reqwest::Response, PaymentGatewayError> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let details = serde_json::from_str::<StripeErrorEnvelope>(&body)
            .map(|envelope| envelope.error)
            .ok();
        let error_type = details.as_ref().and_then(|d| d.type_.clone());
        let error_code = details.as_ref().and_then(|d| d.code.clone());
        let message = details
            .as_ref()
            .and_then(|d| d.message.clone())
            .unwrap_or_else(|| "stripe request failed".to_string());

        let classified = classify_failure(
            status,
            error_type.as_deref(),
            error_code.as_deref(),
            &message,
        );

        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?error_type,
            stripe_error_code = ?error_code,
            transient = classified.is_transient(),
            context = %context,
            "stripe: api request failed"
        );

        Err(classified)
    }

    fn post(&self, path: &str, idempotency_key: &str) -> reqwest::RequestBuilder {
        self.http
            .post(format!("{STRIPE_API_BASE}{path}"))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header("Idempotency-Key", idempotency_key)
    }

    fn verify_signature(&self, payload: &[u8], signature_header: &str, now: i64) -> Result<()> {
        if self.webhook_secret.is_empty() {
            bail!("webhook secret is not configured");
        }
        let mut timestamp: Option<&str> = None;
        let mut signatures: Vec<&str> = Vec::new();

        for part in signature_header.split(',') {
            let part = part.trim();
            if let Some(rest) = part.strip_prefix("t=") {
                timestamp = Some(rest);
            } else if let Some(rest) = part.strip_prefix("v1=") {
                signatures.push(rest);
            }
        }

        let timestamp = timestamp.context("missing timestamp in stripe-signature")?;
        if signatures.is_empty() {
            bail!("missing v1 in stripe-signature");
        }

        let signed_at: i64 = timestamp
            .parse()
            .context("stripe-signature timestamp is not a number")?;
        if (now - signed_at).abs() > WEBHOOK_TOLERANCE_SECONDS {
            bail!("webhook timestamp outside tolerance");
        }

        for signature in signatures {
            let Ok(provided) = hex::decode(signature) else {
                continue;
            };
            let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())?;
            mac.update(timestamp.as_bytes());
            mac.update(b".");
            mac.update(payload);
            if mac.verify_slice(&provided).is_ok() {
                return Ok(());
            }
        }

        bail!("invalid webhook signature")
    }

    pub fn to_gateway_event(event: StripeEvent) -> Result<GatewayEvent> {
        match event.type_.as_str() {
            "payment_intent.succeeded" => {
                let intent: StripePaymentIntent = serde_json::from_value(event.data.object)
                    .context("payment_intent.succeeded carries no payment intent")?;
                Ok(GatewayEvent::PaymentSucceeded(SucceededPayment {
                    payment_intent_id: intent.id,
                    amount_minor: intent.amount_received.unwrap_or(intent.amount),
                    currency: intent.currency,
                    metadata: intent.metadata,
                }))
            }
            "charge.refunded" | "charge.dispute.created" => {
                let reference: StripePaymentIntentRef = serde_json::from_value(event.data.object)
                    .with_context(|| format!("{} carries no object", event.type_))?;
                let payment_intent_id = reference
                    .payment_intent
                    .with_context(|| format!("{} is missing payment_intent", event.type_))?;

                if event.type_ == "charge.refunded" {
                    Ok(GatewayEvent::ChargeRefunded { payment_intent_id })
                } else {
                    Ok(GatewayEvent::DisputeCreated { payment_intent_id })
                }
            }
            other => Ok(GatewayEvent::Ignored {
                event_type: other.to_string(),
            }),
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_payment_intent(
        &self,
        request: CreatePaymentIntentRequest,
    ) -> Result<CreatedPaymentIntent, PaymentGatewayError> {
        // https://stripe.com/docs/api/payment_intents/create
        let mut body: Vec<(String, String)> = vec![
            ("amount".to_string(), request.amount_minor.to_string()),
            ("currency".to_string(), request.currency.to_lowercase()),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
        ];
        for (key, value) in request.metadata {
            body.push((format!("metadata[{key}]"), value));
        }

        let resp = self
            .post("/payment_intents", &request.idempotency_key)
            .form(&body)
            .send()
            .await
            .map_err(classify_transport)?;
        let resp = Self::ensure_success(resp, "create payment intent").await?;

        #[derive(Deserialize)]
        struct IntentResp {
            id: String,
            client_secret: Option<String>,
        }

        let parsed: IntentResp = resp.json().await.map_err(classify_transport)?;
        Ok(CreatedPaymentIntent {
            id: parsed.id,
            client_secret: parsed.client_secret,
        })
    }

    async fn create_transfer(
        &self,
        request: CreateTransferRequest,
    ) -> Result<String, PaymentGatewayError> {
        // https://stripe.com/docs/api/transfers/create
        let mut body: Vec<(String, String)> = vec![
            ("amount".to_string(), request.amount_minor.to_string()),
            ("currency".to_string(), request.currency.to_lowercase()),
            ("destination".to_string(), request.destination_account),
        ];
        for (key, value) in request.metadata {
            body.push((format!("metadata[{key}]"), value));
        }

        let resp = self
            .post("/transfers", &request.idempotency_key)
            .form(&body)
            .send()
            .await
            .map_err(classify_transport)?;
        let resp = Self::ensure_success(resp, "create transfer").await?;

        #[derive(Deserialize)]
        struct TransferResp {
            id: String,
        }

        let parsed: TransferResp = resp.json().await.map_err(classify_transport)?;
        Ok(parsed.id)
    }

    /// https://stripe.com/docs/webhooks/signatures
    fn parse_webhook(&self, payload: &[u8], signature_header: &str) -> Result<GatewayEvent> {
        self.verify_signature(payload, signature_header, Utc::now().timestamp())
            .inspect_err(|err| warn!(error = %err, "stripe: webhook signature rejected"))?;

        let event: StripeEvent = serde_json::from_slice(payload)?;
        Self::to_gateway_event(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";

    fn sign(payload: &str, timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.{payload}").as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());
        format!("t={timestamp},v1={signature}")
    }

    fn client() -> StripeClient {
        StripeClient::new("sk_test".to_string(), SECRET.to_string())
    }

    #[test]
    fn accepts_a_fresh_valid_signature() {
        let payload = r#"{"type":"ping","data":{"object":{}}}"#;
        let now = 1_700_000_000;
        let header = sign(payload, now);

        assert!(client().verify_signature(payload.as_bytes(), &header, now + 10).is_ok());
    }

    #[test]
    fn rejects_tampered_payload() {
        let now = 1_700_000_000;
        let header = sign(r#"{"amount":100}"#, now);

        assert!(
            client()
                .verify_signature(br#"{"amount":999}"#, &header, now)
                .is_err()
        );
    }

    #[test]
    fn rejects_replayed_signature() {
        let payload = "{}";
        let signed_at = 1_700_000_000;
        let header = sign(payload, signed_at);

        assert!(
            client()
                .verify_signature(payload.as_bytes(), &header, signed_at + 301)
                .is_err()
        );
    }

    #[test]
    fn payout_only_client_rejects_webhooks() {
        let payload = "{}";
        let now = 1_700_000_000;
        let header = sign(payload, now);

        let client = StripeClient::without_webhooks("sk_test".to_string());
        assert!(client.verify_signature(payload.as_bytes(), &header, now).is_err());
    }

    #[test]
    fn classifies_rate_limits_and_server_errors_as_transient() {
        assert!(classify_failure(StatusCode::TOO_MANY_REQUESTS, None, None, "slow down").is_transient());
        assert!(classify_failure(StatusCode::BAD_GATEWAY, None, None, "upstream").is_transient());
        assert!(
            classify_failure(StatusCode::BAD_REQUEST, Some("api_error"), None, "hiccup")
                .is_transient()
        );
    }

    #[test]
    fn classifies_invalid_requests_as_permanent() {
        let err = classify_failure(
            StatusCode::BAD_REQUEST,
            Some("invalid_request_error"),
            Some("account_invalid"),
            "No such destination",
        );
        assert_eq!(
            err,
            PaymentGatewayError::Permanent("400 Bad Request account_invalid: No such destination".to_string())
        );
    }

    #[test]
    fn maps_succeeded_payment_intent_with_metadata() {
        let event: StripeEvent = serde_json::from_str(
            r#"{
                "id": "evt_1",
                "type": "payment_intent.succeeded",
                "data": {"object": {
                    "id": "pi_123",
                    "amount": 5000,
                    "amount_received": 5000,
                    "currency": "usd",
                    "metadata": {"reservation_id": "abc"}
                }}
            }"#,
        )
        .unwrap();

        match StripeClient::to_gateway_event(event).unwrap() {
            GatewayEvent::PaymentSucceeded(payment) => {
                assert_eq!(payment.payment_intent_id, "pi_123");
                assert_eq!(payment.amount_minor, 5000);
                assert_eq!(payment.metadata.get("reservation_id").map(String::as_str), Some("abc"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn maps_refund_and_dispute_to_their_payment_intent() {
        let refund: StripeEvent = serde_json::from_str(
            r#"{"type":"charge.refunded","data":{"object":{"id":"ch_1","payment_intent":"pi_9"}}}"#,
        )
        .unwrap();
        let dispute: StripeEvent = serde_json::from_str(
            r#"{"type":"charge.dispute.created","data":{"object":{"id":"dp_1","payment_intent":"pi_9"}}}"#,
        )
        .unwrap();

        assert_eq!(
            StripeClient::to_gateway_event(refund).unwrap(),
            GatewayEvent::ChargeRefunded {
                payment_intent_id: "pi_9".to_string()
            }
        );
        assert_eq!(
            StripeClient::to_gateway_event(dispute).unwrap(),
            GatewayEvent::DisputeCreated {
                payment_intent_id: "pi_9".to_string()
            }
        );
    }

    #[test]
    fn unknown_events_are_ignored() {
        let event: StripeEvent =
            serde_json::from_str(r#"{"type":"customer.created","data":{"object":{}}}"#).unwrap();
        assert_eq!(
            StripeClient::to_gateway_event(event).unwrap(),
            GatewayEvent::Ignored {
                event_type: "customer.created".to_string()
            }
        );
    }
}
