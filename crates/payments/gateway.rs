use std::collections::HashMap;

use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;

/// Outcome classification for any call that moves money.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentGatewayError {
    /// Network, rate-limit or 5xx-class failure. Safe to retry with the same idempotency key.
    #[error("transient gateway failure: {0}")]
    Transient(String),
    /// Invalid account, compliance block or rejected request. Retrying will not help.
    #[error("permanent gateway failure: {0}")]
    Permanent(String),
}

impl PaymentGatewayError {
    pub fn reason(&self) -> &str {
        match self {
            PaymentGatewayError::Transient(reason) | PaymentGatewayError::Permanent(reason) => {
                reason
            }
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, PaymentGatewayError::Transient(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePaymentIntentRequest {
    pub amount_minor: i64,
    pub currency: String,
    pub idempotency_key: String,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTransferRequest {
    pub amount_minor: i64,
    pub currency: String,
    pub destination_account: String,
    pub idempotency_key: String,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SucceededPayment {
    pub payment_intent_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub metadata: HashMap<String, String>,
}

/// Verified webhook event reduced to what settlement cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    PaymentSucceeded(SucceededPayment),
    ChargeRefunded { payment_intent_id: String },
    DisputeCreated { payment_intent_id: String },
    Ignored { event_type: String },
}

#[automock]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment_intent(
        &self,
        request: CreatePaymentIntentRequest,
    ) -> Result<CreatedPaymentIntent, PaymentGatewayError>;

    /// Returns the gateway's transfer id on success.
    async fn create_transfer(
        &self,
        request: CreateTransferRequest,
    ) -> Result<String, PaymentGatewayError>;

    fn parse_webhook(&self, payload: &[u8], signature_header: &str)
    -> anyhow::Result<GatewayEvent>;
}
