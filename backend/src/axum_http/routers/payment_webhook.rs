use std::sync::Arc;

use axum::{
    Json, Router, body::Bytes, extract::State, http::HeaderMap, response::IntoResponse,
    routing::post,
};
use crates::{
    infra::db::repositories::{
        commission_transactions::CommissionTransactionPostgres, meetings::MeetingPostgres,
        payment_transfers::PaymentTransferPostgres, plan_rates::PlanRatePostgres,
        subscription_plans::SubscriptionPlanPostgres,
    },
    payments::stripe_client::StripeClient,
};

use crate::{axum_http::error_responses::AppError, usecases::payment_webhook::PaymentWebhookUseCase};

pub const SIGNATURE_HEADER: &str = "stripe-signature";

pub type PaymentWebhookUseCasePg = PaymentWebhookUseCase<
    StripeClient,
    MeetingPostgres,
    SubscriptionPlanPostgres,
    PlanRatePostgres,
    CommissionTransactionPostgres,
    PaymentTransferPostgres,
>;

pub fn routes(usecase: Arc<PaymentWebhookUseCasePg>) -> Router {
    Router::new()
        .route("/webhook", post(payment_webhook))
        .with_state(usecase)
}

pub async fn payment_webhook(
    State(usecase): State<Arc<PaymentWebhookUseCasePg>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::bad_request("missing stripe-signature header"))?;

    let outcome = usecase.handle(&body, signature).await?;
    Ok(Json(outcome))
}
