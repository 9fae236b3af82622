use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use chrono::Utc;
use crates::{
    domain::value_objects::reservations::ReserveSlotModel,
    infra::db::repositories::{events::EventPostgres, slot_reservations::SlotReservationPostgres},
    payments::stripe_client::StripeClient,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    axum_http::error_responses::AppError,
    usecases::reservations::{Requester, ReservationUseCase},
};

pub type ReservationUseCasePg = ReservationUseCase<EventPostgres, SlotReservationPostgres, StripeClient>;

pub fn routes(usecase: Arc<ReservationUseCasePg>) -> Router {
    Router::new()
        .route("/", post(reserve))
        .route("/:reservation_id/cancel", post(cancel))
        .route("/:reservation_id/payment-intent", post(create_payment_intent))
        .with_state(usecase)
}

fn requester(auth: &AuthUser) -> Requester {
    Requester {
        account_id: auth.account_id(),
        email: auth.email.clone(),
    }
}

pub async fn reserve(
    State(usecase): State<Arc<ReservationUseCasePg>>,
    auth: AuthUser,
    Json(model): Json<ReserveSlotModel>,
) -> Result<impl IntoResponse, AppError> {
    let reservation = usecase.reserve(&requester(&auth), model, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(reservation)))
}

pub async fn cancel(
    State(usecase): State<Arc<ReservationUseCasePg>>,
    auth: AuthUser,
    Path(reservation_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let status = usecase.cancel(&requester(&auth), reservation_id).await?;
    Ok(Json(json!({
        "reservation_id": reservation_id,
        "status": status,
    })))
}

pub async fn create_payment_intent(
    State(usecase): State<Arc<ReservationUseCasePg>>,
    auth: AuthUser,
    Path(reservation_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let intent = usecase
        .create_payment_intent(&requester(&auth), reservation_id, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(intent)))
}
