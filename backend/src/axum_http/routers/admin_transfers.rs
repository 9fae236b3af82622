use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use crates::infra::db::repositories::payment_transfers::PaymentTransferPostgres;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::AdminUser, axum_http::error_responses::AppError,
    usecases::payment_transfers::TransferAdminUseCase,
};

pub type TransferAdminUseCasePg = TransferAdminUseCase<PaymentTransferPostgres>;

pub fn routes(usecase: Arc<TransferAdminUseCasePg>) -> Router {
    Router::new()
        .route("/requires-approval", get(list_requires_approval))
        .route("/:transfer_id/approve", post(approve_transfer))
        .route("/:transfer_id/cancel", post(cancel_transfer))
        .with_state(usecase)
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

pub async fn list_requires_approval(
    State(usecase): State<Arc<TransferAdminUseCasePg>>,
    _admin: AdminUser,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(usecase.list_requires_approval(query.limit).await?))
}

pub async fn approve_transfer(
    State(usecase): State<Arc<TransferAdminUseCasePg>>,
    AdminUser(admin): AdminUser,
    Path(transfer_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let transfer = usecase
        .approve(transfer_id, admin.account_id(), Utc::now())
        .await?;
    Ok(Json(transfer))
}

pub async fn cancel_transfer(
    State(usecase): State<Arc<TransferAdminUseCasePg>>,
    AdminUser(admin): AdminUser,
    Path(transfer_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(usecase.cancel(transfer_id, admin.account_id()).await?))
}
