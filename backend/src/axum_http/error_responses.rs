use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::usecases::{
    booking_confirmation::ConfirmationError, eligibility::EligibilityError,
    payment_transfers::TransferAdminError, reservations::ReservationError,
};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    /// Server-side failure; only the status reason reaches the client.
    #[error("{0}")]
    Upstream(StatusCode),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn with_status(status: StatusCode, err: &dyn std::fmt::Display) -> Self {
        if status.is_server_error() {
            error!(status = %status, error = %err, "http: request failed");
            AppError::Upstream(status)
        } else {
            AppError::Rejected {
                status,
                message: err.to_string(),
            }
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::Rejected {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Rejected { status, message } => (status, message),
            AppError::Upstream(status) => (
                status,
                status
                    .canonical_reason()
                    .unwrap_or("Internal server error")
                    .to_string(),
            ),
            AppError::Internal(err) => {
                error!(error = ?err, "http: internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            code: status.as_u16(),
            message,
        });

        (status, body).into_response()
    }
}

impl From<ReservationError> for AppError {
    fn from(err: ReservationError) -> Self {
        AppError::with_status(err.status_code(), &err)
    }
}

impl From<ConfirmationError> for AppError {
    fn from(err: ConfirmationError) -> Self {
        AppError::with_status(err.status_code(), &err)
    }
}

impl From<TransferAdminError> for AppError {
    fn from(err: TransferAdminError) -> Self {
        AppError::with_status(err.status_code(), &err)
    }
}

impl From<EligibilityError> for AppError {
    fn from(err: EligibilityError) -> Self {
        AppError::with_status(err.status_code(), &err)
    }
}
