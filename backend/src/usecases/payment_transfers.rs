use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use crates::domain::{
    entities::{
        meetings::MeetingEntity,
        payment_transfers::{InsertPaymentTransferEntity, PaymentTransferEntity},
    },
    repositories::payment_transfers::PaymentTransferRepository,
    value_objects::{
        enums::transfer_statuses::TransferStatus,
        transfers::{PaymentTransferDto, scheduled_transfer_time},
    },
};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Creates the deferred payout for a confirmed meeting.
pub struct TransferScheduler<T>
where
    T: PaymentTransferRepository + Send + Sync + 'static,
{
    transfer_repo: Arc<T>,
    payout_delay: Duration,
}

impl<T> TransferScheduler<T>
where
    T: PaymentTransferRepository + Send + Sync + 'static,
{
    pub fn new(transfer_repo: Arc<T>, payout_delay: Duration) -> Self {
        Self {
            transfer_repo,
            payout_delay,
        }
    }

    /// Idempotent per meeting. `net_amount_minor` is what the expert receives.
    pub async fn schedule_for(
        &self,
        meeting: &MeetingEntity,
        net_amount_minor: i64,
    ) -> Result<PaymentTransferEntity> {
        let scheduled = scheduled_transfer_time(meeting.window.start(), self.payout_delay);

        let transfer = self
            .transfer_repo
            .schedule(InsertPaymentTransferEntity {
                meeting_id: meeting.id,
                expert_id: meeting.expert_id,
                amount_minor: net_amount_minor,
                currency: meeting.currency.clone(),
                meeting_start_time: meeting.window.start(),
                scheduled_transfer_time: scheduled,
                next_attempt_at: scheduled,
                status: TransferStatus::Pending.to_string(),
            })
            .await?;

        info!(
            transfer_id = %transfer.id,
            meeting_id = %meeting.id,
            scheduled_transfer_time = %transfer.scheduled_transfer_time,
            "payment_transfers: payout scheduled"
        );

        Ok(transfer)
    }
}

#[derive(Debug, Error)]
pub enum TransferAdminError {
    #[error("transfer not found")]
    NotFound,
    #[error("cannot {action} a transfer in status {from}")]
    InvalidTransition {
        from: TransferStatus,
        action: &'static str,
    },
    #[error("the meeting's payment was refunded or disputed")]
    PaymentReversed,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl TransferAdminError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            TransferAdminError::NotFound => StatusCode::NOT_FOUND,
            TransferAdminError::InvalidTransition { .. } | TransferAdminError::PaymentReversed => {
                StatusCode::CONFLICT
            }
            TransferAdminError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// The only externally triggered transfer transitions.
pub struct TransferAdminUseCase<T>
where
    T: PaymentTransferRepository + Send + Sync + 'static,
{
    transfer_repo: Arc<T>,
}

impl<T> TransferAdminUseCase<T>
where
    T: PaymentTransferRepository + Send + Sync + 'static,
{
    pub fn new(transfer_repo: Arc<T>) -> Self {
        Self { transfer_repo }
    }

    pub async fn list_requires_approval(
        &self,
        limit: Option<i64>,
    ) -> Result<Vec<PaymentTransferDto>, TransferAdminError> {
        let limit = limit.unwrap_or(50).clamp(1, 200);
        let rows = self
            .transfer_repo
            .list_by_status(TransferStatus::RequiresApproval, limit)
            .await?;
        Ok(rows.into_iter().map(PaymentTransferDto::from).collect())
    }

    /// Re-queues an escalated transfer with a fresh retry budget.
    pub async fn approve(
        &self,
        transfer_id: Uuid,
        admin_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<PaymentTransferDto, TransferAdminError> {
        match self.transfer_repo.approve(transfer_id, admin_id, now).await? {
            Some(transfer) => {
                info!(%transfer_id, %admin_id, "payment_transfers: approved and re-queued");
                Ok(PaymentTransferDto::from(transfer))
            }
            None => match self.rejection(transfer_id, "approve").await {
                // Still awaiting approval, so the payment check refused it.
                TransferAdminError::InvalidTransition {
                    from: TransferStatus::RequiresApproval,
                    ..
                } => Err(TransferAdminError::PaymentReversed),
                other => Err(other),
            },
        }
    }

    pub async fn cancel(
        &self,
        transfer_id: Uuid,
        admin_id: Uuid,
    ) -> Result<PaymentTransferDto, TransferAdminError> {
        match self.transfer_repo.cancel(transfer_id).await? {
            Some(transfer) => {
                info!(%transfer_id, %admin_id, "payment_transfers: cancelled by admin");
                Ok(PaymentTransferDto::from(transfer))
            }
            None => Err(self.rejection(transfer_id, "cancel").await),
        }
    }

    async fn rejection(&self, transfer_id: Uuid, action: &'static str) -> TransferAdminError {
        match self.transfer_repo.find_by_id(transfer_id).await {
            Ok(Some(transfer)) => TransferAdminError::InvalidTransition {
                from: transfer.status,
                action,
            },
            Ok(None) => TransferAdminError::NotFound,
            Err(err) => TransferAdminError::Internal(err),
        }
    }
}
