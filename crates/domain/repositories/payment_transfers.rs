use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::payment_transfers::{InsertPaymentTransferEntity, PaymentTransferEntity},
    value_objects::enums::transfer_statuses::TransferStatus,
};

#[automock]
#[async_trait]
pub trait PaymentTransferRepository {
    /// Idempotent per meeting.
    async fn schedule(&self, transfer: InsertPaymentTransferEntity)
    -> Result<PaymentTransferEntity>;

    async fn find_by_id(&self, transfer_id: Uuid) -> Result<Option<PaymentTransferEntity>>;

    async fn list_by_status(
        &self,
        status: TransferStatus,
        limit: i64,
    ) -> Result<Vec<PaymentTransferEntity>>;

    /// Leases up to `limit` due transfers (or stale leases) to `worker_id`. Reclaiming a
    /// stale lease counts as one attempt. Payouts of refunded or disputed meetings are skipped.
    async fn claim_due(
        &self,
        worker_id: String,
        now: DateTime<Utc>,
        leased_until: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<PaymentTransferEntity>>;

    /// Also marks the meeting's commission processed and stores the transfer on the meeting.
    async fn mark_succeeded(
        &self,
        transfer_id: Uuid,
        worker_id: String,
        gateway_transfer_id: String,
    ) -> Result<bool>;

    async fn mark_retry_scheduled(
        &self,
        transfer_id: Uuid,
        worker_id: String,
        retry_count: i32,
        next_attempt_at: DateTime<Utc>,
        last_error: String,
    ) -> Result<bool>;

    async fn mark_requires_approval(
        &self,
        transfer_id: Uuid,
        worker_id: String,
        retry_count: i32,
        last_error: String,
    ) -> Result<bool>;

    /// `REQUIRES_APPROVAL -> RETRY_SCHEDULED`; `None` when the row is not awaiting approval
    /// or the meeting's payment was reversed.
    async fn approve(
        &self,
        transfer_id: Uuid,
        approved_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<PaymentTransferEntity>>;

    /// `REQUIRES_APPROVAL -> CANCELLED`; `None` when the row is not awaiting approval.
    async fn cancel(&self, transfer_id: Uuid) -> Result<Option<PaymentTransferEntity>>;
}
