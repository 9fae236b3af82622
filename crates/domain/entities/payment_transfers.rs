use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::enums::transfer_statuses::TransferStatus,
    infra::db::postgres::schema::payment_transfers,
};

/// Deferred payout job, one per meeting. Rows are never deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentTransferEntity {
    pub id: Uuid,
    pub meeting_id: Uuid,
    pub expert_id: Uuid,
    pub amount_minor: i64,
    pub currency: String,
    pub meeting_start_time: DateTime<Utc>,
    pub scheduled_transfer_time: DateTime<Utc>,
    pub next_attempt_at: DateTime<Utc>,
    pub status: TransferStatus,
    pub retry_count: i32,
    pub last_error: Option<String>,
    pub gateway_transfer_id: Option<String>,
    pub approved: bool,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub locked_by: Option<String>,
    pub leased_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = payment_transfers)]
pub struct PaymentTransferRow {
    pub id: Uuid,
    pub meeting_id: Uuid,
    pub expert_id: Uuid,
    pub amount_minor: i64,
    pub currency: String,
    pub meeting_start_time: DateTime<Utc>,
    pub scheduled_transfer_time: DateTime<Utc>,
    pub next_attempt_at: DateTime<Utc>,
    pub status: String,
    pub retry_count: i32,
    pub last_error: Option<String>,
    pub gateway_transfer_id: Option<String>,
    pub approved: bool,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub locked_by: Option<String>,
    pub leased_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentTransferRow> for PaymentTransferEntity {
    type Error = anyhow::Error;

    fn try_from(value: PaymentTransferRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id,
            meeting_id: value.meeting_id,
            expert_id: value.expert_id,
            amount_minor: value.amount_minor,
            currency: value.currency,
            meeting_start_time: value.meeting_start_time,
            scheduled_transfer_time: value.scheduled_transfer_time,
            next_attempt_at: value.next_attempt_at,
            status: TransferStatus::try_from(value.status.as_str())?,
            retry_count: value.retry_count,
            last_error: value.last_error,
            gateway_transfer_id: value.gateway_transfer_id,
            approved: value.approved,
            approved_by: value.approved_by,
            approved_at: value.approved_at,
            locked_by: value.locked_by,
            leased_until: value.leased_until,
            created_at: value.created_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Insertable)]
#[diesel(table_name = payment_transfers)]
pub struct InsertPaymentTransferEntity {
    pub meeting_id: Uuid,
    pub expert_id: Uuid,
    pub amount_minor: i64,
    pub currency: String,
    pub meeting_start_time: DateTime<Utc>,
    pub scheduled_transfer_time: DateTime<Utc>,
    pub next_attempt_at: DateTime<Utc>,
    pub status: String,
}
