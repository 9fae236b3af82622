use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::meetings::{InsertMeetingEntity, MeetingEntity},
    value_objects::{
        enums::{
            commission_statuses::CommissionStatus, meeting_payment_statuses::MeetingPaymentStatus,
        },
        meetings::{ConfirmationOutcome, PaymentReversal},
    },
};

#[automock]
#[async_trait]
pub trait MeetingRepository {
    /// Inserts the meeting keyed by its payment intent and links the originating
    /// hold in the same transaction. A repeated payment intent returns the
    /// existing meeting.
    async fn confirm(&self, meeting: InsertMeetingEntity) -> Result<ConfirmationOutcome>;

    async fn find_by_id(&self, meeting_id: Uuid) -> Result<Option<MeetingEntity>>;

    async fn find_by_payment_intent(&self, payment_intent_id: String)
    -> Result<Option<MeetingEntity>>;

    /// Records a refund or dispute in one transaction: the meeting's payment
    /// status, the commission status, and a hold on any payout that has not
    /// started yet. `None` when no meeting carries the payment intent.
    async fn reverse_payment(
        &self,
        payment_intent_id: String,
        payment_status: MeetingPaymentStatus,
        commission_status: CommissionStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<PaymentReversal>>;

    /// Paid meetings still missing a commission snapshot or a transfer.
    async fn list_unsettled(&self, limit: i64) -> Result<Vec<MeetingEntity>>;
}
