use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::slot_reservations::{InsertSlotReservationEntity, SlotReservationEntity},
    value_objects::reservations::{CancelReservationOutcome, ReminderTier, ReserveSlotOutcome},
};

#[automock]
#[async_trait]
pub trait SlotReservationRepository {
    /// Checks overlap against pending holds and meetings and inserts in one
    /// serializable transaction. No row is written on conflict.
    async fn reserve(&self, reservation: InsertSlotReservationEntity) -> Result<ReserveSlotOutcome>;

    async fn find_by_id(&self, reservation_id: Uuid) -> Result<Option<SlotReservationEntity>>;

    /// Pending becomes cancelled; any other status is left as is.
    async fn cancel(&self, reservation_id: Uuid) -> Result<CancelReservationOutcome>;

    async fn attach_payment_intent(
        &self,
        reservation_id: Uuid,
        payment_intent_ref: String,
    ) -> Result<bool>;

    /// Expires one batch of pending holds with `expires_at < now`, returning their ids.
    async fn expire_stale_batch(&self, now: DateTime<Utc>, batch_size: i64) -> Result<Vec<Uuid>>;

    /// Pending holds that expire within `(now, due_before]` and have not had this reminder yet.
    async fn list_due_for_reminder(
        &self,
        tier: ReminderTier,
        now: DateTime<Utc>,
        due_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<SlotReservationEntity>>;

    /// Writes the reminder timestamp only if it is still unset.
    async fn mark_reminder_sent(
        &self,
        reservation_id: Uuid,
        tier: ReminderTier,
        sent_at: DateTime<Utc>,
    ) -> Result<bool>;
}
