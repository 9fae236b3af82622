use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::reservation_statuses::ReservationStatus;
use crate::domain::entities::slot_reservations::SlotReservationEntity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestContact {
    pub account_id: Option<Uuid>,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReserveSlotModel {
    pub expert_id: Uuid,
    pub event_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub guest_name: String,
    pub guest_email: Option<String>,
}

/// Reminder tiers for holds that are about to lapse without payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderTier {
    First,
    Second,
}

impl ReminderTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderTier::First => "first",
            ReminderTier::Second => "second",
        }
    }
}

/// Result of the serializable overlap check plus insert.
#[derive(Debug, Clone, PartialEq)]
pub enum ReserveSlotOutcome {
    Reserved(SlotReservationEntity),
    Conflict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReservationOutcome {
    Cancelled,
    /// Already cancelled, confirmed or expired; nothing was written.
    Unchanged(ReservationStatus),
}

#[derive(Debug, Clone, Serialize)]
pub struct ReservationDto {
    pub id: Uuid,
    pub expert_id: Uuid,
    pub event_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: ReservationStatus,
    pub expires_at: DateTime<Utc>,
    pub payment_intent_ref: Option<String>,
    pub meeting_id: Option<Uuid>,
}

impl From<SlotReservationEntity> for ReservationDto {
    fn from(value: SlotReservationEntity) -> Self {
        Self {
            id: value.id,
            expert_id: value.expert_id,
            event_id: value.event_id,
            start_time: value.window.start(),
            end_time: value.window.end(),
            status: value.status,
            expires_at: value.expires_at,
            payment_intent_ref: value.payment_intent_ref,
            meeting_id: value.meeting_id,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentIntentDto {
    pub reservation_id: Uuid,
    pub payment_intent_id: String,
    pub client_secret: Option<String>,
    pub amount_minor: i64,
    pub currency: String,
}
