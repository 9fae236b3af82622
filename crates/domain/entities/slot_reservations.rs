use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::{
        enums::reservation_statuses::ReservationStatus, reservations::GuestContact,
        time_windows::TimeWindow,
    },
    infra::db::postgres::schema::slot_reservations,
};

#[derive(Debug, Clone, PartialEq)]
pub struct SlotReservationEntity {
    pub id: Uuid,
    pub expert_id: Uuid,
    pub event_id: Uuid,
    pub guest: GuestContact,
    pub window: TimeWindow,
    pub status: ReservationStatus,
    pub expires_at: DateTime<Utc>,
    pub payment_intent_ref: Option<String>,
    pub meeting_id: Option<Uuid>,
    pub first_reminder_sent_at: Option<DateTime<Utc>>,
    pub second_reminder_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Raw row; status stays text until converted into [`SlotReservationEntity`].
#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = slot_reservations)]
pub struct SlotReservationRow {
    pub id: Uuid,
    pub expert_id: Uuid,
    pub event_id: Uuid,
    pub guest_account_id: Option<Uuid>,
    pub guest_name: String,
    pub guest_email: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: String,
    pub expires_at: DateTime<Utc>,
    pub payment_intent_ref: Option<String>,
    pub meeting_id: Option<Uuid>,
    pub first_reminder_sent_at: Option<DateTime<Utc>>,
    pub second_reminder_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<SlotReservationRow> for SlotReservationEntity {
    type Error = anyhow::Error;

    fn try_from(value: SlotReservationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id,
            expert_id: value.expert_id,
            event_id: value.event_id,
            guest: GuestContact {
                account_id: value.guest_account_id,
                name: value.guest_name,
                email: value.guest_email,
            },
            window: TimeWindow::new(value.start_time, value.end_time)?,
            status: ReservationStatus::try_from(value.status.as_str())?,
            expires_at: value.expires_at,
            payment_intent_ref: value.payment_intent_ref,
            meeting_id: value.meeting_id,
            first_reminder_sent_at: value.first_reminder_sent_at,
            second_reminder_sent_at: value.second_reminder_sent_at,
            created_at: value.created_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = slot_reservations)]
pub struct InsertSlotReservationEntity {
    pub expert_id: Uuid,
    pub event_id: Uuid,
    pub guest_account_id: Option<Uuid>,
    pub guest_name: String,
    pub guest_email: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: String,
    pub expires_at: DateTime<Utc>,
}

impl InsertSlotReservationEntity {
    pub fn pending(
        expert_id: Uuid,
        event_id: Uuid,
        window: TimeWindow,
        guest: GuestContact,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            expert_id,
            event_id,
            guest_account_id: guest.account_id,
            guest_name: guest.name,
            guest_email: guest.email,
            start_time: window.start(),
            end_time: window.end(),
            status: ReservationStatus::Pending.to_string(),
            expires_at,
        }
    }

    pub fn window(&self) -> anyhow::Result<TimeWindow> {
        TimeWindow::new(self.start_time, self.end_time)
    }
}
