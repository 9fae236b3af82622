use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::{
        enums::meeting_payment_statuses::MeetingPaymentStatus, meetings::ConfirmBookingModel,
        reservations::GuestContact, time_windows::TimeWindow,
    },
    infra::db::postgres::schema::meetings,
};

/// A paid, permanent appointment. Window and parties never change after insert.
#[derive(Debug, Clone, PartialEq)]
pub struct MeetingEntity {
    pub id: Uuid,
    pub reservation_id: Option<Uuid>,
    pub event_id: Option<Uuid>,
    pub expert_id: Uuid,
    pub guest: GuestContact,
    pub window: TimeWindow,
    pub amount_minor: i64,
    pub currency: String,
    pub payment_intent_id: String,
    pub payment_status: MeetingPaymentStatus,
    pub transfer_ref: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = meetings)]
pub struct MeetingRow {
    pub id: Uuid,
    pub reservation_id: Option<Uuid>,
    pub event_id: Option<Uuid>,
    pub expert_id: Uuid,
    pub guest_account_id: Option<Uuid>,
    pub guest_name: String,
    pub guest_email: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub amount_minor: i64,
    pub currency: String,
    pub payment_intent_id: String,
    pub payment_status: String,
    pub transfer_ref: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<MeetingRow> for MeetingEntity {
    type Error = anyhow::Error;

    fn try_from(value: MeetingRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id,
            reservation_id: value.reservation_id,
            event_id: value.event_id,
            expert_id: value.expert_id,
            guest: GuestContact {
                account_id: value.guest_account_id,
                name: value.guest_name,
                email: value.guest_email,
            },
            window: TimeWindow::new(value.start_time, value.end_time)?,
            amount_minor: value.amount_minor,
            currency: value.currency,
            payment_intent_id: value.payment_intent_id,
            payment_status: MeetingPaymentStatus::try_from(value.payment_status.as_str())?,
            transfer_ref: value.transfer_ref,
            created_at: value.created_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = meetings)]
pub struct InsertMeetingEntity {
    pub reservation_id: Option<Uuid>,
    pub event_id: Option<Uuid>,
    pub expert_id: Uuid,
    pub guest_account_id: Option<Uuid>,
    pub guest_name: String,
    pub guest_email: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub amount_minor: i64,
    pub currency: String,
    pub payment_intent_id: String,
    pub payment_status: String,
}

impl From<&ConfirmBookingModel> for InsertMeetingEntity {
    fn from(value: &ConfirmBookingModel) -> Self {
        Self {
            reservation_id: value.reservation_id,
            event_id: value.event_id,
            expert_id: value.expert_id,
            guest_account_id: value.guest.account_id,
            guest_name: value.guest.name.clone(),
            guest_email: value.guest.email.clone(),
            start_time: value.window.start(),
            end_time: value.window.end(),
            amount_minor: value.amount_minor,
            currency: value.currency.clone(),
            payment_intent_id: value.payment_intent_id.clone(),
            payment_status: MeetingPaymentStatus::Succeeded.to_string(),
        }
    }
}
