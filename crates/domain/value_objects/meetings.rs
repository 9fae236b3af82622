use std::collections::HashMap;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{
    enums::{meeting_payment_statuses::MeetingPaymentStatus, transfer_statuses::TransferStatus},
    reservations::GuestContact,
    time_windows::TimeWindow,
};
use crate::{
    domain::entities::{meetings::MeetingEntity, slot_reservations::SlotReservationEntity},
    payments::gateway::SucceededPayment,
};

/// Keys stamped on a payment intent so the success webhook can rebuild the booking.
pub mod metadata_keys {
    pub const RESERVATION_ID: &str = "reservation_id";
    pub const EVENT_ID: &str = "event_id";
    pub const EXPERT_ID: &str = "expert_id";
    pub const START_TIME: &str = "start_time";
    pub const END_TIME: &str = "end_time";
    pub const GUEST_ACCOUNT_ID: &str = "guest_account_id";
    pub const GUEST_NAME: &str = "guest_name";
    pub const GUEST_EMAIL: &str = "guest_email";
}

/// Everything the payment gateway tells us about a captured booking payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmBookingModel {
    pub payment_intent_id: String,
    pub window: TimeWindow,
    pub expert_id: Uuid,
    pub guest: GuestContact,
    pub amount_minor: i64,
    pub currency: String,
    pub reservation_id: Option<Uuid>,
    pub event_id: Option<Uuid>,
}

impl ConfirmBookingModel {
    /// Rebuilds the booking from a captured payment. Expert, window and guest email are required;
    /// reservation and event ids are optional.
    pub fn from_payment(payment: &SucceededPayment) -> Result<Self> {
        let meta = &payment.metadata;
        let required = |key: &str| {
            meta.get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .with_context(|| format!("payment metadata is missing {key}"))
        };
        let optional_uuid = |key: &str| -> Result<Option<Uuid>> {
            match meta.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
                Some(raw) => Ok(Some(
                    Uuid::parse_str(raw).with_context(|| format!("invalid {key}"))?,
                )),
                None => Ok(None),
            }
        };

        if payment.amount_minor < 0 {
            bail!("payment amount must not be negative");
        }

        let expert_id =
            Uuid::parse_str(required(metadata_keys::EXPERT_ID)?).context("invalid expert_id")?;
        let start = DateTime::parse_from_rfc3339(required(metadata_keys::START_TIME)?)
            .context("invalid start_time")?
            .with_timezone(&Utc);
        let end = DateTime::parse_from_rfc3339(required(metadata_keys::END_TIME)?)
            .context("invalid end_time")?
            .with_timezone(&Utc);

        Ok(Self {
            payment_intent_id: payment.payment_intent_id.clone(),
            window: TimeWindow::new(start, end)?,
            expert_id,
            guest: GuestContact {
                account_id: optional_uuid(metadata_keys::GUEST_ACCOUNT_ID)?,
                name: meta
                    .get(metadata_keys::GUEST_NAME)
                    .cloned()
                    .unwrap_or_default(),
                email: required(metadata_keys::GUEST_EMAIL)?.to_string(),
            },
            amount_minor: payment.amount_minor,
            currency: payment.currency.clone(),
            reservation_id: optional_uuid(metadata_keys::RESERVATION_ID)?,
            event_id: optional_uuid(metadata_keys::EVENT_ID)?,
        })
    }
}

pub fn booking_metadata(reservation: &SlotReservationEntity) -> HashMap<String, String> {
    let mut meta = HashMap::from([
        (metadata_keys::RESERVATION_ID.to_string(), reservation.id.to_string()),
        (metadata_keys::EVENT_ID.to_string(), reservation.event_id.to_string()),
        (metadata_keys::EXPERT_ID.to_string(), reservation.expert_id.to_string()),
        (
            metadata_keys::START_TIME.to_string(),
            reservation.window.start().to_rfc3339(),
        ),
        (
            metadata_keys::END_TIME.to_string(),
            reservation.window.end().to_rfc3339(),
        ),
        (metadata_keys::GUEST_NAME.to_string(), reservation.guest.name.clone()),
        (metadata_keys::GUEST_EMAIL.to_string(), reservation.guest.email.clone()),
    ]);
    if let Some(account_id) = reservation.guest.account_id {
        meta.insert(
            metadata_keys::GUEST_ACCOUNT_ID.to_string(),
            account_id.to_string(),
        );
    }
    meta
}

/// How the originating hold was found when the meeting was first inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationLink {
    Confirmed(Uuid),
    ExpiredOrMissing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmationOutcome {
    Created {
        meeting: MeetingEntity,
        reservation: ReservationLink,
    },
    /// The payment intent was already confirmed by an earlier delivery.
    AlreadyConfirmed(MeetingEntity),
}

/// The meeting's payout as it stands after a refund or dispute was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReversedTransfer {
    pub transfer_id: Uuid,
    pub status: TransferStatus,
    /// The reversal itself moved the payout to `RequiresApproval`.
    pub held: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentReversal {
    pub meeting: MeetingEntity,
    pub commission_updated: bool,
    pub transfer: Option<ReversedTransfer>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeetingDto {
    pub id: Uuid,
    pub expert_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub amount_minor: i64,
    pub currency: String,
    pub payment_intent_id: String,
    pub payment_status: MeetingPaymentStatus,
}

impl From<MeetingEntity> for MeetingDto {
    fn from(value: MeetingEntity) -> Self {
        Self {
            id: value.id,
            expert_id: value.expert_id,
            start_time: value.window.start(),
            end_time: value.window.end(),
            amount_minor: value.amount_minor,
            currency: value.currency,
            payment_intent_id: value.payment_intent_id,
            payment_status: value.payment_status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::enums::reservation_statuses::ReservationStatus;
    use chrono::TimeZone;

    fn reservation() -> SlotReservationEntity {
        let start = Utc.with_ymd_and_hms(2025, 4, 2, 10, 0, 0).unwrap();
        SlotReservationEntity {
            id: Uuid::new_v4(),
            expert_id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            guest: GuestContact {
                account_id: None,
                name: "Mina".to_string(),
                email: "mina@example.com".to_string(),
            },
            window: TimeWindow::new(start, start + chrono::Duration::minutes(30)).unwrap(),
            status: ReservationStatus::Pending,
            expires_at: start - chrono::Duration::hours(1),
            payment_intent_ref: None,
            meeting_id: None,
            first_reminder_sent_at: None,
            second_reminder_sent_at: None,
            created_at: start - chrono::Duration::hours(2),
        }
    }

    #[test]
    fn payment_metadata_rebuilds_the_booking() {
        let reservation = reservation();
        let payment = SucceededPayment {
            payment_intent_id: "pi_123".to_string(),
            amount_minor: 10_000,
            currency: "usd".to_string(),
            metadata: booking_metadata(&reservation),
        };

        let model = ConfirmBookingModel::from_payment(&payment).unwrap();
        assert_eq!(model.reservation_id, Some(reservation.id));
        assert_eq!(model.event_id, Some(reservation.event_id));
        assert_eq!(model.expert_id, reservation.expert_id);
        assert_eq!(model.window, reservation.window);
        assert_eq!(model.guest, reservation.guest);
        assert_eq!(model.amount_minor, 10_000);
    }

    #[test]
    fn payment_without_expert_or_window_is_rejected() {
        let mut metadata = booking_metadata(&reservation());
        metadata.remove(metadata_keys::START_TIME);
        let payment = SucceededPayment {
            payment_intent_id: "pi_456".to_string(),
            amount_minor: 5_000,
            currency: "usd".to_string(),
            metadata,
        };

        assert!(ConfirmBookingModel::from_payment(&payment).is_err());
    }
}
