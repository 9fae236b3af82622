use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use uuid::Uuid;

use super::reservations::ReminderTier;

/// Domain events handed to the notification dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationEvent {
    PaymentReminder {
        reservation_id: Uuid,
        expert_id: Uuid,
        guest_email: String,
        tier: ReminderTier,
        expires_at: DateTime<Utc>,
    },
    MeetingConfirmed {
        meeting_id: Uuid,
        expert_id: Uuid,
        guest_email: String,
        start_time: DateTime<Utc>,
    },
    TransferRequiresApproval {
        transfer_id: Uuid,
        meeting_id: Uuid,
        expert_id: Uuid,
        retry_count: i32,
        reason: String,
    },
    EligibleForUpgrade {
        expert_id: Uuid,
        average_monthly_revenue_minor: i64,
        months_active: i32,
    },
}

impl NotificationEvent {
    pub fn name(&self) -> &'static str {
        match self {
            NotificationEvent::PaymentReminder { .. } => "reservation.payment_reminder",
            NotificationEvent::MeetingConfirmed { .. } => "meeting.confirmed",
            NotificationEvent::TransferRequiresApproval { .. } => "transfer.requires_approval",
            NotificationEvent::EligibleForUpgrade { .. } => "expert.eligible_for_upgrade",
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            NotificationEvent::PaymentReminder {
                reservation_id,
                expert_id,
                guest_email,
                tier,
                expires_at,
            } => json!({
                "reservation_id": reservation_id,
                "expert_id": expert_id,
                "guest_email": guest_email,
                "tier": tier.as_str(),
                "expires_at": expires_at,
            }),
            NotificationEvent::MeetingConfirmed {
                meeting_id,
                expert_id,
                guest_email,
                start_time,
            } => json!({
                "meeting_id": meeting_id,
                "expert_id": expert_id,
                "guest_email": guest_email,
                "start_time": start_time,
            }),
            NotificationEvent::TransferRequiresApproval {
                transfer_id,
                meeting_id,
                expert_id,
                retry_count,
                reason,
            } => json!({
                "transfer_id": transfer_id,
                "meeting_id": meeting_id,
                "expert_id": expert_id,
                "retry_count": retry_count,
                "reason": reason,
            }),
            NotificationEvent::EligibleForUpgrade {
                expert_id,
                average_monthly_revenue_minor,
                months_active,
            } => json!({
                "expert_id": expert_id,
                "average_monthly_revenue_minor": average_monthly_revenue_minor,
                "months_active": months_active,
            }),
        }
    }
}
