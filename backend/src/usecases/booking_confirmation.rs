use std::sync::Arc;

use crates::domain::{
    entities::meetings::{InsertMeetingEntity, MeetingEntity},
    repositories::{meetings::MeetingRepository, notifications::NotificationDispatcher},
    value_objects::{
        meetings::{ConfirmBookingModel, ConfirmationOutcome, ReservationLink},
        notifications::NotificationEvent,
    },
};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ConfirmationError {
    #[error("invalid webhook payload: {0}")]
    InvalidWebhook(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ConfirmationError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            ConfirmationError::InvalidWebhook(_) => StatusCode::BAD_REQUEST,
            ConfirmationError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Promotes a paid hold into a meeting exactly once per payment intent.
pub struct BookingConfirmationUseCase<M>
where
    M: MeetingRepository + Send + Sync + 'static,
{
    meeting_repo: Arc<M>,
    notifier: Arc<dyn NotificationDispatcher>,
}

impl<M> BookingConfirmationUseCase<M>
where
    M: MeetingRepository + Send + Sync + 'static,
{
    pub fn new(meeting_repo: Arc<M>, notifier: Arc<dyn NotificationDispatcher>) -> Self {
        Self {
            meeting_repo,
            notifier,
        }
    }

    /// Repeated deliveries of the same payment intent return the meeting created by the first one.
    /// A missing or expired hold never blocks confirmation of a captured payment.
    pub async fn confirm(
        &self,
        model: ConfirmBookingModel,
    ) -> Result<MeetingEntity, ConfirmationError> {
        let payment_intent_id = model.payment_intent_id.clone();
        let outcome = self
            .meeting_repo
            .confirm(InsertMeetingEntity::from(&model))
            .await?;

        match outcome {
            ConfirmationOutcome::Created {
                meeting,
                reservation,
            } => {
                match reservation {
                    ReservationLink::Confirmed(reservation_id) => info!(
                        meeting_id = %meeting.id,
                        %reservation_id,
                        %payment_intent_id,
                        "booking_confirmation: meeting created"
                    ),
                    ReservationLink::ExpiredOrMissing => warn!(
                        meeting_id = %meeting.id,
                        expert_id = %meeting.expert_id,
                        %payment_intent_id,
                        "booking_confirmation: hold expired or missing, meeting created from payment"
                    ),
                }

                self.notifier.trigger(NotificationEvent::MeetingConfirmed {
                    meeting_id: meeting.id,
                    expert_id: meeting.expert_id,
                    guest_email: meeting.guest.email.clone(),
                    start_time: meeting.window.start(),
                });

                Ok(meeting)
            }
            ConfirmationOutcome::AlreadyConfirmed(meeting) => {
                info!(
                    meeting_id = %meeting.id,
                    %payment_intent_id,
                    "booking_confirmation: duplicate delivery, returning existing meeting"
                );
                Ok(meeting)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use crates::domain::{
        repositories::{meetings::MockMeetingRepository, notifications::MockNotificationDispatcher},
        value_objects::{
            enums::meeting_payment_statuses::MeetingPaymentStatus, reservations::GuestContact,
            time_windows::TimeWindow,
        },
    };
    use std::sync::Mutex;
    use uuid::Uuid;

    fn model(payment_intent_id: &str) -> ConfirmBookingModel {
        let start = Utc.with_ymd_and_hms(2025, 3, 14, 10, 0, 0).unwrap();
        ConfirmBookingModel {
            payment_intent_id: payment_intent_id.to_string(),
            window: TimeWindow::new(start, start + Duration::minutes(30)).unwrap(),
            expert_id: Uuid::new_v4(),
            guest: GuestContact {
                account_id: None,
                name: "Guest".to_string(),
                email: "guest@example.com".to_string(),
            },
            amount_minor: 10_000,
            currency: "usd".to_string(),
            reservation_id: Some(Uuid::new_v4()),
            event_id: None,
        }
    }

    fn meeting_from(insert: &InsertMeetingEntity) -> MeetingEntity {
        MeetingEntity {
            id: Uuid::new_v4(),
            reservation_id: insert.reservation_id,
            event_id: insert.event_id,
            expert_id: insert.expert_id,
            guest: GuestContact {
                account_id: insert.guest_account_id,
                name: insert.guest_name.clone(),
                email: insert.guest_email.clone(),
            },
            window: TimeWindow::new(insert.start_time, insert.end_time).unwrap(),
            amount_minor: insert.amount_minor,
            currency: insert.currency.clone(),
            payment_intent_id: insert.payment_intent_id.clone(),
            payment_status: MeetingPaymentStatus::Succeeded,
            transfer_ref: None,
            created_at: Utc::now(),
        }
    }

    // Stands in for the unique payment intent constraint.
    fn idempotent_repo() -> MockMeetingRepository {
        let stored: Arc<Mutex<Vec<MeetingEntity>>> = Arc::new(Mutex::new(Vec::new()));
        let mut repo = MockMeetingRepository::new();
        repo.expect_confirm().returning(move |insert| {
            let mut stored = stored.lock().unwrap();
            if let Some(existing) = stored
                .iter()
                .find(|m| m.payment_intent_id == insert.payment_intent_id)
            {
                return Ok(ConfirmationOutcome::AlreadyConfirmed(existing.clone()));
            }
            let meeting = meeting_from(&insert);
            stored.push(meeting.clone());
            Ok(ConfirmationOutcome::Created {
                reservation: ReservationLink::Confirmed(insert.reservation_id.unwrap()),
                meeting,
            })
        });
        repo
    }

    #[tokio::test]
    async fn duplicate_webhook_yields_one_meeting() {
        let mut notifier = MockNotificationDispatcher::new();
        notifier
            .expect_trigger()
            .withf(|event| matches!(event, NotificationEvent::MeetingConfirmed { .. }))
            .times(1)
            .return_const(());

        let usecase = BookingConfirmationUseCase::new(Arc::new(idempotent_repo()), Arc::new(notifier));
        let model = model("pi_123");

        let first = usecase.confirm(model.clone()).await.unwrap();
        let second = usecase.confirm(model).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.payment_intent_id, "pi_123");
    }

    #[tokio::test]
    async fn expired_hold_still_produces_a_meeting() {
        let mut repo = MockMeetingRepository::new();
        repo.expect_confirm().times(1).returning(|insert| {
            Ok(ConfirmationOutcome::Created {
                meeting: meeting_from(&insert),
                reservation: ReservationLink::ExpiredOrMissing,
            })
        });
        let mut notifier = MockNotificationDispatcher::new();
        notifier.expect_trigger().times(1).return_const(());

        let meeting = BookingConfirmationUseCase::new(Arc::new(repo), Arc::new(notifier))
            .confirm(model("pi_late"))
            .await
            .unwrap();

        assert_eq!(meeting.payment_intent_id, "pi_late");
    }

    #[tokio::test]
    async fn store_failures_surface_as_internal_errors() {
        let mut repo = MockMeetingRepository::new();
        repo.expect_confirm()
            .returning(|_| Err(anyhow::anyhow!("connection reset")));
        let mut notifier = MockNotificationDispatcher::new();
        notifier.expect_trigger().never();

        let result = BookingConfirmationUseCase::new(Arc::new(repo), Arc::new(notifier))
            .confirm(model("pi_err"))
            .await;

        assert!(matches!(result, Err(ConfirmationError::Internal(_))));
    }
}
