use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use crates::domain::{
    repositories::{
        notifications::NotificationDispatcher, slot_reservations::SlotReservationRepository,
    },
    value_objects::{notifications::NotificationEvent, reservations::ReminderTier},
};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReminderSummary {
    pub first_sent: usize,
    pub second_sent: usize,
}

pub struct PaymentRemindersUseCase {
    repository: Arc<dyn SlotReservationRepository + Send + Sync>,
    notifier: Arc<dyn NotificationDispatcher>,
    first_lead: Duration,
    second_lead: Duration,
    batch_size: i64,
}

impl PaymentRemindersUseCase {
    pub fn new(
        repository: Arc<dyn SlotReservationRepository + Send + Sync>,
        notifier: Arc<dyn NotificationDispatcher>,
        first_lead: Duration,
        second_lead: Duration,
        batch_size: i64,
    ) -> Self {
        Self {
            repository,
            notifier,
            first_lead,
            second_lead,
            batch_size: batch_size.max(1),
        }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> Result<ReminderSummary> {
        let summary = ReminderSummary {
            first_sent: self.send_tier(ReminderTier::First, self.first_lead, now).await?,
            second_sent: self.send_tier(ReminderTier::Second, self.second_lead, now).await?,
        };

        if summary.first_sent + summary.second_sent > 0 {
            info!(
                first_sent = summary.first_sent,
                second_sent = summary.second_sent,
                "payment_reminders: reminders sent"
            );
        }

        Ok(summary)
    }

    /// The timestamp is claimed before the notification goes out, so a tier fires at most once.
    async fn send_tier(&self, tier: ReminderTier, lead: Duration, now: DateTime<Utc>) -> Result<usize> {
        let due = self
            .repository
            .list_due_for_reminder(tier, now, now + lead, self.batch_size)
            .await?;

        let mut sent = 0;
        for reservation in due {
            match self
                .repository
                .mark_reminder_sent(reservation.id, tier, now)
                .await
            {
                Ok(true) => {
                    self.notifier.trigger(NotificationEvent::PaymentReminder {
                        reservation_id: reservation.id,
                        expert_id: reservation.expert_id,
                        guest_email: reservation.guest.email.clone(),
                        tier,
                        expires_at: reservation.expires_at,
                    });
                    sent += 1;
                }
                Ok(false) => {}
                Err(err) => {
                    error!(
                        reservation_id = %reservation.id,
                        tier = tier.as_str(),
                        error = ?err,
                        "payment_reminders: failed to record reminder"
                    );
                }
            }
        }

        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use crates::domain::{
        entities::slot_reservations::SlotReservationEntity,
        repositories::{
            notifications::MockNotificationDispatcher,
            slot_reservations::MockSlotReservationRepository,
        },
        value_objects::{
            enums::reservation_statuses::ReservationStatus, reservations::GuestContact,
            time_windows::TimeWindow,
        },
    };
    use mockall::predicate::eq;
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap()
    }

    fn hold(expires_in: Duration) -> SlotReservationEntity {
        let start = now() + Duration::hours(2);
        SlotReservationEntity {
            id: Uuid::new_v4(),
            expert_id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            guest: GuestContact {
                account_id: None,
                name: "Guest".to_string(),
                email: "guest@example.com".to_string(),
            },
            window: TimeWindow::new(start, start + Duration::minutes(30)).unwrap(),
            status: ReservationStatus::Pending,
            expires_at: now() + expires_in,
            payment_intent_ref: None,
            meeting_id: None,
            first_reminder_sent_at: None,
            second_reminder_sent_at: None,
            created_at: now() - Duration::minutes(10),
        }
    }

    #[tokio::test]
    async fn reminder_is_sent_only_when_its_timestamp_is_claimed() {
        let claimed = hold(Duration::minutes(4));
        let raced = hold(Duration::minutes(3));
        let claimed_id = claimed.id;
        let raced_id = raced.id;

        let mut repo = MockSlotReservationRepository::new();
        repo.expect_list_due_for_reminder()
            .with(
                eq(ReminderTier::First),
                eq(now()),
                eq(now() + Duration::minutes(5)),
                eq(100),
            )
            .returning(move |_, _, _, _| Ok(vec![claimed.clone(), raced.clone()]));
        repo.expect_list_due_for_reminder()
            .with(eq(ReminderTier::Second), eq(now()), eq(now() + Duration::minutes(1)), eq(100))
            .returning(|_, _, _, _| Ok(vec![]));
        repo.expect_mark_reminder_sent()
            .with(eq(claimed_id), eq(ReminderTier::First), eq(now()))
            .returning(|_, _, _| Ok(true));
        repo.expect_mark_reminder_sent()
            .with(eq(raced_id), eq(ReminderTier::First), eq(now()))
            .returning(|_, _, _| Ok(false));

        let mut notifier = MockNotificationDispatcher::new();
        notifier
            .expect_trigger()
            .withf(move |event| {
                matches!(
                    event,
                    NotificationEvent::PaymentReminder { reservation_id, tier: ReminderTier::First, .. }
                        if *reservation_id == claimed_id
                )
            })
            .times(1)
            .return_const(());

        let summary = PaymentRemindersUseCase::new(
            Arc::new(repo),
            Arc::new(notifier),
            Duration::minutes(5),
            Duration::minutes(1),
            100,
        )
        .run(now())
        .await
        .unwrap();

        assert_eq!(
            summary,
            ReminderSummary {
                first_sent: 1,
                second_sent: 0,
            }
        );
    }
}
