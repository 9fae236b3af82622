use std::sync::Arc;

use crates::{
    domain::{
        repositories::{
            commission_transactions::CommissionTransactionRepository, meetings::MeetingRepository,
            payment_transfers::PaymentTransferRepository, plan_rates::PlanRateRepository,
            subscription_plans::SubscriptionPlanRepository,
        },
        value_objects::{
            enums::{
                commission_statuses::CommissionStatus,
                meeting_payment_statuses::MeetingPaymentStatus, transfer_statuses::TransferStatus,
            },
            meetings::ConfirmBookingModel,
        },
    },
    payments::gateway::{GatewayEvent, PaymentGateway},
};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{
    booking_confirmation::{BookingConfirmationUseCase, ConfirmationError},
    settlement::SettlementUseCase,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum WebhookOutcome {
    Confirmed { meeting_id: Uuid },
    Reversed { meeting_id: Option<Uuid> },
    Ignored,
}

pub struct PaymentWebhookUseCase<G, M, P, R, C, T>
where
    G: PaymentGateway + 'static,
    M: MeetingRepository + Send + Sync + 'static,
    P: SubscriptionPlanRepository + Send + Sync + 'static,
    R: PlanRateRepository + Send + Sync + 'static,
    C: CommissionTransactionRepository + Send + Sync + 'static,
    T: PaymentTransferRepository + Send + Sync + 'static,
{
    gateway: Arc<G>,
    meeting_repo: Arc<M>,
    confirmation: Arc<BookingConfirmationUseCase<M>>,
    settlement: Arc<SettlementUseCase<P, R, C, T>>,
}

impl<G, M, P, R, C, T> PaymentWebhookUseCase<G, M, P, R, C, T>
where
    G: PaymentGateway + 'static,
    M: MeetingRepository + Send + Sync + 'static,
    P: SubscriptionPlanRepository + Send + Sync + 'static,
    R: PlanRateRepository + Send + Sync + 'static,
    C: CommissionTransactionRepository + Send + Sync + 'static,
    T: PaymentTransferRepository + Send + Sync + 'static,
{
    pub fn new(
        gateway: Arc<G>,
        meeting_repo: Arc<M>,
        confirmation: Arc<BookingConfirmationUseCase<M>>,
        settlement: Arc<SettlementUseCase<P, R, C, T>>,
    ) -> Self {
        Self {
            gateway,
            meeting_repo,
            confirmation,
            settlement,
        }
    }

    /// Verifies and applies one gateway delivery. Only signature, payload and store failures
    /// are reported back; settlement problems are left for the backfill worker.
    pub async fn handle(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<WebhookOutcome, ConfirmationError> {
        let event = self
            .gateway
            .parse_webhook(payload, signature_header)
            .map_err(|err| ConfirmationError::InvalidWebhook(err.to_string()))?;

        match event {
            GatewayEvent::PaymentSucceeded(payment) => {
                let model = ConfirmBookingModel::from_payment(&payment).map_err(|err| {
                    error!(
                        payment_intent_id = %payment.payment_intent_id,
                        error = %err,
                        "payment_webhook: succeeded payment carries unusable booking metadata"
                    );
                    ConfirmationError::InvalidWebhook(err.to_string())
                })?;
                let meeting = self.confirmation.confirm(model).await?;

                if let Err(err) = self.settlement.settle(&meeting).await {
                    warn!(
                        meeting_id = %meeting.id,
                        error = ?err,
                        "payment_webhook: settlement deferred to backfill"
                    );
                }

                Ok(WebhookOutcome::Confirmed {
                    meeting_id: meeting.id,
                })
            }
            GatewayEvent::ChargeRefunded { payment_intent_id } => {
                self.reverse(
                    payment_intent_id,
                    MeetingPaymentStatus::Refunded,
                    CommissionStatus::Refunded,
                )
                .await
            }
            GatewayEvent::DisputeCreated { payment_intent_id } => {
                self.reverse(
                    payment_intent_id,
                    MeetingPaymentStatus::Disputed,
                    CommissionStatus::Disputed,
                )
                .await
            }
            GatewayEvent::Ignored { event_type } => {
                debug!(%event_type, "payment_webhook: event ignored");
                Ok(WebhookOutcome::Ignored)
            }
        }
    }

    async fn reverse(
        &self,
        payment_intent_id: String,
        payment_status: MeetingPaymentStatus,
        commission_status: CommissionStatus,
    ) -> Result<WebhookOutcome, ConfirmationError> {
        let Some(reversal) = self
            .meeting_repo
            .reverse_payment(
                payment_intent_id.clone(),
                payment_status,
                commission_status,
                Utc::now(),
            )
            .await?
        else {
            warn!(
                %payment_intent_id,
                %payment_status,
                "payment_webhook: reversal for unknown payment intent"
            );
            return Ok(WebhookOutcome::Reversed { meeting_id: None });
        };
        let meeting_id = reversal.meeting.id;

        if !reversal.commission_updated {
            warn!(
                %meeting_id,
                %commission_status,
                "payment_webhook: commission missing or already terminal"
            );
        }

        match reversal.transfer {
            Some(transfer) if transfer.held => warn!(
                %meeting_id,
                transfer_id = %transfer.transfer_id,
                %payment_status,
                "payment_webhook: payout held for approval"
            ),
            Some(transfer) if transfer.status == TransferStatus::Succeeded => error!(
                %meeting_id,
                transfer_id = %transfer.transfer_id,
                %payment_status,
                "payment_webhook: payout was already sent for a reversed payment"
            ),
            Some(transfer) if transfer.status == TransferStatus::Processing => warn!(
                %meeting_id,
                transfer_id = %transfer.transfer_id,
                "payment_webhook: payout in flight during reversal"
            ),
            _ => {}
        }

        info!(%meeting_id, %payment_status, "payment_webhook: payment reversed");

        Ok(WebhookOutcome::Reversed {
            meeting_id: Some(meeting_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use crates::{
        domain::{
            entities::meetings::{InsertMeetingEntity, MeetingEntity},
            repositories::{
                commission_transactions::MockCommissionTransactionRepository,
                meetings::MockMeetingRepository,
                notifications::MockNotificationDispatcher,
                payment_transfers::MockPaymentTransferRepository,
                plan_rates::MockPlanRateRepository,
                subscription_plans::MockSubscriptionPlanRepository,
            },
            value_objects::{
                meetings::{
                    ConfirmationOutcome, PaymentReversal, ReservationLink, ReversedTransfer,
                    metadata_keys,
                },
                reservations::GuestContact,
                time_windows::TimeWindow,
            },
        },
        payments::gateway::{MockPaymentGateway, SucceededPayment},
    };
    use std::collections::HashMap;

    use crate::usecases::{
        commissions::CommissionUseCase, payment_transfers::TransferScheduler,
        plan_rates::PlanRateCache,
    };

    type TestWebhook = PaymentWebhookUseCase<
        MockPaymentGateway,
        MockMeetingRepository,
        MockSubscriptionPlanRepository,
        MockPlanRateRepository,
        MockCommissionTransactionRepository,
        MockPaymentTransferRepository,
    >;

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

    fn succeeded(payment_intent_id: &str) -> SucceededPayment {
        let start = Utc.with_ymd_and_hms(2025, 3, 14, 10, 0, 0).unwrap();
        SucceededPayment {
            payment_intent_id: payment_intent_id.to_string(),
            amount_minor: 10_000,
            currency: "usd".to_string(),
            metadata: HashMap::from([
                (metadata_keys::EXPERT_ID.to_string(), Uuid::new_v4().to_string()),
                (metadata_keys::START_TIME.to_string(), start.to_rfc3339()),
                (
                    metadata_keys::END_TIME.to_string(),
                    (start + Duration::minutes(30)).to_rfc3339(),
                ),
                (metadata_keys::GUEST_EMAIL.to_string(), "guest@example.com".to_string()),
            ]),
        }
    }

    fn webhook(
        gateway: MockPaymentGateway,
        meetings: MockMeetingRepository,
        commissions: MockCommissionTransactionRepository,
        notifier: MockNotificationDispatcher,
    ) -> TestWebhook {
        let meetings = Arc::new(meetings);
        let commissions = Arc::new(commissions);

        // Settlement fails on purpose: it must not turn the delivery into an error.
        let mut plans = MockSubscriptionPlanRepository::new();
        plans
            .expect_find_active()
            .returning(|_| Err(anyhow::anyhow!("plans unavailable")));
        let rates = Arc::new(PlanRateCache::new(
            Arc::new(MockPlanRateRepository::new()),
            std::time::Duration::from_secs(60),
        ));
        let settlement = Arc::new(SettlementUseCase::new(
            Arc::new(CommissionUseCase::new(
                Arc::new(plans),
                rates,
                Arc::clone(&commissions),
            )),
            Arc::new(TransferScheduler::new(
                Arc::new(MockPaymentTransferRepository::new()),
                Duration::hours(24),
            )),
        ));

        PaymentWebhookUseCase::new(
            Arc::new(gateway),
            Arc::clone(&meetings),
            Arc::new(BookingConfirmationUseCase::new(meetings, Arc::new(notifier))),
            settlement,
        )
    }

    #[tokio::test]
    async fn redelivered_success_confirms_one_meeting() {
        let mut gateway = MockPaymentGateway::new();
        let payment = succeeded("pi_123");
        gateway
            .expect_parse_webhook()
            .times(2)
            .returning(move |_, _| Ok(GatewayEvent::PaymentSucceeded(payment.clone())));

        let mut meetings = MockMeetingRepository::new();
        let mut seq = mockall::Sequence::new();
        let first_meeting: Arc<std::sync::Mutex<Option<MeetingEntity>>> = Default::default();
        let created = Arc::clone(&first_meeting);
        meetings
            .expect_confirm()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |insert| {
                let meeting = meeting_from(&insert);
                *created.lock().unwrap() = Some(meeting.clone());
                Ok(ConfirmationOutcome::Created {
                    meeting,
                    reservation: ReservationLink::ExpiredOrMissing,
                })
            });
        let existing = Arc::clone(&first_meeting);
        meetings
            .expect_confirm()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|insert| insert.payment_intent_id == "pi_123")
            .returning(move |_| {
                Ok(ConfirmationOutcome::AlreadyConfirmed(
                    existing.lock().unwrap().clone().unwrap(),
                ))
            });

        let mut commissions = MockCommissionTransactionRepository::new();
        commissions.expect_find_by_meeting().returning(|_| Ok(None));
        let mut notifier = MockNotificationDispatcher::new();
        notifier.expect_trigger().times(1).return_const(());

        let usecase = webhook(gateway, meetings, commissions, notifier);
        let first = usecase.handle(b"{}", "t=1,v1=sig").await.unwrap();
        let second = usecase.handle(b"{}", "t=1,v1=sig").await.unwrap();

        assert_eq!(first, second);
        assert!(matches!(first, WebhookOutcome::Confirmed { .. }));
    }

    #[tokio::test]
    async fn bad_signature_is_rejected_without_writes() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_parse_webhook()
            .returning(|_, _| Err(anyhow::anyhow!("signature mismatch")));
        let mut meetings = MockMeetingRepository::new();
        meetings.expect_confirm().never();

        let result = webhook(
            gateway,
            meetings,
            MockCommissionTransactionRepository::new(),
            MockNotificationDispatcher::new(),
        )
        .handle(b"{}", "t=1,v1=bad")
        .await;

        assert!(matches!(result, Err(ConfirmationError::InvalidWebhook(_))));
    }

    fn reversed_meeting(payment_status: MeetingPaymentStatus) -> MeetingEntity {
        let mut meeting = meeting_from(&InsertMeetingEntity::from(
            &ConfirmBookingModel::from_payment(&succeeded("pi_9")).unwrap(),
        ));
        meeting.payment_status = payment_status;
        meeting
    }

    #[tokio::test]
    async fn refund_reverses_commission_and_holds_the_payout() {
        let meeting = reversed_meeting(MeetingPaymentStatus::Refunded);
        let meeting_id = meeting.id;
        let transfer_id = Uuid::new_v4();

        let mut gateway = MockPaymentGateway::new();
        gateway.expect_parse_webhook().returning(|_, _| {
            Ok(GatewayEvent::ChargeRefunded {
                payment_intent_id: "pi_9".to_string(),
            })
        });
        let mut meetings = MockMeetingRepository::new();
        meetings
            .expect_reverse_payment()
            .withf(|payment_intent_id, payment_status, commission_status, _| {
                payment_intent_id == "pi_9"
                    && *payment_status == MeetingPaymentStatus::Refunded
                    && *commission_status == CommissionStatus::Refunded
            })
            .times(1)
            .returning(move |_, _, _, _| {
                Ok(Some(PaymentReversal {
                    meeting: meeting.clone(),
                    commission_updated: true,
                    transfer: Some(ReversedTransfer {
                        transfer_id,
                        status: TransferStatus::RequiresApproval,
                        held: true,
                    }),
                }))
            });

        let outcome = webhook(
            gateway,
            meetings,
            MockCommissionTransactionRepository::new(),
            MockNotificationDispatcher::new(),
        )
        .handle(b"{}", "t=1,v1=sig")
        .await
        .unwrap();

        assert_eq!(
            outcome,
            WebhookOutcome::Reversed {
                meeting_id: Some(meeting_id)
            }
        );
    }

    #[tokio::test]
    async fn dispute_after_payout_is_still_recorded() {
        let meeting = reversed_meeting(MeetingPaymentStatus::Disputed);
        let meeting_id = meeting.id;

        let mut gateway = MockPaymentGateway::new();
        gateway.expect_parse_webhook().returning(|_, _| {
            Ok(GatewayEvent::DisputeCreated {
                payment_intent_id: "pi_9".to_string(),
            })
        });
        let mut meetings = MockMeetingRepository::new();
        meetings
            .expect_reverse_payment()
            .withf(|_, payment_status, commission_status, _| {
                *payment_status == MeetingPaymentStatus::Disputed
                    && *commission_status == CommissionStatus::Disputed
            })
            .times(1)
            .returning(move |_, _, _, _| {
                Ok(Some(PaymentReversal {
                    meeting: meeting.clone(),
                    commission_updated: true,
                    transfer: Some(ReversedTransfer {
                        transfer_id: Uuid::new_v4(),
                        status: TransferStatus::Succeeded,
                        held: false,
                    }),
                }))
            });

        let outcome = webhook(
            gateway,
            meetings,
            MockCommissionTransactionRepository::new(),
            MockNotificationDispatcher::new(),
        )
        .handle(b"{}", "t=1,v1=sig")
        .await
        .unwrap();

        assert_eq!(
            outcome,
            WebhookOutcome::Reversed {
                meeting_id: Some(meeting_id)
            }
        );
    }

    #[tokio::test]
    async fn reversal_for_unknown_payment_is_acknowledged() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_parse_webhook().returning(|_, _| {
            Ok(GatewayEvent::ChargeRefunded {
                payment_intent_id: "pi_missing".to_string(),
            })
        });
        let mut meetings = MockMeetingRepository::new();
        meetings
            .expect_reverse_payment()
            .times(1)
            .returning(|_, _, _, _| Ok(None));

        let outcome = webhook(
            gateway,
            meetings,
            MockCommissionTransactionRepository::new(),
            MockNotificationDispatcher::new(),
        )
        .handle(b"{}", "t=1,v1=sig")
        .await
        .unwrap();

        assert_eq!(outcome, WebhookOutcome::Reversed { meeting_id: None });
    }

    #[tokio::test]
    async fn unrelated_events_are_acknowledged() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_parse_webhook().returning(|_, _| {
            Ok(GatewayEvent::Ignored {
                event_type: "customer.created".to_string(),
            })
        });

        let outcome = webhook(
            gateway,
            MockMeetingRepository::new(),
            MockCommissionTransactionRepository::new(),
            MockNotificationDispatcher::new(),
        )
        .handle(b"{}", "t=1,v1=sig")
        .await
        .unwrap();

        assert_eq!(outcome, WebhookOutcome::Ignored);
    }
}
