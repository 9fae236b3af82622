use std::sync::Arc;

use anyhow::Result;
use crates::domain::{
    entities::{
        commission_transactions::CommissionTransactionEntity, meetings::MeetingEntity,
        payment_transfers::PaymentTransferEntity,
    },
    repositories::{
        commission_transactions::CommissionTransactionRepository, payment_transfers::PaymentTransferRepository,
        plan_rates::PlanRateRepository, subscription_plans::SubscriptionPlanRepository,
    },
    value_objects::enums::meeting_payment_statuses::MeetingPaymentStatus,
};
use tracing::info;

use super::{commissions::CommissionUseCase, payment_transfers::TransferScheduler};

#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub commission: CommissionTransactionEntity,
    pub transfer: PaymentTransferEntity,
}

/// Commission snapshot followed by payout scheduling. Both steps are idempotent, so a
/// meeting can be settled again after a partial failure.
pub struct SettlementUseCase<P, R, C, T>
where
    P: SubscriptionPlanRepository + Send + Sync + 'static,
    R: PlanRateRepository + Send + Sync + 'static,
    C: CommissionTransactionRepository + Send + Sync + 'static,
    T: PaymentTransferRepository + Send + Sync + 'static,
{
    commissions: Arc<CommissionUseCase<P, R, C>>,
    scheduler: Arc<TransferScheduler<T>>,
}

impl<P, R, C, T> SettlementUseCase<P, R, C, T>
where
    P: SubscriptionPlanRepository + Send + Sync + 'static,
    R: PlanRateRepository + Send + Sync + 'static,
    C: CommissionTransactionRepository + Send + Sync + 'static,
    T: PaymentTransferRepository + Send + Sync + 'static,
{
    pub fn new(
        commissions: Arc<CommissionUseCase<P, R, C>>,
        scheduler: Arc<TransferScheduler<T>>,
    ) -> Self {
        Self {
            commissions,
            scheduler,
        }
    }

    /// Returns `None` for meetings whose payment was reversed before settlement.
    pub async fn settle(&self, meeting: &MeetingEntity) -> Result<Option<Settlement>> {
        if meeting.payment_status != MeetingPaymentStatus::Succeeded {
            info!(
                meeting_id = %meeting.id,
                payment_status = %meeting.payment_status,
                "settlement: payment reversed, nothing to settle"
            );
            return Ok(None);
        }

        let commission = self.commissions.compute_and_record(meeting).await?;
        let transfer = self
            .scheduler
            .schedule_for(meeting, commission.net_amount_minor)
            .await?;

        Ok(Some(Settlement {
            commission,
            transfer,
        }))
    }
}
