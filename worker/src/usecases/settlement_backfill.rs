use anyhow::Result;
use backend::usecases::settlement::SettlementUseCase;
use crates::domain::repositories::{
    commission_transactions::CommissionTransactionRepository, meetings::MeetingRepository,
    payment_transfers::PaymentTransferRepository, plan_rates::PlanRateRepository,
    subscription_plans::SubscriptionPlanRepository,
};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillSummary {
    pub scanned: usize,
    pub settled: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Settles confirmed meetings whose commission or transfer write was lost after the
/// payment webhook returned.
pub struct SettlementBackfillUseCase<P, R, C, T>
where
    P: SubscriptionPlanRepository + Send + Sync + 'static,
    R: PlanRateRepository + Send + Sync + 'static,
    C: CommissionTransactionRepository + Send + Sync + 'static,
    T: PaymentTransferRepository + Send + Sync + 'static,
{
    meeting_repo: Arc<dyn MeetingRepository + Send + Sync>,
    settlement: Arc<SettlementUseCase<P, R, C, T>>,
    batch_size: i64,
}

impl<P, R, C, T> SettlementBackfillUseCase<P, R, C, T>
where
    P: SubscriptionPlanRepository + Send + Sync + 'static,
    R: PlanRateRepository + Send + Sync + 'static,
    C: CommissionTransactionRepository + Send + Sync + 'static,
    T: PaymentTransferRepository + Send + Sync + 'static,
{
    pub fn new(
        meeting_repo: Arc<dyn MeetingRepository + Send + Sync>,
        settlement: Arc<SettlementUseCase<P, R, C, T>>,
        batch_size: i64,
    ) -> Self {
        Self {
            meeting_repo,
            settlement,
            batch_size: batch_size.max(1),
        }
    }

    pub async fn run(&self) -> Result<BackfillSummary> {
        let meetings = self.meeting_repo.list_unsettled(self.batch_size).await?;
        let mut summary = BackfillSummary {
            scanned: meetings.len(),
            ..Default::default()
        };

        for meeting in &meetings {
            match self.settlement.settle(meeting).await {
                Ok(Some(_)) => summary.settled += 1,
                Ok(None) => summary.skipped += 1,
                Err(err) => {
                    summary.failed += 1;
                    error!(
                        meeting_id = %meeting.id,
                        error = ?err,
                        "settlement_backfill: failed to settle meeting"
                    );
                }
            }
        }

        if summary.scanned > 0 {
            info!(
                scanned = summary.scanned,
                settled = summary.settled,
                skipped = summary.skipped,
                failed = summary.failed,
                "settlement_backfill: batch finished"
            );
        }

        Ok(summary)
    }
}
