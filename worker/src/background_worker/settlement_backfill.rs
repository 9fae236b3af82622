use crate::usecases::settlement_backfill::SettlementBackfillUseCase;
use anyhow::Result;
use crates::domain::repositories::{
    commission_transactions::CommissionTransactionRepository,
    payment_transfers::PaymentTransferRepository, plan_rates::PlanRateRepository,
    subscription_plans::SubscriptionPlanRepository,
};
use std::{sync::Arc, time::Duration};
use tracing::{error, info};

pub async fn run<P, R, C, T>(
    usecase: Arc<SettlementBackfillUseCase<P, R, C, T>>,
    interval: Duration,
) -> Result<()>
where
    P: SubscriptionPlanRepository + Send + Sync + 'static,
    R: PlanRateRepository + Send + Sync + 'static,
    C: CommissionTransactionRepository + Send + Sync + 'static,
    T: PaymentTransferRepository + Send + Sync + 'static,
{
    info!("settlement_backfill: starting worker loop");
    loop {
        if let Err(err) = usecase.run().await {
            error!(error = ?err, "settlement_backfill: error listing unsettled meetings");
        }
        tokio::time::sleep(interval).await;
    }
}
