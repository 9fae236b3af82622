use anyhow::Result;
use backend::{
    config::config_loader::get_stage,
    usecases::{
        commissions::CommissionUseCase, eligibility::EligibilityUseCase,
        payment_transfers::TransferScheduler, plan_rates::PlanRateCache,
        settlement::SettlementUseCase,
    },
};
use crates::{
    domain::{
        repositories::{
            expert_payout_accounts::ExpertPayoutAccountRepository, meetings::MeetingRepository,
            payment_transfers::PaymentTransferRepository,
            slot_reservations::SlotReservationRepository,
        },
        value_objects::{eligibility::EligibilityRule, transfers::TransferRetryPolicy},
    },
    infra::{
        db::{
            postgres::postgres_connection,
            repositories::{
                commission_transactions::CommissionTransactionPostgres,
                eligibility::EligibilityPostgres,
                expert_payout_accounts::ExpertPayoutAccountPostgres, meetings::MeetingPostgres,
                payment_transfers::PaymentTransferPostgres, plan_rates::PlanRatePostgres,
                slot_reservations::SlotReservationPostgres,
                subscription_plans::SubscriptionPlanPostgres,
            },
        },
        notifications::dispatcher_from_config,
    },
    payments::{gateway::PaymentGateway, stripe_client::StripeClient},
};
use std::{sync::Arc, time::Duration};
use tracing::{error, info};
use worker::{
    axum_http, background_worker, config,
    usecases::{
        expire_stale_reservations::ExpireStaleReservationsUseCase,
        payment_reminders::PaymentRemindersUseCase,
        process_payment_transfers::ProcessPaymentTransfersUseCase,
        settlement_backfill::SettlementBackfillUseCase,
    },
};

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(error) = run().await {
        error!("Worker exited with error: {:?}", error);
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    crates::observability::init_observability("worker")?;

    let dotenvy_env = Arc::new(config::config_loader::load()?);
    info!(stage = %get_stage(), worker_id = %dotenvy_env.transfers.worker_id, "ENV has been loaded");

    let postgres_pool = postgres_connection::establish_connection(
        &dotenvy_env.database.url,
        dotenvy_env.database.max_connections,
    )?;
    info!("Postgres connection has been established");

    let db_pool_arc = Arc::new(postgres_pool);
    let notifier = dispatcher_from_config(dotenvy_env.notifications.webhook_url.as_deref());

    // Reservation holds: reminders and expiry share one loop.
    let sweep = &dotenvy_env.reservations;
    let reservation_repository: Arc<dyn SlotReservationRepository + Send + Sync> =
        Arc::new(SlotReservationPostgres::new(Arc::clone(&db_pool_arc)));
    let reminders = Arc::new(PaymentRemindersUseCase::new(
        Arc::clone(&reservation_repository),
        Arc::clone(&notifier),
        chrono::Duration::minutes(sweep.first_reminder_minutes_before_expiry),
        chrono::Duration::minutes(sweep.second_reminder_minutes_before_expiry),
        sweep.batch_size,
    ));
    let expiry = Arc::new(ExpireStaleReservationsUseCase::new(
        reservation_repository,
        sweep.batch_size,
    ));
    let reservation_loop = tokio::spawn(background_worker::reservation_expiry::run(
        reminders,
        expiry,
        Duration::from_secs(sweep.interval_seconds),
    ));

    // Payouts
    let transfers_config = &dotenvy_env.transfers;
    let transfer_repository: Arc<dyn PaymentTransferRepository + Send + Sync> =
        Arc::new(PaymentTransferPostgres::new(Arc::clone(&db_pool_arc)));
    let payout_accounts: Arc<dyn ExpertPayoutAccountRepository + Send + Sync> =
        Arc::new(ExpertPayoutAccountPostgres::new(Arc::clone(&db_pool_arc)));
    let gateway: Arc<dyn PaymentGateway> = Arc::new(StripeClient::without_webhooks(
        dotenvy_env.stripe.secret_key.clone(),
    ));
    let process_transfers = Arc::new(ProcessPaymentTransfersUseCase::new(
        transfer_repository,
        payout_accounts,
        gateway,
        Arc::clone(&notifier),
        TransferRetryPolicy {
            max_attempts: transfers_config.max_attempts,
            backoff_base: chrono::Duration::seconds(transfers_config.backoff_base_seconds),
            backoff_max: chrono::Duration::seconds(transfers_config.backoff_max_seconds),
        },
        transfers_config.worker_id.clone(),
        chrono::Duration::seconds(transfers_config.lease_seconds),
        transfers_config.batch_size,
    ));
    let transfer_loop = tokio::spawn(background_worker::transfer_processing::run(
        process_transfers,
        Duration::from_secs(transfers_config.poll_interval_seconds),
    ));

    // Settlement backfill
    let settlement_config = &dotenvy_env.settlement;
    let rates = Arc::new(PlanRateCache::new(
        Arc::new(PlanRatePostgres::new(Arc::clone(&db_pool_arc))),
        Duration::from_secs(settlement_config.plan_rate_cache_ttl_seconds),
    ));
    let settlement = Arc::new(SettlementUseCase::new(
        Arc::new(CommissionUseCase::new(
            Arc::new(SubscriptionPlanPostgres::new(Arc::clone(&db_pool_arc))),
            rates,
            Arc::new(CommissionTransactionPostgres::new(Arc::clone(&db_pool_arc))),
        )),
        Arc::new(TransferScheduler::new(
            Arc::new(PaymentTransferPostgres::new(Arc::clone(&db_pool_arc))),
            chrono::Duration::hours(settlement_config.payout_delay_hours),
        )),
    ));
    let meeting_repository: Arc<dyn MeetingRepository + Send + Sync> =
        Arc::new(MeetingPostgres::new(Arc::clone(&db_pool_arc)));
    let backfill = Arc::new(SettlementBackfillUseCase::new(
        meeting_repository,
        settlement,
        settlement_config.batch_size,
    ));
    let backfill_loop = tokio::spawn(background_worker::settlement_backfill::run(
        backfill,
        Duration::from_secs(settlement_config.interval_seconds),
    ));

    // Eligibility: scheduled loop plus the internal recompute endpoint.
    let rule_config = &dotenvy_env.eligibility;
    let eligibility = Arc::new(EligibilityUseCase::new(
        Arc::new(EligibilityPostgres::new(Arc::clone(&db_pool_arc))),
        notifier,
        EligibilityRule {
            window_days: rule_config.window_days,
            min_months_active: rule_config.min_months_active,
            min_average_monthly_revenue_minor: rule_config.min_average_monthly_revenue_minor,
        },
    ));
    let eligibility_loop = tokio::spawn(background_worker::eligibility::run(
        Arc::clone(&eligibility),
        Duration::from_secs(rule_config.interval_seconds),
    ));

    let server_config = Arc::clone(&dotenvy_env);
    let internal_server =
        tokio::spawn(async move { axum_http::http_serve::start(server_config, eligibility).await });

    info!("Worker started");

    tokio::select! {
        result = reservation_loop => result??,
        result = transfer_loop => result??,
        result = backfill_loop => result??,
        result = eligibility_loop => result??,
        result = internal_server => result??,
    };
    Ok(())
}
