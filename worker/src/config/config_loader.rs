use anyhow::{Result, ensure};
use backend::config::config_loader::{optional, parsed_or, required};
use uuid::Uuid;

use super::config_model::{
    Database, DotEnvyConfig, Eligibility, Internal, Notifications, ReservationSweep,
    SettlementBackfill, Stripe, TransferProcessing, WorkerServer,
};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let worker_server = WorkerServer {
        port: required("SERVER_PORT_WORKER")?.parse()?,
        body_limit: required("SERVER_BODY_LIMIT")?.parse()?,
        timeout: required("SERVER_TIMEOUT")?.parse()?,
    };

    let database = Database {
        url: required("DATABASE_URL")?,
        max_connections: parsed_or("DATABASE_MAX_CONNECTIONS", 10)?,
    };

    let stripe = Stripe {
        secret_key: required("STRIPE_SECRET_KEY")?,
    };

    let internal = Internal {
        token: optional("INTERNAL_WORKER_TOKEN"),
    };

    let reservations = ReservationSweep {
        interval_seconds: parsed_or("EXPIRY_SWEEP_INTERVAL_SECONDS", 60)?,
        batch_size: parsed_or("EXPIRY_SWEEP_BATCH_SIZE", 200)?,
        first_reminder_minutes_before_expiry: parsed_or("REMINDER_FIRST_MINUTES_BEFORE_EXPIRY", 5)?,
        second_reminder_minutes_before_expiry: parsed_or(
            "REMINDER_SECOND_MINUTES_BEFORE_EXPIRY",
            1,
        )?,
    };

    let transfers = TransferProcessing {
        worker_id: optional("WORKER_ID").unwrap_or_else(|| format!("worker-{}", Uuid::new_v4())),
        poll_interval_seconds: parsed_or("TRANSFER_POLL_INTERVAL_SECONDS", 15)?,
        batch_size: parsed_or("TRANSFER_BATCH_SIZE", 20)?,
        max_attempts: parsed_or("TRANSFER_MAX_ATTEMPTS", 3)?,
        backoff_base_seconds: parsed_or("TRANSFER_BACKOFF_BASE_SECONDS", 60)?,
        backoff_max_seconds: parsed_or("TRANSFER_BACKOFF_MAX_SECONDS", 3600)?,
        lease_seconds: parsed_or("TRANSFER_LEASE_SECONDS", 300)?,
    };
    ensure!(transfers.max_attempts >= 1, "TRANSFER_MAX_ATTEMPTS must be at least 1");
    ensure!(
        transfers.backoff_base_seconds > 0
            && transfers.backoff_max_seconds >= transfers.backoff_base_seconds,
        "TRANSFER_BACKOFF_MAX_SECONDS must be at least TRANSFER_BACKOFF_BASE_SECONDS"
    );
    ensure!(transfers.lease_seconds > 0, "TRANSFER_LEASE_SECONDS must be positive");

    let settlement = SettlementBackfill {
        interval_seconds: parsed_or("SETTLEMENT_BACKFILL_INTERVAL_SECONDS", 300)?,
        batch_size: parsed_or("SETTLEMENT_BACKFILL_BATCH_SIZE", 50)?,
        payout_delay_hours: parsed_or("PAYOUT_DELAY_HOURS", 24)?,
        plan_rate_cache_ttl_seconds: parsed_or("PLAN_RATE_CACHE_TTL_SECONDS", 60)?,
    };

    let eligibility = Eligibility {
        interval_seconds: parsed_or("ELIGIBILITY_INTERVAL_SECONDS", 86_400)?,
        window_days: parsed_or("ELIGIBILITY_WINDOW_DAYS", 90)?,
        min_months_active: parsed_or("ELIGIBILITY_MIN_MONTHS_ACTIVE", 3)?,
        min_average_monthly_revenue_minor: parsed_or(
            "ELIGIBILITY_MIN_AVERAGE_MONTHLY_REVENUE_MINOR",
            100_000,
        )?,
    };

    let notifications = Notifications {
        webhook_url: optional("NOTIFICATION_WEBHOOK_URL"),
    };

    Ok(DotEnvyConfig {
        worker_server,
        database,
        stripe,
        internal,
        reservations,
        transfers,
        settlement,
        eligibility,
        notifications,
    })
}
