#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub worker_server: WorkerServer,
    pub database: Database,
    pub stripe: Stripe,
    pub internal: Internal,
    pub reservations: ReservationSweep,
    pub transfers: TransferProcessing,
    pub settlement: SettlementBackfill,
    pub eligibility: Eligibility,
    pub notifications: Notifications,
}

#[derive(Debug, Clone)]
pub struct WorkerServer {
    pub port: u16,
    pub timeout: u64,
    pub body_limit: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct Stripe {
    pub secret_key: String,
}

#[derive(Debug, Clone)]
pub struct Internal {
    pub token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReservationSweep {
    pub interval_seconds: u64,
    pub batch_size: i64,
    pub first_reminder_minutes_before_expiry: i64,
    pub second_reminder_minutes_before_expiry: i64,
}

#[derive(Debug, Clone)]
pub struct TransferProcessing {
    pub worker_id: String,
    pub poll_interval_seconds: u64,
    pub batch_size: i64,
    pub max_attempts: i32,
    pub backoff_base_seconds: i64,
    pub backoff_max_seconds: i64,
    pub lease_seconds: i64,
}

#[derive(Debug, Clone)]
pub struct SettlementBackfill {
    pub interval_seconds: u64,
    pub batch_size: i64,
    pub payout_delay_hours: i64,
    pub plan_rate_cache_ttl_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct Eligibility {
    pub interval_seconds: u64,
    pub window_days: i64,
    pub min_months_active: i32,
    pub min_average_monthly_revenue_minor: i64,
}

#[derive(Debug, Clone)]
pub struct Notifications {
    pub webhook_url: Option<String>,
}
