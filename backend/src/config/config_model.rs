#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub backend_server: BackendServer,
    pub database: Database,
    pub identity: Identity,
    pub stripe: Stripe,
    pub booking: Booking,
    pub notifications: Notifications,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    pub body_limit: u64,
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct Identity {
    pub jwt_secret: String,
}

#[derive(Debug, Clone)]
pub struct Stripe {
    pub secret_key: String,
    pub webhook_secret: String,
}

#[derive(Debug, Clone)]
pub struct Booking {
    pub hold_ttl_minutes: i64,
    pub payout_delay_hours: i64,
    pub plan_rate_cache_ttl_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct Notifications {
    pub webhook_url: Option<String>,
}
