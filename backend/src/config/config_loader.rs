use std::str::FromStr;

use anyhow::{Context, Result};

use super::{
    config_model::{
        BackendServer, Booking, Database, DotEnvyConfig, Identity, Notifications, Stripe,
    },
    stage::Stage,
};

pub fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("{key} is invalid"))
}

pub fn parsed_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} is invalid")),
        _ => Ok(default),
    }
}

pub fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let backend_server = BackendServer {
        port: required("SERVER_PORT_BACKEND")?.parse()?,
        body_limit: required("SERVER_BODY_LIMIT")?.parse()?,
        timeout: required("SERVER_TIMEOUT")?.parse()?,
    };

    let database = Database {
        url: required("DATABASE_URL")?,
        max_connections: parsed_or("DATABASE_MAX_CONNECTIONS", 10)?,
    };

    let identity = Identity {
        jwt_secret: required("IDENTITY_JWT_SECRET")?,
    };

    let stripe = Stripe {
        secret_key: required("STRIPE_SECRET_KEY")?,
        webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
    };

    let booking = Booking {
        hold_ttl_minutes: parsed_or("BOOKING_HOLD_TTL_MINUTES", 15)?,
        payout_delay_hours: parsed_or("PAYOUT_DELAY_HOURS", 24)?,
        plan_rate_cache_ttl_seconds: parsed_or("PLAN_RATE_CACHE_TTL_SECONDS", 60)?,
    };

    let notifications = Notifications {
        webhook_url: optional("NOTIFICATION_WEBHOOK_URL"),
    };

    Ok(DotEnvyConfig {
        backend_server,
        database,
        identity,
        stripe,
        booking,
        notifications,
    })
}

pub fn get_stage() -> Stage {
    dotenvy::dotenv().ok();

    let stage_str = std::env::var("STAGE").unwrap_or_default();
    Stage::try_from(&stage_str).unwrap_or_default()
}

pub fn get_identity_secret() -> Result<String> {
    dotenvy::dotenv().ok();

    required("IDENTITY_JWT_SECRET")
}
