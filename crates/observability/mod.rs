mod alert_layer;
mod alerts;
mod config;

use alert_layer::AlertLayer;
use alerts::{AlertDispatcher, AlertSink, WebhookAlertSink};
use anyhow::Result;
use config::ObservabilityConfig;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Installs the global subscriber: `RUST_LOG` filter (default `info`), a fmt
/// layer stamped with local RFC3339 time, and the operator alert layer when
/// `ALERT_WEBHOOK_URL` is set. Must run inside the tokio runtime.
pub fn init_observability(component: &str) -> Result<()> {
    let config = ObservabilityConfig::from_env(component);

    let alert_layer = match &config.alerts {
        Some(alerts) => {
            let sink: Arc<dyn AlertSink> = Arc::new(WebhookAlertSink::new(alerts.webhook_url.clone())?);
            let dispatcher = AlertDispatcher::spawn(vec![sink]);
            Some(
                AlertLayer::new(dispatcher, config.service_context.clone(), alerts.min_level)
                    .with_filter(LevelFilter::from_level(alerts.min_level)),
            )
        }
        None => None,
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_ansi(config.ansi)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339());

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(alert_layer)
        .with(env_filter)
        .try_init()?;

    for warning in &config.warnings {
        warn!(
            service = %config.service_context.service_name,
            environment = %config.service_context.environment,
            component = %config.service_context.component,
            warning = %warning,
            "observability: config warning"
        );
    }

    info!(
        service = %config.service_context.service_name,
        environment = %config.service_context.environment,
        component = %config.service_context.component,
        alerts = config.alerts.as_ref().map(|a| a.min_level.as_str()).unwrap_or("off"),
        "observability: tracing initialised"
    );

    Ok(())
}
