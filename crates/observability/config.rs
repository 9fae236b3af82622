use std::env;
use tracing::Level;
use url::Url;

#[derive(Clone, Debug)]
pub(crate) struct ServiceContext {
    pub(crate) service_name: String,
    pub(crate) environment: String,
    pub(crate) component: String,
}

#[derive(Clone, Debug)]
pub(crate) struct AlertConfig {
    pub(crate) webhook_url: Url,
    pub(crate) min_level: Level,
}

#[derive(Clone, Debug)]
pub(crate) struct ObservabilityConfig {
    pub(crate) service_context: ServiceContext,
    pub(crate) ansi: bool,
    /// `None` when alerting is disabled or unconfigured.
    pub(crate) alerts: Option<AlertConfig>,
    /// Parse warnings, logged once the subscriber is installed.
    pub(crate) warnings: Vec<String>,
}

impl ObservabilityConfig {
    pub(crate) fn from_env(component: &str) -> Self {
        Self::from_lookup(component, |key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(component: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let component = component.trim().to_string();
        let mut warnings = Vec::new();

        let service_name = lookup("SERVICE_NAME")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| component.clone());

        let environment = lookup("STAGE")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "unknown".to_string());

        let ansi = match lookup("LOG_ANSI") {
            Some(raw) if !raw.trim().is_empty() => parse_bool(&raw).unwrap_or_else(|| {
                warnings.push(format!("LOG_ANSI is invalid (value: {raw}); defaulting to true"));
                true
            }),
            _ => true,
        };

        let alerts = alerts_from_lookup(&lookup, &mut warnings);

        Self {
            service_context: ServiceContext {
                service_name,
                environment,
                component,
            },
            ansi,
            alerts,
            warnings,
        }
    }
}

fn alerts_from_lookup<F>(lookup: &F, warnings: &mut Vec<String>) -> Option<AlertConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let enabled = match lookup("ALERT_NOTIFY_ENABLED") {
        Some(raw) if !raw.trim().is_empty() => parse_bool(&raw).unwrap_or_else(|| {
            warnings.push(format!(
                "ALERT_NOTIFY_ENABLED is invalid (value: {raw}); defaulting to true"
            ));
            true
        }),
        _ => true,
    };
    if !enabled {
        return None;
    }

    let raw_url = lookup("ALERT_WEBHOOK_URL").filter(|v| !v.trim().is_empty())?;
    let webhook_url = match Url::parse(raw_url.trim()) {
        Ok(url) => url,
        Err(err) => {
            // The URL embeds its credential, so only the parse error is reported.
            warnings.push(format!(
                "ALERT_WEBHOOK_URL is invalid; alerts disabled (parse error: {err})"
            ));
            return None;
        }
    };

    let min_level = match lookup("ALERT_MIN_LEVEL") {
        Some(raw) if !raw.trim().is_empty() => parse_level(&raw).unwrap_or_else(|| {
            warnings.push(format!(
                "ALERT_MIN_LEVEL is invalid (value: {raw}); defaulting to error"
            ));
            Level::ERROR
        }),
        _ => Level::ERROR,
    };

    Some(AlertConfig {
        webhook_url,
        min_level,
    })
}

fn parse_level(raw: &str) -> Option<Level> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(vars: &[(&str, &str)]) -> ObservabilityConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ObservabilityConfig::from_lookup("worker", |key| vars.get(key).cloned())
    }

    #[test]
    fn service_name_defaults_to_component() {
        let config = config_with(&[]);
        assert_eq!(config.service_context.service_name, "worker");
        assert_eq!(config.service_context.environment, "unknown");
        assert!(config.ansi);
        assert!(config.warnings.is_empty());
    }

    #[test]
    fn invalid_ansi_flag_is_a_warning_not_a_failure() {
        let config = config_with(&[("LOG_ANSI", "sometimes"), ("STAGE", "production")]);
        assert!(config.ansi);
        assert_eq!(config.service_context.environment, "production");
        assert_eq!(config.warnings.len(), 1);
    }

    #[test]
    fn ansi_can_be_disabled() {
        assert!(!config_with(&[("LOG_ANSI", "off")]).ansi);
    }

    #[test]
    fn alerts_stay_off_without_a_webhook() {
        assert!(config_with(&[]).alerts.is_none());
        assert!(config_with(&[("ALERT_MIN_LEVEL", "warn")]).alerts.is_none());
    }

    #[test]
    fn alerts_default_to_errors_only() {
        let config = config_with(&[("ALERT_WEBHOOK_URL", "https://hooks.example.com/ops/abc")]);
        let alerts = config.alerts.unwrap();
        assert_eq!(alerts.min_level, Level::ERROR);
        assert_eq!(alerts.webhook_url.host_str(), Some("hooks.example.com"));
    }

    #[test]
    fn bad_alert_settings_warn_without_leaking_the_url() {
        let config = config_with(&[
            ("ALERT_WEBHOOK_URL", "not a url/secret-token"),
            ("ALERT_MIN_LEVEL", "loud"),
        ]);
        assert!(config.alerts.is_none());
        assert_eq!(config.warnings.len(), 1);
        assert!(!config.warnings[0].contains("secret-token"));

        let config = config_with(&[
            ("ALERT_WEBHOOK_URL", "https://hooks.example.com/ops/abc"),
            ("ALERT_MIN_LEVEL", "loud"),
        ]);
        assert_eq!(config.alerts.unwrap().min_level, Level::ERROR);
        assert_eq!(config.warnings.len(), 1);
    }

    #[test]
    fn alerts_can_be_switched_off() {
        let config = config_with(&[
            ("ALERT_NOTIFY_ENABLED", "false"),
            ("ALERT_WEBHOOK_URL", "https://hooks.example.com/ops/abc"),
        ]);
        assert!(config.alerts.is_none());
        assert!(config.warnings.is_empty());
    }
}
