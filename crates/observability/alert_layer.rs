use chrono::Utc;
use std::{collections::BTreeMap, fmt};
use tracing::{
    Event, Level, Subscriber,
    field::{Field, Visit},
};
use tracing_subscriber::{Layer, layer::Context, registry::LookupSpan};

use super::{
    alerts::{AlertDispatcher, AlertEvent},
    config::ServiceContext,
};

const REDACTED: &str = "[REDACTED]";
const SENSITIVE: [&str; 7] = [
    "secret",
    "token",
    "password",
    "authorization",
    "webhook",
    "signature",
    "api_key",
];

/// Forwards events at or above `min_level` to the alert sinks.
pub(crate) struct AlertLayer {
    dispatcher: AlertDispatcher,
    context: ServiceContext,
    min_level: Level,
}

impl AlertLayer {
    pub(crate) fn new(dispatcher: AlertDispatcher, context: ServiceContext, min_level: Level) -> Self {
        Self {
            dispatcher,
            context,
            min_level,
        }
    }
}

#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    fields: BTreeMap<String, String>,
}

impl FieldCollector {
    fn put(&mut self, field: &Field, value: String) {
        let name = field.name();
        if name == "message" {
            self.message = Some(value);
            return;
        }
        let lowered = name.to_ascii_lowercase();
        let value = if SENSITIVE.iter().any(|key| lowered.contains(key)) {
            REDACTED.to_string()
        } else {
            value
        };
        self.fields.insert(name.to_string(), value);
    }
}

impl Visit for FieldCollector {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, format!("{value:?}"));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.put(field, value.to_string());
    }
}

impl<S> Layer<S> for AlertLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let meta = event.metadata();
        // Lower levels compare greater in tracing.
        if *meta.level() > self.min_level {
            return;
        }
        // The dispatcher logs its own failures; alerting on them would loop.
        if meta.target().starts_with(module_path!().trim_end_matches("::alert_layer")) {
            return;
        }

        let mut collector = FieldCollector::default();
        event.record(&mut collector);

        let spans = ctx
            .event_scope(event)
            .map(|scope| {
                scope
                    .from_root()
                    .map(|span| span.name().to_string())
                    .collect()
            })
            .unwrap_or_default();

        self.dispatcher.dispatch(AlertEvent {
            level: *meta.level(),
            timestamp: Utc::now(),
            service: self.context.service_name.clone(),
            environment: self.context.environment.clone(),
            component: self.context.component.clone(),
            target: meta.target().to_string(),
            location: meta
                .file()
                .map(|file| format!("{file}:{}", meta.line().unwrap_or_default())),
            message: collector.message,
            fields: collector.fields,
            spans,
        });
    }
}
