//! `tracing` front end for [`CloudWatchAppender`].
//!
//! [`CloudWatchLayer`] renders each `tracing` event to the same JSON shape
//! as `log` records, with the event's structured fields under `fields`,
//! and submits it to a shared appender. Spans are not recorded.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::appender::{CloudWatchAppender, inside_appender, is_own_target};
use crate::client::{HttpLogsClient, LogsClient};
use crate::serialise::JsonRecord;

/// `tracing_subscriber` layer forwarding events to a [`CloudWatchAppender`].
pub struct CloudWatchLayer<C: LogsClient = HttpLogsClient> {
    appender: Arc<CloudWatchAppender<C>>,
}

impl<C: LogsClient> CloudWatchLayer<C> {
    pub fn new(appender: Arc<CloudWatchAppender<C>>) -> Self {
        Self { appender }
    }

    pub fn appender(&self) -> &Arc<CloudWatchAppender<C>> {
        &self.appender
    }
}

fn to_log_level(level: &Level) -> log::Level {
    match *level {
        Level::TRACE => log::Level::Trace,
        Level::DEBUG => log::Level::Debug,
        Level::INFO => log::Level::Info,
        Level::WARN => log::Level::Warn,
        _ => log::Level::Error,
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Map<String, Value>,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = Some(match value {
                Value::String(text) => text,
                other => other.to_string(),
            });
        } else {
            self.fields.insert(field.name().to_owned(), value);
        }
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, Value::from(format!("{value:?}")));
    }
}

impl<S, C> Layer<S> for CloudWatchLayer<C>
where
    S: Subscriber,
    C: LogsClient + 'static,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = to_log_level(metadata.level());
        if level > self.appender.level() || is_own_target(metadata.target()) || inside_appender()
        {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        let result = self.appender.append_rendered(|now| {
            let mut record = JsonRecord::new(
                now,
                level.as_str(),
                metadata.target(),
                visitor.message.unwrap_or_default(),
            );
            record.module = metadata.module_path();
            record.file = metadata.file();
            record.line = metadata.line();
            record.fields = visitor.fields;
            record.to_json()
        });
        if let Err(err) = result {
            self.appender.report(&err);
        }
    }
}
