//! Attach `tracing` events to the request that emitted them.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::context;
use crate::core::{LogLevel, MonitorCore};

/// Library module targets are never captured, so the monitor does not
/// record itself.
const SELF_TARGET: &str = concat!(env!("CARGO_CRATE_NAME"), "::");

/// `tracing_subscriber` layer recording events emitted inside a request
/// scope as native log entries. Events outside any request are ignored.
pub struct CaptureLayer {
    core: Arc<MonitorCore>,
}

impl CaptureLayer {
    pub fn new(core: Arc<MonitorCore>) -> Self {
        Self { core }
    }
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if metadata.target().starts_with(SELF_TARGET) {
            return;
        }
        let Some(id) = context::current() else {
            return;
        };

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut fields = visitor.fields;
        fields.insert("target".to_string(), Value::String(metadata.target().to_string()));

        self.core.capture_native_log(
            &id,
            LogLevel::from(metadata.level()),
            visitor.message.unwrap_or_default(),
            Some(Value::Object(fields)),
            None,
        );
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
                Value::String(s) => s,
                other => other.to_string(),
            });
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for FieldVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, Value::String(format!("{value:?}")));
    }
}
