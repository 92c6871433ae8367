//! `tracing` layer that forwards error events to Raygun.

use crate::filters;
use raygun_provider::{RaygunSender, SendOptions};
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{debug, Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Custom data key holding the event's message.
pub const LOGGER_MESSAGE_KEY: &str = "Logger Message";

/// Reports every event at or above the threshold as a report with no error
/// value. The event's message lands in `userCustomData` under
/// [`LOGGER_MESSAGE_KEY`] and its other fields alongside it.
pub struct RaygunLayer {
    sender: Arc<RaygunSender>,
    threshold: Level,
}

impl RaygunLayer {
    pub fn new(sender: RaygunSender) -> Self {
        Self::from_shared(Arc::new(sender))
    }

    pub fn from_shared(sender: Arc<RaygunSender>) -> Self {
        Self {
            sender,
            threshold: Level::ERROR,
        }
    }

    /// Least severe level that is reported.
    pub fn with_threshold(mut self, threshold: Level) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn sender(&self) -> &RaygunSender {
        &self.sender
    }

    fn custom_data(event: &Event<'_>) -> Map<String, Value> {
        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let mut data = Map::new();
        data.insert(
            LOGGER_MESSAGE_KEY.to_string(),
            Value::String(visitor.message.unwrap_or_default()),
        );
        data.extend(visitor.fields);
        data
    }
}

impl fmt::Debug for RaygunLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RaygunLayer")
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}

impl<S> Layer<S> for RaygunLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if !filters::should_report(event.metadata(), self.threshold) {
            return;
        }

        let options = SendOptions::new().with_custom_data(Self::custom_data(event));
        match self.sender.send(None, options) {
            Ok(outcome) => debug!(?outcome, "Log event reported"),
            Err(e) => debug!(error = %e, "Log event could not be reported"),
        }
    }
}

/// Collects an event's message and fields as JSON.
#[derive(Default)]
struct EventVisitor {
    message: Option<String>,
    fields: Map<String, Value>,
}

impl Visit for EventVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), json!(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), json!(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), json!(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), json!(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), json!(value));
        }
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.fields
            .insert(field.name().to_string(), json!(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        } else {
            self.fields
                .insert(field.name().to_string(), json!(format!("{:?}", value)));
        }
    }
}
