#![forbid(unsafe_code)]

//! Diagnostic-logging integration tests.
//!
//! The gateway's resilience policy traps consumer failures and records them
//! as tracing events instead of propagating them into the producer path.
//! These tests install a capturing subscriber and verify that the events
//! actually fire at the advertised levels.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use scenecast_core::{Cursor, Line, SceneInput, Snapshot};
use scenecast_gateway::{Channel, ChannelError, ChannelUpdate, Gateway, InputSender};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;

// ============================================================================
// Test Infrastructure
// ============================================================================

/// A captured event with its level and fields.
#[derive(Debug, Clone)]
struct CapturedEvent {
    level: tracing::Level,
    fields: HashMap<String, String>,
    message: String,
}

struct EventCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

#[derive(Clone)]
struct CaptureHandle {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl CaptureHandle {
    fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().unwrap().clone()
    }
}

struct FieldVisitor(Vec<(String, String)>);

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0
            .push((field.name().to_string(), format!("{value:?}")));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.push((field.name().to_string(), value.to_string()));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.push((field.name().to_string(), value.to_string()));
    }
}

impl<S> tracing_subscriber::Layer<S> for EventCapture
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = FieldVisitor(Vec::new());
        event.record(&mut visitor);
        let fields: HashMap<String, String> = visitor.0.into_iter().collect();
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            message: fields.get("message").cloned().unwrap_or_default(),
            fields,
        });
    }
}

/// Run a closure under a capturing subscriber.
fn with_captured_events<F: FnOnce()>(f: F) -> CaptureHandle {
    let events = Arc::new(Mutex::new(Vec::new()));
    let handle = CaptureHandle {
        events: Arc::clone(&events),
    };
    let subscriber = tracing_subscriber::registry().with(EventCapture { events });
    tracing::subscriber::with_default(subscriber, f);
    handle
}

fn snapshot(lines: &[&str]) -> Snapshot {
    Snapshot {
        lines: lines.iter().map(|s| Line::plain(*s)).collect(),
        cursor: Cursor {
            x: 0,
            y: 0,
            visible: true,
        },
        cols: 80,
        rows: 24,
        alternate: false,
        lines_offset: Some(0),
        timestamp: 0,
    }
}

struct FailingChannel;

impl Channel for FailingChannel {
    fn start(&mut self, _sender: InputSender) -> Result<(), ChannelError> {
        Ok(())
    }
    fn stop(&mut self) -> Result<(), ChannelError> {
        Ok(())
    }
    fn receive(&mut self, _update: &ChannelUpdate) -> Result<(), ChannelError> {
        Err(ChannelError::new("socket closed"))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn failing_receive_logs_a_warning() {
    let handle = with_captured_events(|| {
        let mut gateway = Gateway::new(Box::new(|_| {}));
        gateway
            .replace_channels(vec![Box::new(FailingChannel)])
            .unwrap();
        gateway.update(&snapshot(&["x"]));
    });

    let warnings: Vec<_> = handle
        .events()
        .into_iter()
        .filter(|e| e.level == tracing::Level::WARN)
        .collect();
    assert_eq!(warnings.len(), 1, "expected one warning: {warnings:?}");
    assert!(warnings[0].message.contains("channel receive failed"));
    assert!(
        warnings[0]
            .fields
            .get("error")
            .is_some_and(|e| e.contains("socket closed")),
        "fields: {:?}",
        warnings[0].fields
    );
}

#[test]
fn dropped_select_logs_at_debug_level() {
    let handle = with_captured_events(|| {
        let mut gateway = Gateway::new(Box::new(|_| {}));
        gateway.send(SceneInput::select(3));
    });

    let debugs: Vec<_> = handle
        .events()
        .into_iter()
        .filter(|e| e.level == tracing::Level::DEBUG)
        .collect();
    assert!(
        debugs
            .iter()
            .any(|e| e.message.contains("select input dropped")),
        "events: {debugs:?}"
    );
}

#[test]
fn healthy_paths_emit_no_warnings() {
    let handle = with_captured_events(|| {
        let mut gateway = Gateway::new(Box::new(|_| {}));
        gateway.update(&snapshot(&["quiet"]));
        gateway.send(SceneInput::text("ls"));
    });

    assert!(
        handle
            .events()
            .iter()
            .all(|e| e.level != tracing::Level::WARN && e.level != tracing::Level::ERROR),
        "unexpected high-severity events: {:?}",
        handle.events()
    );
}
