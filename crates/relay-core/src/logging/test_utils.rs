//! In-memory capture of `tracing` events for assertions in tests.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::level_filters::LevelFilter;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

/// One captured log line.
#[derive(Clone, Debug)]
pub struct CapturedEvent {
    /// Event level.
    pub level: Level,
    /// Emitting module path.
    pub target: String,
    /// Formatted message.
    pub message: String,
    /// Structured fields as `(name, rendered value)`.
    pub fields: Vec<(String, String)>,
}

impl CapturedEvent {
    /// Rendered value of the field `name`, if recorded.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Shared handle to everything captured so far.
#[derive(Clone, Default)]
pub struct CapturedLogs {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl CapturedLogs {
    fn with_events<R>(&self, f: impl FnOnce(&mut Vec<CapturedEvent>) -> R) -> R {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut events)
    }

    /// Snapshot of all captured events.
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.with_events(|e| e.clone())
    }

    /// Whether an event at `level` contains `message_contains`.
    pub fn has_event(&self, level: Level, message_contains: &str) -> bool {
        self.with_events(|e| {
            e.iter()
                .any(|ev| ev.level == level && ev.message.contains(message_contains))
        })
    }

    /// Number of events at `level`.
    pub fn count_at_level(&self, level: Level) -> usize {
        self.with_events(|e| e.iter().filter(|ev| ev.level == level).count())
    }

    /// Events whose target starts with `target_prefix`.
    pub fn events_for_target(&self, target_prefix: &str) -> Vec<CapturedEvent> {
        self.with_events(|e| {
            e.iter()
                .filter(|ev| ev.target.starts_with(target_prefix))
                .cloned()
                .collect()
        })
    }

    /// Drop everything captured so far.
    pub fn clear(&self) {
        self.with_events(Vec::clear);
    }
}

struct CaptureLayer {
    logs: CapturedLogs,
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        let rendered = format!("{value:?}");
        if field.name() == "message" {
            self.message = rendered;
        } else {
            self.fields.push((field.name().to_owned(), rendered));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            value.clone_into(&mut self.message);
        } else {
            self.fields.push((field.name().to_owned(), value.to_owned()));
        }
    }
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        let metadata = event.metadata();
        let captured = CapturedEvent {
            level: *metadata.level(),
            target: metadata.target().to_owned(),
            message: visitor.message,
            fields: visitor.fields,
        };
        self.logs.with_events(|e| e.push(captured));
    }
}

/// Install a thread-local capturing subscriber.
///
/// Keep the returned guard alive for the duration of the test. Tasks on a
/// current-thread tokio runtime log into the same capture.
pub fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let layer = CaptureLayer { logs: logs.clone() };
    let guard = tracing_subscriber::registry()
        .with(layer)
        .with(LevelFilter::TRACE)
        .set_default();
    (logs, guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_levels() {
        let (logs, _guard) = capture_logs();
        tracing::info!("client connected");
        tracing::warn!("malformed payload");
        assert!(logs.has_event(Level::INFO, "client connected"));
        assert!(logs.has_event(Level::WARN, "malformed"));
        assert!(!logs.has_event(Level::ERROR, "malformed"));
        assert_eq!(logs.count_at_level(Level::WARN), 1);
    }

    #[test]
    fn captures_fields() {
        let (logs, _guard) = capture_logs();
        tracing::debug!(recipients = 3, conn_id = "conn_a", "broadcast");
        let events = logs.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].field("recipients"), Some("3"));
        assert_eq!(events[0].field("conn_id"), Some("conn_a"));
        assert_eq!(events[0].field("missing"), None);
    }

    #[test]
    fn filter_by_target() {
        let (logs, _guard) = capture_logs();
        tracing::info!(target: "relay_server::websocket", "ws event");
        tracing::info!(target: "relayd", "boot event");
        let ws = logs.events_for_target("relay_server");
        assert_eq!(ws.len(), 1);
        assert!(ws[0].message.contains("ws event"));
    }

    #[test]
    fn clear_empties_capture() {
        let (logs, _guard) = capture_logs();
        tracing::info!("one");
        logs.clear();
        assert!(logs.events().is_empty());
    }
}
