//! In-memory log capture for asserting on emitted events.
//!
//! [`LogCollector`] is a `tracing` layer that records every event with its
//! level, target, message and structured fields. [`capture`] installs one for
//! the duration of a closure on the current thread.

use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};

/// A single captured event.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: Level,
    pub target: String,
    pub message: String,
    /// Structured fields other than `message`, in recording order.
    pub fields: Vec<(String, String)>,
}

impl LogEntry {
    /// Value of the structured field `name`, if recorded.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A `tracing` layer that stores events in a shared buffer.
#[derive(Debug, Clone, Default)]
pub struct LogCollector {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl LogCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the captured entries.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    /// Entries at exactly `level`.
    pub fn at(&self, level: Level) -> Vec<LogEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.level == level)
            .collect()
    }

    /// Whether an entry at `level` has a message containing `needle`.
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.at(level).iter().any(|e| e.message.contains(needle))
    }
}

impl<S: Subscriber> Layer<S> for LogCollector {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut visitor = EntryVisitor::default();
        event.record(&mut visitor);

        if let Ok(mut entries) = self.entries.lock() {
            entries.push(LogEntry {
                level: *metadata.level(),
                target: metadata.target().to_string(),
                message: visitor.message,
                fields: visitor.fields,
            });
        }
    }
}

/// Run `f` with a fresh collector installed on this thread and return its
/// result together with the collector.
pub fn capture<T>(f: impl FnOnce() -> T) -> (T, LogCollector) {
    let collector = LogCollector::new();
    let subscriber = tracing_subscriber::registry().with(collector.clone());
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, collector)
}

#[derive(Default)]
struct EntryVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl Visit for EntryVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields
                .push((field.name().to_string(), format!("{value:?}")));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields
                .push((field.name().to_string(), value.to_string()));
        }
    }
}
