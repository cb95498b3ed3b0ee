//! In-memory log capture for asserting on daemon log output.
//!
//! [`LogCapture`] is a `tracing` layer that records every event into a
//! bounded buffer; [`CapturedLogs`] reads it back. Install it with
//! `set_default` so capture is scoped to the current thread.

use std::sync::{Arc, Mutex};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

/// A single captured log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: Level,
    pub message: String,
}

#[derive(Debug)]
struct Buffer {
    records: Vec<LogRecord>,
    capacity: usize,
}

impl Buffer {
    fn push(&mut self, record: LogRecord) {
        if self.records.len() >= self.capacity {
            self.records.remove(0);
        }
        self.records.push(record);
    }
}

/// A `tracing` layer that captures events into a shared buffer.
#[derive(Debug, Clone)]
pub struct LogCapture {
    buffer: Arc<Mutex<Buffer>>,
}

impl LogCapture {
    /// Keep at most `capacity` records, dropping the oldest.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(Buffer {
                records: Vec::with_capacity(capacity),
                capacity,
            })),
        }
    }

    pub fn logs(&self) -> CapturedLogs {
        CapturedLogs {
            buffer: Arc::clone(&self.buffer),
        }
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.push(LogRecord {
                level: *event.metadata().level(),
                message: visitor.message,
            });
        }
    }
}

/// Read handle for captured records.
#[derive(Debug, Clone)]
pub struct CapturedLogs {
    buffer: Arc<Mutex<Buffer>>,
}

impl CapturedLogs {
    pub fn records(&self) -> Vec<LogRecord> {
        self.buffer
            .lock()
            .map(|buffer| buffer.records.clone())
            .unwrap_or_default()
    }

    /// Messages logged at exactly `level`, oldest first.
    pub fn messages_at(&self, level: Level) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|record| record.level == level)
            .map(|record| record.message)
            .collect()
    }

    /// Whether any record's message equals `message`.
    pub fn contains(&self, message: &str) -> bool {
        self.records().iter().any(|record| record.message == message)
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }
}
