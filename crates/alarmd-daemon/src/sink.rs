//! Console and JSON event sinks.
//!
//! Alarm output goes to stdout through one of these sinks; diagnostic logs
//! go to stderr through `tracing`. Keeping the two streams apart means the
//! periodic prints stay machine-consumable even with logging turned up.

use alarmd_core::{AlarmEvent, EventSink};
use tracing::warn;

/// Human-readable sink: one line per event.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl ConsoleSink {
    /// Creates the sink.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Renders one event as its console line.
    #[must_use]
    pub fn render(event: &AlarmEvent) -> String {
        match event {
            AlarmEvent::Created { id, message } => format!("job {id} created: {message}"),
            AlarmEvent::Message { id, message } => format!("job {id}: {message}"),
            AlarmEvent::MessageChanged { id, message } => {
                format!("job {id}: message changed: {message}")
            },
            AlarmEvent::Canceled { id, message } => format!("job {id} canceled: {message}"),
            AlarmEvent::WorkerExited { id } => format!("job {id} worker exiting"),
        }
    }
}

impl EventSink for ConsoleSink {
    fn emit(&self, event: &AlarmEvent) {
        println!("{}", Self::render(event));
    }
}

/// Machine-readable sink: one JSON object per line.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSink;

impl JsonSink {
    /// Creates the sink.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl EventSink for JsonSink {
    fn emit(&self, event: &AlarmEvent) {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(error) => warn!(%error, "failed to serialize event"),
        }
    }
}
