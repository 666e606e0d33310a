//! Output events and the sink boundary.
//!
//! The core never prints: every observable outcome — job created, periodic
//! message, change notice, cancellation, worker exit — is an [`AlarmEvent`]
//! handed to the injected [`EventSink`]. The daemon installs a console or
//! JSON sink; tests install a [`MemorySink`] and assert on the recorded
//! sequence.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// One output event emitted by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AlarmEvent {
    /// The dispatcher accepted a registration and spawned its worker.
    Created {
        /// Job id.
        id: u32,
        /// Message at creation time.
        message: String,
    },
    /// A worker printed its periodic message.
    Message {
        /// Job id.
        id: u32,
        /// Current message text.
        message: String,
    },
    /// A worker printed the one-shot notice after a content update.
    MessageChanged {
        /// Job id.
        id: u32,
        /// The updated message text.
        message: String,
    },
    /// The dispatcher removed a canceled registration.
    Canceled {
        /// Job id.
        id: u32,
        /// The message the job carried when it was removed.
        message: String,
    },
    /// A worker observed its registration was gone and terminated.
    WorkerExited {
        /// Job id.
        id: u32,
    },
}

impl AlarmEvent {
    /// The job id the event concerns.
    #[must_use]
    pub const fn id(&self) -> u32 {
        match self {
            Self::Created { id, .. }
            | Self::Message { id, .. }
            | Self::MessageChanged { id, .. }
            | Self::Canceled { id, .. }
            | Self::WorkerExited { id } => *id,
        }
    }
}

/// Consumer of the core's output events.
///
/// Implementations must be cheap and non-blocking from the caller's point of
/// view: events are emitted from the dispatcher and from worker loops, and a
/// slow sink stalls printing for every job.
pub trait EventSink: Send + Sync {
    /// Handles one event.
    fn emit(&self, event: &AlarmEvent);
}

/// Recording sink for tests and inspection.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<AlarmEvent>>,
}

impl MemorySink {
    /// Creates an empty recording sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all events recorded so far, in emission order.
    #[must_use]
    pub fn events(&self) -> Vec<AlarmEvent> {
        self.events.lock().expect("lock poisoned").clone()
    }

    /// Number of events recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().expect("lock poisoned").len()
    }

    /// True if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &AlarmEvent) {
        self.events.lock().expect("lock poisoned").push(event.clone());
    }
}
