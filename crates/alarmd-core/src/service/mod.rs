//! The owned service context shared by producer, dispatcher, and workers.
//!
//! [`AlarmService`] bundles the gate-guarded registry with the injected
//! event sink. It is constructed once at startup and passed by `Arc` to the
//! dispatcher and every worker; nothing in the system is global, so tests
//! run any number of independent services side by side.

use std::sync::Arc;

use tracing::debug;

use crate::event::{AlarmEvent, EventSink};
use crate::gate::Gate;
use crate::registry::{AlarmRegistry, MergeOutcome, RegistryError};
use crate::request::{AlarmKind, AlarmRequest};

/// What a successful [`AlarmService::submit`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// A new registration was recorded; the dispatcher will spawn a worker.
    Registered,
    /// An existing registration was updated in place; its worker will print
    /// a change notice on its next wake.
    Updated,
    /// A cancellation was recorded; the dispatcher will remove the entry and
    /// the worker will exit at its next wake.
    CancelPending,
}

/// Shared context: the gate-guarded registry plus the event sink.
pub struct AlarmService {
    gate: Gate,
    sink: Arc<dyn EventSink>,
}

impl AlarmService {
    /// Creates a service with an empty registry and the given sink.
    #[must_use]
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            gate: Gate::new(AlarmRegistry::new()),
            sink,
        }
    }

    /// The gate over the shared registry.
    #[must_use]
    pub const fn gate(&self) -> &Gate {
        &self.gate
    }

    /// Submits one producer request.
    ///
    /// This is the producer's only entry point into the core. The registry
    /// is touched under the gate for the duration of the call; the
    /// dispatcher picks the resulting flags up on its next scan.
    ///
    /// # Errors
    ///
    /// Propagates [`RegistryError`] rejections (unknown or duplicate
    /// cancellation, id still pending removal). All are non-fatal; the
    /// registry is unchanged beyond any earlier successful submission.
    pub fn submit(&self, request: &AlarmRequest) -> Result<SubmitOutcome, RegistryError> {
        match request.kind() {
            AlarmKind::Register => {
                let outcome = self.gate.enter().insert_or_merge(request)?;
                debug!(id = request.id(), ?outcome, "registration submitted");
                Ok(match outcome {
                    MergeOutcome::Inserted => SubmitOutcome::Registered,
                    MergeOutcome::Merged => SubmitOutcome::Updated,
                })
            },
            AlarmKind::Cancel => {
                self.gate.enter().mark_for_cancel(request.id())?;
                debug!(id = request.id(), "cancellation submitted");
                Ok(SubmitOutcome::CancelPending)
            },
        }
    }

    /// Emits one output event through the injected sink.
    pub fn emit(&self, event: &AlarmEvent) {
        self.sink.emit(event);
    }
}
