//! Per-registration worker loop.
//!
//! One worker thread exists per active registration, bound to the entry's
//! `(id, serial)` pair. The worker holds no reference into the registry: every
//! iteration re-reads its entry through the gate, prints outside the gate,
//! and sleeps for the interval it observed. Cancellation is cooperative and
//! delayed — the worker notices only at the top of its next iteration, after
//! finishing its current sleep, so the worst-case cancellation latency is
//! one full interval.

use std::thread;
use std::time::Duration;

use alarmd_core::{AlarmEvent, AlarmService, WorkerView};
use tracing::debug;

/// Runs one worker until its registration is gone.
///
/// Each iteration:
/// 1. Observe the entry under the gate.
/// 2. If the entry is gone (canceled, unlinked, or superseded by a newer
///    serial): emit the exit event and return.
/// 3. Otherwise, outside the gate, print the change notice (once per
///    recorded update) or the plain message.
/// 4. If a notice was printed, clear the `changed` flag under the gate.
/// 5. Sleep for the observed interval.
///
/// The first print happens immediately on spawn; the interval governs the
/// gaps between prints, not the delay before the first one.
pub fn run_worker(service: &AlarmService, id: u32, serial: u64) {
    debug!(id, serial, "worker starting");
    loop {
        let view = service.gate().enter().observe(id, serial);
        match view {
            WorkerView::Gone => {
                service.emit(&AlarmEvent::WorkerExited { id });
                debug!(id, serial, "worker exiting");
                return;
            },
            WorkerView::Active {
                interval_seconds,
                message,
                changed,
            } => {
                if changed {
                    service.emit(&AlarmEvent::MessageChanged { id, message });
                    service.gate().enter().acknowledge_change(id, serial);
                } else {
                    service.emit(&AlarmEvent::Message { id, message });
                }
                thread::sleep(Duration::from_secs(interval_seconds));
            },
        }
    }
}
