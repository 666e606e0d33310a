//! The dispatcher thread.
//!
//! A single long-lived loop that turns registry changes into worker
//! lifecycle events: it scans for unprocessed entries, spawns a named worker
//! thread per new registration, and physically removes canceled entries.
//! The scan is a best-effort poll — there is no condition signaling — so the
//! loop sleeps for a configurable interval whenever a scan comes up empty.
//!
//! Workers are self-terminating (they watch their own entry), so the
//! dispatcher never joins them; it only prunes finished handles while idle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use alarmd_core::{AlarmEvent, AlarmService, Unprocessed};
use thiserror::Error;
use tracing::{debug, info};

use crate::worker;

/// Errors from the dispatcher loop.
///
/// Worker spawn failure is resource exhaustion and is treated as fatal by
/// the daemon: there is no supervisory restart, the process terminates.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DispatcherError {
    /// The OS refused to create a worker thread.
    #[error("failed to spawn worker thread for job {id}: {source}")]
    WorkerSpawn {
        /// The job the worker was being created for.
        id: u32,
        /// The underlying OS error.
        #[source]
        source: std::io::Error,
    },
}

/// Configuration for the dispatcher loop.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Sleep between scans that find nothing to do.
    pub poll_interval: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl DispatcherConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the idle poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// The dispatcher: scans the registry and manages worker threads.
pub struct Dispatcher {
    service: Arc<AlarmService>,
    config: DispatcherConfig,
    shutdown: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl Dispatcher {
    /// Creates a dispatcher over the given service.
    #[must_use]
    pub fn new(service: Arc<AlarmService>, config: DispatcherConfig) -> Self {
        Self {
            service,
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
            workers: Vec::new(),
        }
    }

    /// Returns a handle for requesting shutdown.
    ///
    /// Setting the flag stops the loop after the current cycle. Workers are
    /// not interrupted; they die with the process or after their own
    /// registrations are canceled.
    #[must_use]
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Runs the dispatcher loop until shutdown is requested.
    ///
    /// Each cycle takes at most one unprocessed item:
    /// - a new registration: emit the creation event, then spawn its worker;
    /// - a pending cancellation: unlink the entry and emit the cancellation
    ///   event (the bound worker notices the removal on its own);
    /// - nothing: prune finished worker handles and sleep.
    ///
    /// # Errors
    ///
    /// Returns [`DispatcherError::WorkerSpawn`] if the OS refuses to create
    /// a worker thread. The caller treats this as fatal.
    #[allow(clippy::cast_possible_truncation)] // poll intervals are far below u64::MAX ms
    pub fn run(mut self) -> Result<(), DispatcherError> {
        info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "dispatcher starting"
        );

        while !self.shutdown.load(Ordering::Relaxed) {
            let next = self.service.gate().enter().take_unprocessed();
            match next {
                Some(Unprocessed::Registration { id, serial, message }) => {
                    // Emit before spawning so the creation event always
                    // precedes the worker's first print.
                    self.service.emit(&AlarmEvent::Created { id, message });
                    self.spawn_worker(id, serial)?;
                },
                Some(Unprocessed::Cancellation { id }) => {
                    let message = self.service.gate().enter().unlink(id);
                    if let Some(message) = message {
                        info!(id, "registration canceled");
                        self.service.emit(&AlarmEvent::Canceled { id, message });
                    }
                },
                None => {
                    self.prune_finished();
                    thread::sleep(self.config.poll_interval);
                },
            }
        }

        info!("dispatcher shutting down");
        Ok(())
    }

    fn spawn_worker(&mut self, id: u32, serial: u64) -> Result<(), DispatcherError> {
        let service = Arc::clone(&self.service);
        let handle = thread::Builder::new()
            .name(format!("alarm-worker-{id}"))
            .spawn(move || worker::run_worker(&service, id, serial))
            .map_err(|source| DispatcherError::WorkerSpawn { id, source })?;
        debug!(id, serial, "worker spawned");
        self.workers.push(handle);
        Ok(())
    }

    fn prune_finished(&mut self) {
        self.workers.retain(|handle| !handle.is_finished());
    }
}
