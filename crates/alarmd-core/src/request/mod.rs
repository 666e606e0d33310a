//! Alarm request data model.
//!
//! An [`AlarmRequest`] is one instruction from the producer: either register
//! a periodic message (creating a new job or updating an existing one in
//! place) or cancel a job by id. Requests are validated at construction so
//! that everything past the producer boundary holds a well-formed message.

use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum message length in bytes.
///
/// Registrations carrying a longer message are rejected at construction,
/// before they can reach the registry.
pub const MAX_MESSAGE_BYTES: usize = 127;

/// Whether a request registers a job or cancels one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmKind {
    /// Register a new job, or update an existing job with the same id.
    Register,
    /// Cancel the job with the given id.
    Cancel,
}

/// Errors from request construction.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum RequestError {
    /// The message exceeds [`MAX_MESSAGE_BYTES`].
    #[error("message is {len} bytes, limit is {MAX_MESSAGE_BYTES}")]
    MessageTooLong {
        /// Actual length of the rejected message, in bytes.
        len: usize,
    },
}

/// One registration or cancellation instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmRequest {
    id: u32,
    interval_seconds: u64,
    message: String,
    kind: AlarmKind,
    /// Submission time plus the interval. Carried as metadata only; the
    /// dispatcher polls rather than scheduling against due times.
    due_at: Option<SystemTime>,
}

impl AlarmRequest {
    /// Creates a registration request, stamping `due_at` from the current
    /// wall clock.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::MessageTooLong`] if the message exceeds
    /// [`MAX_MESSAGE_BYTES`].
    pub fn register(
        id: u32,
        interval_seconds: u64,
        message: impl Into<String>,
    ) -> Result<Self, RequestError> {
        let message = message.into();
        if message.len() > MAX_MESSAGE_BYTES {
            return Err(RequestError::MessageTooLong {
                len: message.len(),
            });
        }
        let due_at = SystemTime::now().checked_add(Duration::from_secs(interval_seconds));
        Ok(Self {
            id,
            interval_seconds,
            message,
            kind: AlarmKind::Register,
            due_at,
        })
    }

    /// Creates a cancellation request for the job with the given id.
    #[must_use]
    pub const fn cancel(id: u32) -> Self {
        Self {
            id,
            interval_seconds: 0,
            message: String::new(),
            kind: AlarmKind::Cancel,
            due_at: None,
        }
    }

    /// Producer-supplied job id. Unique among active registrations only;
    /// a cancellation reuses the id of the registration it targets.
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Repeat period in whole seconds. Zero is accepted and means "print as
    /// fast as the worker loop runs".
    #[must_use]
    pub const fn interval_seconds(&self) -> u64 {
        self.interval_seconds
    }

    /// Repeat period as a [`Duration`].
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    /// The message text to print each period. Empty for cancellations.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether this request registers or cancels.
    #[must_use]
    pub const fn kind(&self) -> AlarmKind {
        self.kind
    }

    /// Submission time plus the interval; `None` for cancellations.
    #[must_use]
    pub const fn due_at(&self) -> Option<SystemTime> {
        self.due_at
    }
}
