//! The shared alarm registry.
//!
//! The registry is the single shared mutable structure in the system: an
//! ordered collection of registrations keyed by job id, read and written by
//! the producer, the dispatcher, and every worker. All access goes through
//! the [`Gate`](crate::gate::Gate); the registry itself carries no locking.
//!
//! # Lifecycle of an entry
//!
//! 1. The producer inserts (or merges) a registration; the entry starts
//!    `pending_new` so the dispatcher will notice it on its next scan.
//! 2. The dispatcher takes the entry via [`AlarmRegistry::take_unprocessed`]
//!    and spawns a worker bound to the entry's `(id, serial)` pair.
//! 3. A cancellation flips `active` off (soft delete); the dispatcher later
//!    physically removes the entry with [`AlarmRegistry::unlink`].
//! 4. The worker observes the entry every iteration through
//!    [`AlarmRegistry::observe`] and exits once the entry is gone, inactive,
//!    or replaced by a re-registration with a newer serial.
//!
//! # Serials
//!
//! Every inserted registration is assigned a monotonically increasing
//! serial. A merge (re-registering an active id) keeps the serial: the job's
//! identity is unchanged and its worker keeps running with the new content.
//! A re-registration after the id was canceled and unlinked gets a fresh
//! serial, so a worker from the canceled generation can never adopt the new
//! registration.

use std::collections::BTreeMap;
use std::time::SystemTime;

use thiserror::Error;
use tracing::debug;

use crate::request::{AlarmKind, AlarmRequest};

/// Errors from registry operations. All are non-fatal: the registry is left
/// unchanged (beyond any earlier successful operation) and the caller
/// reports the rejection to the operator.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum RegistryError {
    /// A cancellation targeted an id with no registration at all.
    #[error("no registration with id {id}")]
    CancelNonexistent {
        /// The id the cancellation targeted.
        id: u32,
    },

    /// A second cancellation arrived for an id already flagged for removal.
    #[error("registration {id} already has a cancellation pending")]
    DuplicateCancel {
        /// The id the cancellation targeted.
        id: u32,
    },

    /// A registration reused an id that is canceled but not yet physically
    /// removed by the dispatcher. The producer can resubmit once the removal
    /// completes (one dispatcher poll interval).
    #[error("id {id} is still pending cancellation; re-register after removal")]
    IdStillCancelPending {
        /// The id the registration reused.
        id: u32,
    },

    /// The request kind does not match the operation (e.g. a cancellation
    /// passed to [`AlarmRegistry::insert_or_merge`]).
    #[error("request kind {kind:?} is not valid for this operation")]
    WrongKind {
        /// The offending request kind.
        kind: AlarmKind,
    },
}

/// Whether [`AlarmRegistry::insert_or_merge`] created a new entry or updated
/// an existing one in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// A fresh entry was created and flagged for the dispatcher.
    Inserted,
    /// An active entry with the same id was updated in place.
    Merged,
}

/// One unprocessed item returned by [`AlarmRegistry::take_unprocessed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unprocessed {
    /// A registration the dispatcher has not yet spawned a worker for.
    Registration {
        /// Job id.
        id: u32,
        /// Registration serial the worker must be bound to.
        serial: u64,
        /// Message at the time the dispatcher picked the entry up, for the
        /// creation event.
        message: String,
    },
    /// A soft-canceled entry awaiting physical removal.
    Cancellation {
        /// Job id.
        id: u32,
    },
}

/// What a worker sees when it checks in on its registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerView {
    /// The registration is still live; print and sleep.
    Active {
        /// Current repeat period in seconds (re-read every iteration so a
        /// merge takes effect after the current sleep).
        interval_seconds: u64,
        /// Current message text.
        message: String,
        /// Whether the content was updated since the last print.
        changed: bool,
    },
    /// The registration is gone, canceled, or superseded; the worker exits.
    Gone,
}

/// Read-only copy of an entry, for lookups and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySnapshot {
    /// Job id.
    pub id: u32,
    /// Registration serial.
    pub serial: u64,
    /// Repeat period in seconds.
    pub interval_seconds: u64,
    /// Message text.
    pub message: String,
    /// Submission time plus the interval, if known.
    pub due_at: Option<SystemTime>,
    /// False once a cancellation has been recorded.
    pub active: bool,
    /// True between a merge and the worker's change notice.
    pub changed: bool,
}

#[derive(Debug, Clone)]
struct AlarmEntry {
    serial: u64,
    interval_seconds: u64,
    message: String,
    due_at: Option<SystemTime>,
    pending_new: bool,
    changed: bool,
    active: bool,
}

/// Ordered collection of registrations, keyed by job id.
///
/// The map keeps entries in ascending id order, which fixes the order the
/// dispatcher handles simultaneous changes in: scans always run lowest id
/// first, regardless of submission order.
#[derive(Debug, Default)]
pub struct AlarmRegistry {
    entries: BTreeMap<u32, AlarmEntry>,
    next_serial: u64,
}

impl AlarmRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a registration, or updates the active entry with the same id
    /// in place.
    ///
    /// A merge overwrites the interval and message, flags the entry
    /// `changed`, and keeps its serial; the bound worker picks the new
    /// content up on its next iteration. An insert creates a fresh entry
    /// flagged `pending_new` for the dispatcher.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::WrongKind`] if the request is not a registration.
    /// - [`RegistryError::IdStillCancelPending`] if the id is occupied by an
    ///   entry awaiting removal.
    pub fn insert_or_merge(&mut self, req: &AlarmRequest) -> Result<MergeOutcome, RegistryError> {
        if req.kind() != AlarmKind::Register {
            return Err(RegistryError::WrongKind { kind: req.kind() });
        }

        match self.entries.get_mut(&req.id()) {
            Some(entry) if entry.active => {
                entry.interval_seconds = req.interval_seconds();
                entry.message = req.message().to_string();
                entry.due_at = req.due_at();
                entry.changed = true;
                debug!(id = req.id(), serial = entry.serial, "merged registration update");
                Ok(MergeOutcome::Merged)
            },
            Some(_) => Err(RegistryError::IdStillCancelPending { id: req.id() }),
            None => {
                self.next_serial += 1;
                let serial = self.next_serial;
                self.entries.insert(
                    req.id(),
                    AlarmEntry {
                        serial,
                        interval_seconds: req.interval_seconds(),
                        message: req.message().to_string(),
                        due_at: req.due_at(),
                        pending_new: true,
                        changed: false,
                        active: true,
                    },
                );
                debug!(id = req.id(), serial, "inserted registration");
                Ok(MergeOutcome::Inserted)
            },
        }
    }

    /// Records a cancellation for the given id (soft delete).
    ///
    /// The entry stays linked, flagged inactive, until the dispatcher
    /// performs the physical [`unlink`](Self::unlink); the bound worker
    /// notices the flag independently at its next wake.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::CancelNonexistent`] if no entry holds the id.
    /// - [`RegistryError::DuplicateCancel`] if the entry is already flagged.
    pub fn mark_for_cancel(&mut self, id: u32) -> Result<(), RegistryError> {
        match self.entries.get_mut(&id) {
            None => Err(RegistryError::CancelNonexistent { id }),
            Some(entry) if !entry.active => Err(RegistryError::DuplicateCancel { id }),
            Some(entry) => {
                entry.active = false;
                debug!(id, serial = entry.serial, "flagged for cancellation");
                Ok(())
            },
        }
    }

    /// Returns the next item the dispatcher has not handled yet, or `None`.
    ///
    /// Scans in ascending id order: the first `pending_new` entry wins
    /// (clearing the flag), otherwise the first soft-canceled entry still
    /// awaiting removal. At most one item per call; the dispatcher loops
    /// until the registry is drained before idling.
    pub fn take_unprocessed(&mut self) -> Option<Unprocessed> {
        if let Some((&id, entry)) = self.entries.iter_mut().find(|(_, e)| e.pending_new) {
            entry.pending_new = false;
            return Some(Unprocessed::Registration {
                id,
                serial: entry.serial,
                message: entry.message.clone(),
            });
        }

        self.entries
            .iter()
            .find(|(_, e)| !e.active)
            .map(|(&id, _)| Unprocessed::Cancellation { id })
    }

    /// Physically removes the entry for `id`, returning its final message
    /// for the cancellation event. Returns `None` if the id is not present
    /// (already unlinked).
    pub fn unlink(&mut self, id: u32) -> Option<String> {
        let entry = self.entries.remove(&id)?;
        debug!(id, serial = entry.serial, "unlinked entry");
        Some(entry.message)
    }

    /// Worker-side check-in for the registration bound to `(id, serial)`.
    ///
    /// Returns [`WorkerView::Gone`] when the entry is absent, inactive, or
    /// carries a different serial (the id was canceled and re-registered
    /// while the worker slept).
    #[must_use]
    pub fn observe(&self, id: u32, serial: u64) -> WorkerView {
        match self.entries.get(&id) {
            Some(e) if e.serial == serial && e.active => WorkerView::Active {
                interval_seconds: e.interval_seconds,
                message: e.message.clone(),
                changed: e.changed,
            },
            _ => WorkerView::Gone,
        }
    }

    /// Clears the `changed` flag after the worker printed its change
    /// notice. A serial mismatch is ignored: the flag then belongs to a
    /// newer registration this worker is not bound to.
    pub fn acknowledge_change(&mut self, id: u32, serial: u64) {
        if let Some(entry) = self.entries.get_mut(&id) {
            if entry.serial == serial {
                entry.changed = false;
            }
        }
    }

    /// Returns a read-only copy of the entry for `id`, if present.
    #[must_use]
    pub fn lookup(&self, id: u32) -> Option<EntrySnapshot> {
        self.entries.get(&id).map(|e| EntrySnapshot {
            id,
            serial: e.serial,
            interval_seconds: e.interval_seconds,
            message: e.message.clone(),
            due_at: e.due_at,
            active: e.active,
            changed: e.changed,
        })
    }

    /// Number of entries, including soft-canceled ones awaiting removal.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the registry holds no entries at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All ids in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<u32> {
        self.entries.keys().copied().collect()
    }

    /// Ids of active (not cancel-pending) entries, in ascending order.
    #[must_use]
    pub fn active_ids(&self) -> Vec<u32> {
        self.entries
            .iter()
            .filter(|(_, e)| e.active)
            .map(|(&id, _)| id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn register(id: u32, interval: u64, message: &str) -> AlarmRequest {
        AlarmRequest::register(id, interval, message).unwrap()
    }

    // =========================================================================
    // Insert and Merge
    // =========================================================================

    #[test]
    fn test_insert_then_lookup_returns_same_fields() {
        let mut registry = AlarmRegistry::new();
        let outcome = registry.insert_or_merge(&register(1, 5, "Hello")).unwrap();
        assert_eq!(outcome, MergeOutcome::Inserted);

        let entry = registry.lookup(1).unwrap();
        assert_eq!(entry.interval_seconds, 5);
        assert_eq!(entry.message, "Hello");
        assert!(entry.active);
        assert!(!entry.changed);
    }

    #[test]
    fn test_merge_updates_in_place_and_keeps_serial() {
        let mut registry = AlarmRegistry::new();
        registry.insert_or_merge(&register(2, 3, "A")).unwrap();
        let serial = registry.lookup(2).unwrap().serial;

        let outcome = registry.insert_or_merge(&register(2, 7, "B")).unwrap();
        assert_eq!(outcome, MergeOutcome::Merged);

        let entry = registry.lookup(2).unwrap();
        assert_eq!(entry.serial, serial);
        assert_eq!(entry.interval_seconds, 7);
        assert_eq!(entry.message, "B");
        assert!(entry.changed);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_insert_rejects_cancellation_request() {
        let mut registry = AlarmRegistry::new();
        let err = registry.insert_or_merge(&AlarmRequest::cancel(1)).unwrap_err();
        assert_eq!(
            err,
            RegistryError::WrongKind {
                kind: AlarmKind::Cancel
            }
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_insert_rejects_cancel_pending_id() {
        let mut registry = AlarmRegistry::new();
        registry.insert_or_merge(&register(4, 1, "m")).unwrap();
        registry.mark_for_cancel(4).unwrap();

        let err = registry.insert_or_merge(&register(4, 1, "again")).unwrap_err();
        assert_eq!(err, RegistryError::IdStillCancelPending { id: 4 });

        // The dying entry is untouched.
        let entry = registry.lookup(4).unwrap();
        assert_eq!(entry.message, "m");
        assert!(!entry.active);
    }

    #[test]
    fn test_reregistration_after_unlink_gets_fresh_serial() {
        let mut registry = AlarmRegistry::new();
        registry.insert_or_merge(&register(5, 1, "first")).unwrap();
        let old_serial = registry.lookup(5).unwrap().serial;

        registry.mark_for_cancel(5).unwrap();
        registry.unlink(5).unwrap();

        registry.insert_or_merge(&register(5, 1, "second")).unwrap();
        let new_serial = registry.lookup(5).unwrap().serial;
        assert!(new_serial > old_serial);
    }

    // =========================================================================
    // Cancellation
    // =========================================================================

    #[test]
    fn test_cancel_nonexistent_leaves_registry_unchanged() {
        let mut registry = AlarmRegistry::new();
        registry.insert_or_merge(&register(1, 5, "a")).unwrap();
        registry.insert_or_merge(&register(3, 5, "b")).unwrap();
        let before = registry.ids();

        let err = registry.mark_for_cancel(9).unwrap_err();
        assert_eq!(err, RegistryError::CancelNonexistent { id: 9 });
        assert_eq!(registry.ids(), before);
    }

    #[test]
    fn test_second_cancel_is_duplicate_and_first_sticks() {
        let mut registry = AlarmRegistry::new();
        registry.insert_or_merge(&register(3, 2, "X")).unwrap();

        registry.mark_for_cancel(3).unwrap();
        let err = registry.mark_for_cancel(3).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateCancel { id: 3 });

        // First cancellation's effect is unaffected.
        assert!(!registry.lookup(3).unwrap().active);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unlink_removes_entry_and_returns_message() {
        let mut registry = AlarmRegistry::new();
        registry.insert_or_merge(&register(6, 1, "bye")).unwrap();
        registry.mark_for_cancel(6).unwrap();

        assert_eq!(registry.unlink(6).as_deref(), Some("bye"));
        assert!(registry.lookup(6).is_none());
        assert_eq!(registry.unlink(6), None);
    }

    // =========================================================================
    // Dispatcher Scan Order
    // =========================================================================

    #[test]
    fn test_take_unprocessed_returns_pending_in_ascending_id_order() {
        let mut registry = AlarmRegistry::new();
        // Submitted out of id order.
        registry.insert_or_merge(&register(30, 1, "c")).unwrap();
        registry.insert_or_merge(&register(10, 1, "a")).unwrap();
        registry.insert_or_merge(&register(20, 1, "b")).unwrap();

        let mut seen = Vec::new();
        while let Some(Unprocessed::Registration { id, .. }) = registry.take_unprocessed() {
            seen.push(id);
        }
        assert_eq!(seen, vec![10, 20, 30]);
        assert!(registry.take_unprocessed().is_none());
    }

    #[test]
    fn test_take_unprocessed_prefers_registrations_over_cancellations() {
        let mut registry = AlarmRegistry::new();
        registry.insert_or_merge(&register(1, 1, "a")).unwrap();
        assert!(matches!(
            registry.take_unprocessed(),
            Some(Unprocessed::Registration { id: 1, .. })
        ));
        registry.mark_for_cancel(1).unwrap();
        registry.insert_or_merge(&register(2, 1, "b")).unwrap();

        // The new registration for id 2 is handled before id 1's removal.
        assert!(matches!(
            registry.take_unprocessed(),
            Some(Unprocessed::Registration { id: 2, .. })
        ));
        assert_eq!(
            registry.take_unprocessed(),
            Some(Unprocessed::Cancellation { id: 1 })
        );
    }

    #[test]
    fn test_cancellation_stays_unprocessed_until_unlinked() {
        let mut registry = AlarmRegistry::new();
        registry.insert_or_merge(&register(1, 1, "a")).unwrap();
        registry.take_unprocessed().unwrap();
        registry.mark_for_cancel(1).unwrap();

        // A cancellation is reported every scan until the unlink happens.
        assert_eq!(
            registry.take_unprocessed(),
            Some(Unprocessed::Cancellation { id: 1 })
        );
        assert_eq!(
            registry.take_unprocessed(),
            Some(Unprocessed::Cancellation { id: 1 })
        );
        registry.unlink(1).unwrap();
        assert!(registry.take_unprocessed().is_none());
    }

    // =========================================================================
    // Worker Observation
    // =========================================================================

    #[test]
    fn test_observe_live_entry() {
        let mut registry = AlarmRegistry::new();
        registry.insert_or_merge(&register(1, 5, "tick")).unwrap();
        let serial = registry.lookup(1).unwrap().serial;

        let view = registry.observe(1, serial);
        assert_eq!(
            view,
            WorkerView::Active {
                interval_seconds: 5,
                message: "tick".to_string(),
                changed: false,
            }
        );
    }

    #[test]
    fn test_observe_gone_after_cancel_or_unlink() {
        let mut registry = AlarmRegistry::new();
        registry.insert_or_merge(&register(1, 5, "tick")).unwrap();
        let serial = registry.lookup(1).unwrap().serial;

        registry.mark_for_cancel(1).unwrap();
        assert_eq!(registry.observe(1, serial), WorkerView::Gone);

        registry.unlink(1).unwrap();
        assert_eq!(registry.observe(1, serial), WorkerView::Gone);
    }

    #[test]
    fn test_observe_gone_on_serial_mismatch() {
        let mut registry = AlarmRegistry::new();
        registry.insert_or_merge(&register(1, 5, "old")).unwrap();
        let old_serial = registry.lookup(1).unwrap().serial;

        registry.mark_for_cancel(1).unwrap();
        registry.unlink(1).unwrap();
        registry.insert_or_merge(&register(1, 5, "new")).unwrap();

        // The old worker must not adopt the new registration.
        assert_eq!(registry.observe(1, old_serial), WorkerView::Gone);
    }

    #[test]
    fn test_acknowledge_change_clears_flag_for_matching_serial_only() {
        let mut registry = AlarmRegistry::new();
        registry.insert_or_merge(&register(1, 5, "a")).unwrap();
        let serial = registry.lookup(1).unwrap().serial;
        registry.insert_or_merge(&register(1, 5, "b")).unwrap();
        assert!(registry.lookup(1).unwrap().changed);

        registry.acknowledge_change(1, serial + 99);
        assert!(registry.lookup(1).unwrap().changed);

        registry.acknowledge_change(1, serial);
        assert!(!registry.lookup(1).unwrap().changed);
    }

    // =========================================================================
    // Ordering Invariant
    // =========================================================================

    proptest! {
        /// Active ids are strictly ascending after any sequence of inserts,
        /// including duplicates (which merge rather than duplicate).
        #[test]
        fn prop_ids_strictly_ascending(ids in proptest::collection::vec(0u32..500, 0..64)) {
            let mut registry = AlarmRegistry::new();
            for id in &ids {
                registry.insert_or_merge(&register(*id, 1, "m")).unwrap();
            }

            let listed = registry.ids();
            prop_assert!(listed.windows(2).all(|w| w[0] < w[1]));
            prop_assert_eq!(registry.active_ids(), listed);
        }
    }
}
