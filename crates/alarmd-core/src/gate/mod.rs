//! Mutual exclusion over the alarm registry.
//!
//! Every thread that touches the registry — producer, dispatcher, workers —
//! must hold a [`GatePass`] for the duration of the access. [`Gate::enter`]
//! blocks until the registry is free and returns the pass; dropping the pass
//! leaves the gate. Because the pass is the only path to the registry,
//! unguarded access and unpaired enter/exit are unrepresentable.
//!
//! The gate serializes whole critical sections, not individual reads: a
//! burst of concurrent entrants is handled one at a time in lock-acquisition
//! order, which is what keeps ordered inserts and flag updates from losing
//! each other's writes.
//!
//! Passes are short-lived by convention: callers take a snapshot or apply a
//! mutation and drop the pass before printing or sleeping, so a sleeping
//! worker never holds the gate.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard};

use crate::registry::AlarmRegistry;

/// The gate guarding the shared [`AlarmRegistry`].
#[derive(Debug, Default)]
pub struct Gate {
    registry: Mutex<AlarmRegistry>,
}

impl Gate {
    /// Creates a gate around the given registry.
    #[must_use]
    pub fn new(registry: AlarmRegistry) -> Self {
        Self {
            registry: Mutex::new(registry),
        }
    }

    /// Enters the gate, blocking until the registry is free.
    ///
    /// # Panics
    ///
    /// Panics if a previous holder panicked while inside the gate; the
    /// registry's invariants can no longer be trusted at that point.
    #[must_use]
    pub fn enter(&self) -> GatePass<'_> {
        GatePass {
            guard: self.registry.lock().expect("gate poisoned"),
        }
    }
}

/// Proof of gate entry; derefs to the registry. Dropping the pass leaves
/// the gate.
pub struct GatePass<'a> {
    guard: MutexGuard<'a, AlarmRegistry>,
}

impl Deref for GatePass<'_> {
    type Target = AlarmRegistry;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl DerefMut for GatePass<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

impl fmt::Debug for GatePass<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatePass").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::request::AlarmRequest;

    #[test]
    fn test_enter_gives_registry_access() {
        let gate = Gate::new(AlarmRegistry::new());
        let req = AlarmRequest::register(1, 5, "m").unwrap();
        gate.enter().insert_or_merge(&req).unwrap();
        assert_eq!(gate.enter().len(), 1);
    }

    #[test]
    fn test_concurrent_inserts_are_not_lost() {
        let gate = Arc::new(Gate::new(AlarmRegistry::new()));
        let threads: Vec<_> = (0..8u32)
            .map(|t| {
                let gate = Arc::clone(&gate);
                thread::spawn(move || {
                    for i in 0..50u32 {
                        let id = t * 50 + i;
                        let req = AlarmRequest::register(id, 1, "m").unwrap();
                        gate.enter().insert_or_merge(&req).unwrap();
                    }
                })
            })
            .collect();
        for handle in threads {
            handle.join().unwrap();
        }

        let pass = gate.enter();
        assert_eq!(pass.len(), 400);
        let ids = pass.ids();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }
}
