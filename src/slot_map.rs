//! Identity to slot assignment.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use parking_lot::Mutex;

use crate::ReplicaError;

struct Assignments<I> {
    slots: HashMap<I, usize>,
    next_free: usize,
}

/// Assigns each distinct identity a slot in `[0, capacity)` on first sight.
///
/// Assignments are append-only: once an identity has a slot it keeps it for
/// the lifetime of the map, and no other identity ever receives that slot.
/// The lock only covers the lookup or insert itself.
pub struct SlotMap<I> {
    capacity: usize,
    assignments: Mutex<Assignments<I>>,
}

impl<I: Eq + Hash + Clone> SlotMap<I> {
    /// Create a map able to hand out `capacity` slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            assignments: Mutex::new(Assignments {
                slots: HashMap::new(),
                next_free: 0,
            }),
        }
    }

    /// Return the slot of `identity`, assigning the next free one if this is
    /// the first time it is seen.
    ///
    /// Fails with [`ReplicaError::CapacityExceeded`] once every slot is taken;
    /// the failed identity is not recorded, so later calls fail the same way.
    pub fn resolve(&self, identity: &I) -> Result<usize, ReplicaError> {
        let mut assignments = self.assignments.lock();
        if let Some(&slot) = assignments.slots.get(identity) {
            return Ok(slot);
        }
        if assignments.next_free >= self.capacity {
            drop(assignments);
            tracing::warn!(
                target: "replica_kit::slots",
                capacity = self.capacity,
                "maximum number of slots reached"
            );
            return Err(ReplicaError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        let slot = assignments.next_free;
        assignments.next_free += 1;
        assignments.slots.insert(identity.clone(), slot);
        drop(assignments);

        tracing::debug!(target: "replica_kit::slots", slot, "assigned slot");
        Ok(slot)
    }

    /// The slot of `identity`, if it has one. Never assigns.
    #[must_use]
    pub fn lookup(&self, identity: &I) -> Option<usize> {
        self.assignments.lock().slots.get(identity).copied()
    }
}

impl<I> SlotMap<I> {
    /// Number of slots this map can hand out.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of slots handed out so far.
    #[must_use]
    pub fn assigned(&self) -> usize {
        self.assignments.lock().next_free
    }
}

impl<I> fmt::Debug for SlotMap<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotMap")
            .field("capacity", &self.capacity)
            .field("assigned", &self.assigned())
            .finish()
    }
}
