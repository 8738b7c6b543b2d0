//! Fixed-capacity slot storage with lazy replica construction.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parking_lot::{Mutex, MutexGuard};

use crate::dispatch::{next_engine_index, replicate_in, Placement, Replicable};
use crate::ReplicaError;

type ContextOf<T> = <<T as Replicable>::Placement as Placement<T>>::Context;

/// Shared handle to one slot's replica.
///
/// Handles are cheap to clone and may outlive the engine that produced them.
/// The replica is only ever meant to be mutated by the worker owning the
/// slot, so [`lock`](Replica::lock) is uncontended in normal use.
pub struct Replica<T> {
    inner: Arc<Mutex<T>>,
}

impl<T> Replica<T> {
    /// Wrap a value so it can be stored in a slot with
    /// [`set_at_slot`](crate::Replicated::set_at_slot).
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(value)),
        }
    }

    /// Borrow the replica mutably.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock()
    }

    /// Borrow the replica mutably if nobody else holds it.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        self.inner.try_lock()
    }

    /// Returns `true` if both handles refer to the same replica instance.
    #[must_use]
    pub fn ptr_eq(&self, other: &Replica<T>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Take the value out if this is the last handle to it.
    pub fn try_unwrap(self) -> Result<T, Self> {
        Arc::try_unwrap(self.inner)
            .map(Mutex::into_inner)
            .map_err(|inner| Self { inner })
    }
}

impl<T> Clone for Replica<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Replica<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_lock() {
            Some(value) => f.debug_tuple("Replica").field(&*value).finish(),
            None => f.write_str("Replica(<locked>)"),
        }
    }
}

/// Slot-indexed optional replicas built lazily from a model.
///
/// Lazy construction happens without any lock. Two workers passing the same
/// slot to [`get_checked`](ReplicaStore::get_checked) at the same time is a
/// misuse; if it happens anyway both still receive the one instance that
/// ended up stored.
pub struct ReplicaStore<T: Replicable> {
    engine_index: u64,
    model: T,
    slots: Box<[ArcSwapOption<Mutex<T>>]>,
    contexts: Vec<Option<ContextOf<T>>>,
}

impl<T: Replicable> ReplicaStore<T> {
    /// Build a store of `capacity` empty slots. The model is produced by
    /// `make` inside slot 0's context.
    pub fn new<F: FnOnce() -> T>(capacity: NonZeroUsize, make: F) -> Self {
        let capacity = capacity.get();
        let engine_index = next_engine_index();
        let contexts = <T::Placement as Placement<T>>::contexts(engine_index, capacity);
        let model =
            <T::Placement as Placement<T>>::place(contexts.first().and_then(Option::as_ref), make);
        let slots = (0..capacity).map(|_| ArcSwapOption::empty()).collect();

        tracing::debug!(
            target: "replica_kit::store",
            engine_index,
            capacity,
            "replica store created"
        );
        Self {
            engine_index,
            model,
            slots,
            contexts,
        }
    }

    /// Number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Program-unique index of this store.
    #[must_use]
    pub fn engine_index(&self) -> u64 {
        self.engine_index
    }

    /// The prototype every replica is duplicated from.
    #[must_use]
    pub fn model(&self) -> &T {
        &self.model
    }

    /// Return the replica at `slot`, building it from the model first if the
    /// slot is empty.
    pub fn get_checked(&self, slot: usize) -> Result<Replica<T>, ReplicaError> {
        if slot >= self.slots.len() {
            tracing::warn!(
                target: "replica_kit::store",
                slot,
                capacity = self.slots.len(),
                "maximum number of slots reached"
            );
            return Err(ReplicaError::SlotOutOfRange {
                slot,
                capacity: self.slots.len(),
            });
        }
        Ok(self.get_or_build(slot))
    }

    /// Return whatever is stored at `slot`, without building anything.
    ///
    /// # Panics
    ///
    /// Panics if `slot >= capacity`.
    #[must_use]
    pub fn get_unchecked(&self, slot: usize) -> Option<Replica<T>> {
        self.slots[slot].load_full().map(|inner| Replica { inner })
    }

    /// Replace the replica stored at `slot`.
    pub fn set(&self, slot: usize, replica: Replica<T>) -> Result<(), ReplicaError> {
        let cell = self.slots.get(slot).ok_or(ReplicaError::SlotOutOfRange {
            slot,
            capacity: self.slots.len(),
        })?;
        cell.store(Some(replica.inner));
        Ok(())
    }

    /// The replica at slot 0, built if needed.
    pub(crate) fn first(&self) -> Replica<T> {
        self.get_or_build(0)
    }

    /// A fresh duplicate of the model, built outside any slot context.
    pub(crate) fn duplicate_model(&self) -> T {
        replicate_in(&self.model, None)
    }

    /// Current content of every slot, in slot order.
    pub(crate) fn snapshot(&self) -> Vec<Option<Replica<T>>> {
        self.slots
            .iter()
            .map(|cell| cell.load_full().map(|inner| Replica { inner }))
            .collect()
    }

    /// Number of slots currently holding a replica.
    #[must_use]
    pub fn populated(&self) -> usize {
        self.slots
            .iter()
            .filter(|cell| cell.load().is_some())
            .count()
    }

    fn get_or_build(&self, slot: usize) -> Replica<T> {
        let cell = &self.slots[slot];
        if let Some(inner) = cell.load_full() {
            return Replica { inner };
        }

        let context = self.contexts.get(slot).and_then(Option::as_ref);
        let built = Arc::new(Mutex::new(replicate_in(&self.model, context)));
        let previous = cell.compare_and_swap(&None::<Arc<Mutex<T>>>, Some(Arc::clone(&built)));
        match &*previous {
            None => {
                tracing::debug!(
                    target: "replica_kit::store",
                    engine_index = self.engine_index,
                    slot,
                    "replica built"
                );
                Replica { inner: built }
            }
            // Lost a same-slot race; hand out the stored instance.
            Some(stored) => Replica {
                inner: Arc::clone(stored),
            },
        }
    }
}

impl<T: Replicable> Drop for ReplicaStore<T> {
    fn drop(&mut self) {
        <T::Placement as Placement<T>>::release(self.engine_index, &self.contexts);
    }
}

impl<T: Replicable> fmt::Debug for ReplicaStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicaStore")
            .field("engine_index", &self.engine_index)
            .field("capacity", &self.capacity())
            .field("populated", &self.populated())
            .finish_non_exhaustive()
    }
}
