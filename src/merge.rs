//! Folding per-slot replicas into one aggregate.
//!
//! A reduction is any `FnOnce(&mut T, &MergeSources<T>)`: it receives the
//! target and a view of every slot, and folds the slots it cares about into
//! the target in place. [`absorb_all`] is the default reduction.

use std::collections::BTreeMap;

use parking_lot::MutexGuard;

use crate::Replica;

/// Folding another value of the same type into `self`.
///
/// The default reduction calls this once per populated slot, in ascending
/// slot order. Implementations should be associative; if they are not, the
/// fixed order still makes the result reproducible.
pub trait Absorb {
    /// Fold `other` into `self`.
    fn absorb(&mut self, other: &Self);
}

/// Read access to every slot's replica during a merge.
///
/// Slots that are empty, and slots holding the merge target itself, are
/// reported as absent. Replicas are locked one at a time as they are
/// visited, without waiting: a replica still locked by its worker (or by the
/// caller) when the merge reaches it is a usage error and panics instead of
/// blocking forever.
pub struct MergeSources<T> {
    slots: Vec<Option<Replica<T>>>,
    target_slot: Option<usize>,
}

impl<T> MergeSources<T> {
    pub(crate) fn new(
        mut slots: Vec<Option<Replica<T>>>,
        target: Option<&Replica<T>>,
        target_slot: Option<usize>,
    ) -> Self {
        if let Some(target) = target {
            for entry in &mut slots {
                if entry.as_ref().is_some_and(|r| r.ptr_eq(target)) {
                    *entry = None;
                }
            }
        }
        Self { slots, target_slot }
    }

    /// Total number of slots, populated or not.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// The slot the target came from, or `None` for a snapshot target.
    #[must_use]
    pub fn target_slot(&self) -> Option<usize> {
        self.target_slot
    }

    /// Number of slots a reduction can read.
    #[must_use]
    pub fn populated(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Lock and return the replica at `slot`, if it is readable.
    ///
    /// # Panics
    ///
    /// Panics if the replica is locked elsewhere.
    pub fn get(&self, slot: usize) -> Option<MutexGuard<'_, T>> {
        self.slots
            .get(slot)?
            .as_ref()
            .map(|replica| lock_source(slot, replica))
    }

    /// Visit readable slots in ascending order.
    ///
    /// # Panics
    ///
    /// Panics when it reaches a replica that is locked elsewhere.
    pub fn iter(&self) -> impl Iterator<Item = (usize, MutexGuard<'_, T>)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| entry.as_ref().map(|r| (slot, lock_source(slot, r))))
    }
}

pub(crate) fn lock_source<T>(slot: usize, replica: &Replica<T>) -> MutexGuard<'_, T> {
    match replica.try_lock() {
        Some(guard) => guard,
        None => panic!("replica at slot {slot} is still locked, release it before merging"),
    }
}

/// Default reduction: absorb every readable slot into `target`, in
/// ascending slot order.
///
/// # Panics
///
/// Panics if a source replica is locked elsewhere.
pub fn absorb_all<T: Absorb>(target: &mut T, sources: &MergeSources<T>) {
    for (_, other) in sources.iter() {
        target.absorb(&other);
    }
}

/// Result of a merge call.
#[derive(Debug)]
#[must_use]
pub enum MergeOutcome<R> {
    /// The reduction ran and produced this aggregate.
    Merged(R),
    /// A one-shot merge had already happened; the reduction did not run.
    AlreadyMerged(R),
}

impl<R> MergeOutcome<R> {
    /// Returns `true` if the reduction was skipped.
    #[must_use]
    pub fn is_already_merged(&self) -> bool {
        matches!(self, Self::AlreadyMerged(_))
    }

    /// Borrow the aggregate.
    #[must_use]
    pub fn get(&self) -> &R {
        match self {
            Self::Merged(r) | Self::AlreadyMerged(r) => r,
        }
    }

    /// Take the aggregate, whichever way it was obtained.
    pub fn into_inner(self) -> R {
        match self {
            Self::Merged(r) | Self::AlreadyMerged(r) => r,
        }
    }
}

macro_rules! absorb_by_add {
    ($($ty:ty),+) => {
        $(
            impl Absorb for $ty {
                #[inline]
                fn absorb(&mut self, other: &Self) {
                    *self += *other;
                }
            }
        )+
    };
}

absorb_by_add!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64);

impl<T: Clone> Absorb for Vec<T> {
    fn absorb(&mut self, other: &Self) {
        self.extend_from_slice(other);
    }
}

impl<K: Ord + Clone, V: Absorb + Clone> Absorb for BTreeMap<K, V> {
    fn absorb(&mut self, other: &Self) {
        for (key, value) in other {
            self.entry(key.clone())
                .and_modify(|mine| mine.absorb(value))
                .or_insert_with(|| value.clone());
        }
    }
}
