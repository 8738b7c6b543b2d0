//! The per-worker replica engine.

use std::fmt;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, ThreadId};

use crate::config::EngineConfig;
use crate::dispatch::{replicate_in, Replicable};
use crate::merge::{absorb_all, lock_source, Absorb, MergeOutcome, MergeSources};
use crate::slot_map::SlotMap;
use crate::store::{Replica, ReplicaStore};
use crate::ReplicaError;

/// Makes instances of `T` private to each worker, lazily.
///
/// Every worker identity (by default the calling thread's [`ThreadId`]) is
/// assigned its own slot on first access, and gets a replica duplicated from
/// the model the first time that slot is used. Workers then mutate their
/// replica without coordinating with each other. Once the parallel phase is
/// over, the replicas are folded together with [`merge`](Self::merge) (once,
/// into slot 0) or [`snapshot_merge`](Self::snapshot_merge) (any number of
/// times, into a fresh instance).
///
/// # Example
///
/// ```
/// use replica_kit::{Counter, Replicated};
///
/// let counts = Replicated::new(Counter::new());
///
/// std::thread::scope(|s| {
///     for n in 1..=4 {
///         let counts = &counts;
///         s.spawn(move || {
///             let mine = counts.get().unwrap();
///             for _ in 0..n {
///                 mine.lock().increment();
///             }
///         });
///     }
/// });
///
/// let total = counts.merge().into_inner();
/// assert_eq!(total.lock().value(), 10);
/// ```
///
/// [`get`](Self::get) looks up the caller's slot on every call; fetch the
/// handle once and reuse it inside hot loops.
pub struct Replicated<T: Replicable, I = ThreadId> {
    slots: SlotMap<I>,
    store: ReplicaStore<T>,
    /// Set once a one-shot merge has completed. Never cleared.
    merged: AtomicBool,
    /// Set while a one-shot merge is running.
    merging: AtomicBool,
}

/// Releases the running-merge claim, also when the reduction panics.
struct MergeClaim<'a>(&'a AtomicBool);

impl Drop for MergeClaim<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<T: Replicable> Replicated<T> {
    /// Wrap `model` with the default capacity, `max(64, available_parallelism)`.
    pub fn new(model: T) -> Self {
        Self::from_fn(move || model)
    }

    /// Like [`new`](Self::new), but build the model inside slot 0's context.
    ///
    /// Use this for [`Managed`](crate::Managed) types so the model's own
    /// registration does not collide with anything outside the engine.
    pub fn from_fn<F: FnOnce() -> T>(make: F) -> Self {
        let capacity = EngineConfig::default()
            .effective_capacity()
            .ok()
            .and_then(NonZeroUsize::new)
            .unwrap_or(NonZeroUsize::MIN);
        Self::from_parts(capacity, ReplicaStore::new(capacity, make))
    }

    /// Wrap `model` with exactly `capacity` slots.
    pub fn with_capacity(capacity: usize, model: T) -> Result<Self, ReplicaError> {
        Self::keyed(&EngineConfig::default().with_capacity(capacity), move || model)
    }

    /// Build from an explicit configuration.
    pub fn with_config<F: FnOnce() -> T>(
        config: &EngineConfig,
        make: F,
    ) -> Result<Self, ReplicaError> {
        Self::keyed(config, make)
    }

    /// The calling thread's replica, built on first use.
    pub fn get(&self) -> Result<Replica<T>, ReplicaError> {
        self.get_for(&thread::current().id())
    }

    /// Run `f` on the calling thread's replica.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R, ReplicaError> {
        let replica = self.get()?;
        let mut guard = replica.lock();
        Ok(f(&mut *guard))
    }
}

impl<T: Replicable, I: Eq + Hash + Clone> Replicated<T, I> {
    /// Build an engine whose workers are identified by `I` instead of the
    /// thread id.
    ///
    /// ```
    /// use replica_kit::{EngineConfig, Replicated};
    ///
    /// let per_task: Replicated<u64, &str> =
    ///     Replicated::keyed(&EngineConfig::default().with_capacity(2), || 0).unwrap();
    /// *per_task.get_for(&"parse").unwrap().lock() += 3;
    /// assert_eq!(per_task.assigned_slots(), 1);
    /// ```
    pub fn keyed<F: FnOnce() -> T>(config: &EngineConfig, make: F) -> Result<Self, ReplicaError> {
        let capacity =
            NonZeroUsize::new(config.effective_capacity()?).ok_or(ReplicaError::ZeroCapacity)?;
        Ok(Self::from_parts(capacity, ReplicaStore::new(capacity, make)))
    }

    fn from_parts(capacity: NonZeroUsize, store: ReplicaStore<T>) -> Self {
        Self {
            slots: SlotMap::new(capacity.get()),
            store,
            merged: AtomicBool::new(false),
            merging: AtomicBool::new(false),
        }
    }

    /// The replica of `identity`, assigning it a slot first if needed.
    ///
    /// Not meant for tight loops: every call repeats the slot lookup.
    pub fn get_for(&self, identity: &I) -> Result<Replica<T>, ReplicaError> {
        let slot = self.slots.resolve(identity)?;
        self.store.get_checked(slot)
    }

    /// The slot assigned to `identity`, if any.
    #[must_use]
    pub fn slot_of(&self, identity: &I) -> Option<usize> {
        self.slots.lookup(identity)
    }

    /// The replica at `slot`, built on first use.
    ///
    /// Two workers must not call this concurrently with the same `slot`;
    /// callers that bypass [`get_for`](Self::get_for) own that guarantee.
    pub fn get_at_slot(&self, slot: usize) -> Result<Replica<T>, ReplicaError> {
        self.store.get_checked(slot)
    }

    /// Whatever is stored at `slot`, without building it.
    ///
    /// Returns `None` if the slot was never populated.
    ///
    /// # Panics
    ///
    /// Panics if `slot >= capacity`.
    #[must_use]
    pub fn get_at_slot_unchecked(&self, slot: usize) -> Option<Replica<T>> {
        self.store.get_unchecked(slot)
    }

    /// Store `replica` at `slot`, replacing what was there.
    pub fn set_at_slot(&self, slot: usize, replica: Replica<T>) -> Result<(), ReplicaError> {
        self.store.set(slot, replica)
    }

    /// Fold every replica into slot 0 with [`Absorb`], once.
    pub fn merge(&self) -> MergeOutcome<Replica<T>>
    where
        T: Absorb,
    {
        self.merge_with(absorb_all)
    }

    /// Fold every replica into slot 0 with `reduction`, once.
    ///
    /// Slot 0 is built from the model if nobody used it. Later calls do not
    /// run their reduction; they log a warning and return the slot 0
    /// aggregate as [`MergeOutcome::AlreadyMerged`].
    ///
    /// No worker may still be mutating its replica while this runs. A merge
    /// started while another one is running (from a second thread, or from
    /// inside the reduction) does not wait for it: it returns slot 0 as
    /// [`MergeOutcome::AlreadyMerged`] straight away.
    ///
    /// # Panics
    ///
    /// Panics if slot 0 or any source replica is locked elsewhere, for
    /// example by a guard the caller still holds. A panic leaves the engine
    /// unmerged.
    pub fn merge_with<F>(&self, reduction: F) -> MergeOutcome<Replica<T>>
    where
        F: FnOnce(&mut T, &MergeSources<T>),
    {
        if self.merged.load(Ordering::Acquire) {
            return self.already_merged();
        }
        if self
            .merging
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!(
                target: "replica_kit::merge",
                engine_index = self.store.engine_index(),
                "this object is being merged, returning the merge target"
            );
            return MergeOutcome::AlreadyMerged(self.store.first());
        }
        let _claim = MergeClaim(&self.merging);
        // Another merge may have finished between the two checks.
        if self.merged.load(Ordering::Acquire) {
            return self.already_merged();
        }

        let target = self.store.first();
        let sources = MergeSources::new(self.store.snapshot(), Some(&target), Some(0));
        {
            let mut aggregate = lock_source(0, &target);
            reduction(&mut *aggregate, &sources);
        }
        self.merged.store(true, Ordering::Release);

        tracing::debug!(
            target: "replica_kit::merge",
            engine_index = self.store.engine_index(),
            sources = sources.populated(),
            "merged replicas into slot 0"
        );
        MergeOutcome::Merged(target)
    }

    fn already_merged(&self) -> MergeOutcome<Replica<T>> {
        tracing::warn!(
            target: "replica_kit::merge",
            engine_index = self.store.engine_index(),
            "this object was already merged, returning the previous result"
        );
        MergeOutcome::AlreadyMerged(self.store.first())
    }

    /// Fold every replica into a fresh instance with [`Absorb`].
    pub fn snapshot_merge(&self) -> MergeOutcome<T>
    where
        T: Absorb,
    {
        self.snapshot_merge_with(absorb_all)
    }

    /// Fold every replica into a fresh duplicate of the model with
    /// `reduction`, leaving all slots untouched.
    ///
    /// May be called any number of times. After a one-shot
    /// [`merge`](Self::merge) the reduction is skipped and a duplicate of the
    /// slot 0 aggregate is returned as [`MergeOutcome::AlreadyMerged`].
    ///
    /// # Panics
    ///
    /// Panics if a replica it has to read is locked elsewhere, for example
    /// by a guard the caller still holds.
    pub fn snapshot_merge_with<F>(&self, reduction: F) -> MergeOutcome<T>
    where
        F: FnOnce(&mut T, &MergeSources<T>),
    {
        if self.merged.load(Ordering::Acquire) {
            tracing::warn!(
                target: "replica_kit::merge",
                engine_index = self.store.engine_index(),
                "this object was already merged, returning a copy of the previous result"
            );
            let aggregate = self.store.first();
            let copy = replicate_in(&*lock_source(0, &aggregate), None);
            return MergeOutcome::AlreadyMerged(copy);
        }

        let mut target = self.store.duplicate_model();
        let sources = MergeSources::new(self.store.snapshot(), None, None);
        reduction(&mut target, &sources);

        tracing::debug!(
            target: "replica_kit::merge",
            engine_index = self.store.engine_index(),
            sources = sources.populated(),
            "snapshot merge"
        );
        MergeOutcome::Merged(target)
    }
}

impl<T: Replicable, I> Replicated<T, I> {
    /// Number of slots, fixed at construction.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    /// Number of identities that have been given a slot.
    #[must_use]
    pub fn assigned_slots(&self) -> usize {
        self.slots.assigned()
    }

    /// Number of slots currently holding a replica.
    #[must_use]
    pub fn populated_slots(&self) -> usize {
        self.store.populated()
    }

    /// Returns `true` once a one-shot merge has completed.
    ///
    /// Never blocks, and stays `false` while a merge is still running.
    #[must_use]
    pub fn is_merged(&self) -> bool {
        self.merged.load(Ordering::Acquire)
    }

    /// Program-unique index of this engine.
    #[must_use]
    pub fn engine_index(&self) -> u64 {
        self.store.engine_index()
    }

    /// The prototype replicas are duplicated from.
    #[must_use]
    pub fn model(&self) -> &T {
        self.store.model()
    }
}

impl<T: Replicable + fmt::Debug, I> fmt::Debug for Replicated<T, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "A wrapper to make object instances thread private, lazily. \
             The model which is replicated is {:?}",
            self.store.model()
        )
    }
}
