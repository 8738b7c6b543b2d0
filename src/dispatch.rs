//! Per-type choice of how replicas are produced.
//!
//! Two independent decisions are fixed for each replicated type through
//! [`Replicable`]:
//!
//! - **Duplication**: [`ByClone`] for `Clone` types, [`ByReplicate`] for
//!   types that only offer an explicit [`Replicate::replicate`].
//! - **Placement**: [`Unmanaged`] for plain values, [`Managed`] for
//!   [`Registered`] types, which get a private namespace per slot and are
//!   detached once built.
//!
//! Both are associated types, so the choice costs nothing at run time.
//!
//! ```
//! use replica_kit::{ByReplicate, Replicable, Replicate, Unmanaged};
//!
//! struct Scratch {
//!     buf: Vec<u8>,
//! }
//!
//! impl Replicate for Scratch {
//!     fn replicate(&self) -> Self {
//!         Scratch { buf: Vec::with_capacity(self.buf.capacity()) }
//!     }
//! }
//!
//! impl Replicable for Scratch {
//!     type Duplication = ByReplicate;
//!     type Placement = Unmanaged;
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::registry::{Catalog, Namespace, Registered};

/// Fixes how values of a type are replicated. See the [module docs](self).
pub trait Replicable: Sized {
    /// How a replica is duplicated from its source.
    type Duplication: Duplicate<Self>;
    /// Whether replicas need a per-slot namespace and detaching.
    type Placement: Placement<Self>;
}

/// Explicit self-duplication, for types that cannot or should not be `Clone`.
pub trait Replicate {
    /// Produce an independent copy of `self`.
    fn replicate(&self) -> Self;
}

/// A duplication strategy for `T`.
pub trait Duplicate<T> {
    /// Build a new, independent `T` from `source`.
    fn duplicate(source: &T) -> T;
}

/// Duplicate with [`Clone::clone`].
#[derive(Debug)]
pub enum ByClone {}

impl<T: Clone> Duplicate<T> for ByClone {
    #[inline]
    fn duplicate(source: &T) -> T {
        source.clone()
    }
}

/// Duplicate with [`Replicate::replicate`].
#[derive(Debug)]
pub enum ByReplicate {}

impl<T: Replicate> Duplicate<T> for ByReplicate {
    #[inline]
    fn duplicate(source: &T) -> T {
        source.replicate()
    }
}

/// Where a freshly built replica lives.
pub trait Placement<T> {
    /// Per-slot isolation scope.
    type Context: Send + Sync;

    /// Build one optional context per slot, eagerly, at engine construction.
    fn contexts(engine_index: u64, capacity: usize) -> Vec<Option<Self::Context>>;

    /// Run `make` inside `context` and prepare its result for private use.
    fn place<F: FnOnce() -> T>(context: Option<&Self::Context>, make: F) -> T;

    /// Tear down the contexts of an engine that is going away.
    fn release(_engine_index: u64, _contexts: &[Option<Self::Context>]) {}
}

/// Plain values: no context, nothing to detach.
#[derive(Debug)]
pub enum Unmanaged {}

impl<T> Placement<T> for Unmanaged {
    type Context = ();

    fn contexts(_engine_index: u64, capacity: usize) -> Vec<Option<()>> {
        vec![None; capacity]
    }

    #[inline]
    fn place<F: FnOnce() -> T>(_context: Option<&()>, make: F) -> T {
        make()
    }
}

/// Registered values: built inside the slot's namespace, then detached.
#[derive(Debug)]
pub enum Managed {}

impl<T: Registered> Placement<T> for Managed {
    type Context = Namespace;

    fn contexts(engine_index: u64, capacity: usize) -> Vec<Option<Namespace>> {
        let catalog = Catalog::global();
        (0..capacity)
            .map(|slot| Some(catalog.mkdir(&namespace_name(engine_index, slot))))
            .collect()
    }

    fn place<F: FnOnce() -> T>(context: Option<&Namespace>, make: F) -> T {
        let mut obj = {
            let _scope = context.map(Namespace::enter);
            make()
        };
        obj.detach();
        obj
    }

    fn release(engine_index: u64, contexts: &[Option<Namespace>]) {
        let catalog = Catalog::global();
        for slot in 0..contexts.len() {
            catalog.remove(&namespace_name(engine_index, slot));
        }
    }
}

/// Name of the private namespace of `slot` in engine `engine_index`.
#[must_use]
pub fn namespace_name(engine_index: u64, slot: usize) -> String {
    format!("__replicated_ns_{engine_index}_{slot}")
}

/// Hand out the next engine index. Indices are unique for the lifetime of
/// the program.
pub fn next_engine_index() -> u64 {
    static NEXT_ENGINE_INDEX: AtomicU64 = AtomicU64::new(0);
    NEXT_ENGINE_INDEX.fetch_add(1, Ordering::Relaxed)
}

/// Duplicate `source` the way `T` says, inside `context`.
pub(crate) fn replicate_in<T: Replicable>(
    source: &T,
    context: Option<&<T::Placement as Placement<T>>::Context>,
) -> T {
    <T::Placement as Placement<T>>::place(context, || {
        <T::Duplication as Duplicate<T>>::duplicate(source)
    })
}

/// Implement [`Replicable`] with [`ByClone`] and [`Unmanaged`] for the
/// listed types.
///
/// ```
/// #[derive(Clone)]
/// struct Tally(u32);
///
/// replica_kit::replicable_by_clone!(Tally);
/// ```
#[macro_export]
macro_rules! replicable_by_clone {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::Replicable for $ty {
                type Duplication = $crate::ByClone;
                type Placement = $crate::Unmanaged;
            }
        )+
    };
}

replicable_by_clone!(
    bool, char, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64,
    String
);

impl<T: Clone> Replicable for Vec<T> {
    type Duplication = ByClone;
    type Placement = Unmanaged;
}

impl<K: Clone + Ord, V: Clone> Replicable for BTreeMap<K, V> {
    type Duplication = ByClone;
    type Placement = Unmanaged;
}

impl<K: Clone + Eq + Hash, V: Clone, S: Clone + BuildHasher> Replicable for HashMap<K, V, S> {
    type Duplication = ByClone;
    type Placement = Unmanaged;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::current_namespace;

    struct Token {
        generation: u32,
    }

    impl Replicate for Token {
        fn replicate(&self) -> Self {
            Token {
                generation: self.generation + 1,
            }
        }
    }

    impl Replicable for Token {
        type Duplication = ByReplicate;
        type Placement = Unmanaged;
    }

    /// Registers into whatever scope is current when built.
    struct Tagged {
        home: Option<Namespace>,
    }

    impl Clone for Tagged {
        fn clone(&self) -> Self {
            let home = current_namespace();
            if let Some(ns) = &home {
                ns.register("tagged");
            }
            Tagged { home }
        }
    }

    impl Registered for Tagged {
        fn namespace(&self) -> Option<Namespace> {
            self.home.clone()
        }

        fn detach(&mut self) {
            if let Some(ns) = self.home.take() {
                ns.unregister("tagged");
            }
        }
    }

    impl Replicable for Tagged {
        type Duplication = ByClone;
        type Placement = Managed;
    }

    #[test]
    fn clone_types_are_copied() {
        let v = vec![1, 2, 3];
        assert_eq!(replicate_in(&v, None), v);
        assert_eq!(replicate_in(&7u64, Some(&())), 7);
    }

    #[test]
    fn explicit_replicate_is_used() {
        let token = Token { generation: 0 };
        assert_eq!(replicate_in(&token, None).generation, 1);
    }

    #[test]
    fn unmanaged_contexts_are_absent() {
        let contexts = <Unmanaged as Placement<u32>>::contexts(0, 5);
        assert_eq!(contexts.len(), 5);
        assert!(contexts.iter().all(Option::is_none));
    }

    #[test]
    fn managed_replica_is_built_in_context_then_detached() {
        let ns = Namespace::new("slot");
        let original = Tagged { home: None };

        let copy = replicate_in(&original, Some(&ns));
        assert!(copy.namespace().is_none());
        assert!(ns.is_empty());
        assert!(current_namespace().is_none());
    }

    #[test]
    fn managed_contexts_are_listed_and_released() {
        let index = next_engine_index();
        let contexts = <Managed as Placement<Tagged>>::contexts(index, 3);
        assert!(contexts.iter().all(Option::is_some));
        assert!(Catalog::global().get(&namespace_name(index, 2)).is_some());

        <Managed as Placement<Tagged>>::release(index, &contexts);
        assert!(Catalog::global().get(&namespace_name(index, 0)).is_none());
    }

    #[test]
    fn engine_indices_are_unique() {
        let a = next_engine_index();
        let b = next_engine_index();
        assert_ne!(a, b);
    }
}
