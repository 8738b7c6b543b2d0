//! # replica-kit
//!
//! Lazy per-worker replicas of expensive, not necessarily thread-safe
//! objects, folded back into one result at the end.
//!
//! Each worker (by default: each thread) that asks a [`Replicated`] engine
//! for its object is assigned a slot and receives a private replica,
//! duplicated from a shared model the first time the slot is used. Workers
//! mutate their replicas freely. Afterwards a single caller reduces all
//! replicas into one aggregate.
//!
//! ## Quick Start
//!
//! ```
//! use replica_kit::prelude::*;
//!
//! let hits = Replicated::new(Counter::new());
//!
//! std::thread::scope(|s| {
//!     for _ in 0..4 {
//!         s.spawn(|| {
//!             // Fetch the handle once, then reuse it.
//!             let mine = hits.get().unwrap();
//!             for _ in 0..100 {
//!                 mine.lock().increment();
//!             }
//!         });
//!     }
//! });
//!
//! // Repeatable: builds a new aggregate, slots stay as they are.
//! assert_eq!(hits.snapshot_merge().into_inner().value(), 400);
//!
//! // One-shot: folds everything into slot 0.
//! let total = hits.merge().into_inner();
//! assert_eq!(total.lock().value(), 400);
//! ```
//!
//! ## Building blocks
//!
//! - [`SlotMap`] - identity to slot assignment, bounded by the capacity
//! - [`ReplicaStore`] - lazily populated slots of [`Replica`] handles
//! - [`Replicable`] - per-type choice of duplication and placement
//! - [`Absorb`], [`MergeSources`] - the merge protocol
//! - [`registry`] - namespaces for types that register themselves by name
//!
//! ## Bundled accumulators
//!
//! - [`Counter`] - signed counter
//! - [`Histogram`] - fixed-width histogram, registered by name

#![warn(missing_docs)]

mod config;
mod counter;
mod dispatch;
mod error;
mod histogram;
mod merge;
mod replicated;
mod slot_map;
mod store;

pub mod prelude;
pub mod registry;

pub use config::{available_parallelism_or_one, EngineConfig, DEFAULT_MIN_CAPACITY};
pub use counter::Counter;
pub use dispatch::{
    namespace_name, next_engine_index, ByClone, ByReplicate, Duplicate, Managed, Placement,
    Replicable, Replicate, Unmanaged,
};
pub use error::ReplicaError;
pub use histogram::{Histogram, ROOT_NAMESPACE};
pub use merge::{absorb_all, Absorb, MergeOutcome, MergeSources};
pub use replicated::Replicated;
pub use slot_map::SlotMap;
pub use store::{Replica, ReplicaStore};
