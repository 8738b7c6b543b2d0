//! Convenient re-exports for common usage.
//!
//! ```
//! use replica_kit::prelude::*;
//! ```

pub use crate::Absorb;
pub use crate::Counter;
pub use crate::EngineConfig;
pub use crate::Histogram;
pub use crate::MergeOutcome;
pub use crate::MergeSources;
pub use crate::Replica;
pub use crate::ReplicaError;
pub use crate::Replicable;
pub use crate::Replicated;
