//! Engine sizing.
//!
//! The number of slots is fixed when an engine is built. By default it is
//! `max(64, available_parallelism)`, so every worker of a typical pool gets
//! its own slot without any resizing later on.

use core::num::NonZeroUsize;

use crate::ReplicaError;

/// Default lower bound on the number of slots of an engine.
pub const DEFAULT_MIN_CAPACITY: usize = 64;

/// Sizing options for a [`Replicated`](crate::Replicated) engine.
///
/// # Example
///
/// ```
/// use replica_kit::EngineConfig;
///
/// let config = EngineConfig::default().with_capacity(4);
/// assert_eq!(config.effective_capacity().unwrap(), 4);
///
/// let config = EngineConfig::default().with_parallelism_hint(128);
/// assert_eq!(config.effective_capacity().unwrap(), 128);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineConfig {
    /// Exact slot count. Overrides the computed default when set.
    pub capacity: Option<usize>,
    /// Lower bound used when no exact capacity is given.
    pub min_capacity: usize,
    /// Expected number of concurrent workers. Falls back to
    /// `std::thread::available_parallelism` when unset.
    pub parallelism_hint: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            capacity: None,
            min_capacity: DEFAULT_MIN_CAPACITY,
            parallelism_hint: None,
        }
    }
}

impl EngineConfig {
    /// Use exactly `capacity` slots.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Change the lower bound applied to the parallelism hint.
    #[must_use]
    pub fn with_min_capacity(mut self, min_capacity: usize) -> Self {
        self.min_capacity = min_capacity;
        self
    }

    /// Size the engine for `workers` concurrent workers.
    #[must_use]
    pub fn with_parallelism_hint(mut self, workers: usize) -> Self {
        self.parallelism_hint = Some(workers);
        self
    }

    /// Resolve the slot count this configuration describes.
    pub fn effective_capacity(&self) -> Result<usize, ReplicaError> {
        let capacity = match self.capacity {
            Some(exact) => exact,
            None => {
                let hint = self
                    .parallelism_hint
                    .unwrap_or_else(available_parallelism_or_one);
                self.min_capacity.max(hint)
            }
        };
        if capacity == 0 {
            return Err(ReplicaError::ZeroCapacity);
        }
        Ok(capacity)
    }
}

/// `std::thread::available_parallelism()` with a floor of 1.
#[must_use]
pub fn available_parallelism_or_one() -> usize {
    std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
}
