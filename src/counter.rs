use crate::Absorb;

/// A signed counter, the simplest thing worth replicating per worker.
///
/// Each worker counts into its own replica; absorbing sums the counts.
///
/// # Example
///
/// ```
/// use replica_kit::prelude::*;
///
/// let mut c1 = Counter::new();
/// c1.increment();
/// c1.increment();
/// c1.decrement();
/// assert_eq!(c1.value(), 1);
///
/// let mut c2 = Counter::new();
/// c2.increment_by(4);
///
/// c1.absorb(&c2);
/// assert_eq!(c1.value(), 5);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Counter {
    value: i64,
}

impl Counter {
    /// Create a counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment by 1.
    pub fn increment(&mut self) {
        self.value += 1;
    }

    /// Increment by `n`.
    pub fn increment_by(&mut self, n: i64) {
        self.value += n;
    }

    /// Decrement by 1.
    pub fn decrement(&mut self) {
        self.value -= 1;
    }

    /// Current value.
    #[must_use]
    pub fn value(&self) -> i64 {
        self.value
    }
}

impl Absorb for Counter {
    fn absorb(&mut self, other: &Self) {
        self.value += other.value;
    }
}

crate::replicable_by_clone!(Counter);
