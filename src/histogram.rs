//! A fixed-width 1-D histogram that registers itself by name.

use crate::registry::{current_namespace, Catalog, Namespace, Registered};
use crate::{Absorb, ByClone, Managed, Replicable};

/// Namespace a histogram joins when no scope is active.
pub const ROOT_NAMESPACE: &str = "root";

/// Fixed-width binned counts over `[lo, hi)`, with under- and overflow.
///
/// A histogram registers its name in the current namespace scope (or the
/// global catalog's [`ROOT_NAMESPACE`]) when created or cloned, and leaves it
/// when dropped or [detached](Registered::detach). Replicas are therefore
/// built with the [`Managed`] placement.
///
/// With the `serde` feature the namespace is not serialized; a deserialized
/// histogram registers itself in the current scope like a new one.
///
/// # Example
///
/// ```
/// use replica_kit::prelude::*;
///
/// let per_thread = Replicated::from_fn(|| Histogram::new("latency", 10, 0.0, 100.0));
///
/// std::thread::scope(|s| {
///     for worker in 0..3 {
///         let per_thread = &per_thread;
///         s.spawn(move || {
///             let mine = per_thread.get().unwrap();
///             let mut h = mine.lock();
///             for i in 0..10 {
///                 h.fill(f64::from(worker * 10 + i));
///             }
///         });
///     }
/// });
///
/// let total = per_thread.snapshot_merge().into_inner();
/// assert_eq!(total.entries(), 30);
/// assert_eq!(total.bin(0), 10.0);
/// ```
#[derive(Debug)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(from = "HistogramState")
)]
pub struct Histogram {
    name: String,
    lo: f64,
    hi: f64,
    bins: Vec<f64>,
    underflow: f64,
    overflow: f64,
    entries: u64,
    sum_w: f64,
    sum_wx: f64,
    #[cfg_attr(feature = "serde", serde(skip))]
    namespace: Option<Namespace>,
}

impl Histogram {
    /// Create an empty histogram of `bins` equal bins over `[lo, hi)`.
    ///
    /// A zero bin count is raised to one, and an empty or inverted range is
    /// widened to `[lo, lo + 1)`.
    pub fn new(name: impl Into<String>, bins: usize, lo: f64, hi: f64) -> Self {
        let hi = if hi > lo { hi } else { lo + 1.0 };
        let mut h = Self {
            name: name.into(),
            lo,
            hi,
            bins: vec![0.0; bins.max(1)],
            underflow: 0.0,
            overflow: 0.0,
            entries: 0,
            sum_w: 0.0,
            sum_wx: 0.0,
            namespace: None,
        };
        h.attach();
        h
    }

    fn attach(&mut self) {
        let ns = current_namespace().unwrap_or_else(|| Catalog::global().mkdir(ROOT_NAMESPACE));
        ns.register(&self.name);
        self.namespace = Some(ns);
    }

    /// The histogram's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of in-range bins.
    #[must_use]
    pub fn bins(&self) -> usize {
        self.bins.len()
    }

    /// Lower and upper edge of the range.
    #[must_use]
    pub fn range(&self) -> (f64, f64) {
        (self.lo, self.hi)
    }

    /// Record `x` with weight 1.
    pub fn fill(&mut self, x: f64) {
        self.fill_weighted(x, 1.0);
    }

    /// Record `x` with weight `w`.
    pub fn fill_weighted(&mut self, x: f64, w: f64) {
        self.entries += 1;
        if !(x >= self.lo) {
            self.underflow += w;
            return;
        }
        if x >= self.hi {
            self.overflow += w;
            return;
        }
        let width = (self.hi - self.lo) / self.bins.len() as f64;
        let index = (((x - self.lo) / width) as usize).min(self.bins.len() - 1);
        self.bins[index] += w;
        self.sum_w += w;
        self.sum_wx += w * x;
    }

    /// Content of in-range bin `index`, or 0 if there is no such bin.
    #[must_use]
    pub fn bin(&self, index: usize) -> f64 {
        self.bins.get(index).copied().unwrap_or(0.0)
    }

    /// Total weight below the range.
    #[must_use]
    pub fn underflow(&self) -> f64 {
        self.underflow
    }

    /// Total weight at or above the upper edge.
    #[must_use]
    pub fn overflow(&self) -> f64 {
        self.overflow
    }

    /// Number of fill calls, in range or not.
    #[must_use]
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Sum of in-range bin contents.
    #[must_use]
    pub fn integral(&self) -> f64 {
        self.bins.iter().sum()
    }

    /// Weighted mean of in-range fills, or 0 if there were none.
    #[must_use]
    pub fn mean(&self) -> f64 {
        if self.sum_w == 0.0 {
            0.0
        } else {
            self.sum_wx / self.sum_w
        }
    }

    fn same_binning(&self, other: &Self) -> bool {
        self.bins.len() == other.bins.len() && self.lo == other.lo && self.hi == other.hi
    }
}

/// Wire form of a [`Histogram`], attached to a namespace on conversion.
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct HistogramState {
    name: String,
    lo: f64,
    hi: f64,
    bins: Vec<f64>,
    underflow: f64,
    overflow: f64,
    entries: u64,
    sum_w: f64,
    sum_wx: f64,
}

#[cfg(feature = "serde")]
impl From<HistogramState> for Histogram {
    fn from(state: HistogramState) -> Self {
        let mut bins = state.bins;
        if bins.is_empty() {
            bins.push(0.0);
        }
        let hi = if state.hi > state.lo {
            state.hi
        } else {
            state.lo + 1.0
        };
        let mut h = Self {
            name: state.name,
            lo: state.lo,
            hi,
            bins,
            underflow: state.underflow,
            overflow: state.overflow,
            entries: state.entries,
            sum_w: state.sum_w,
            sum_wx: state.sum_wx,
            namespace: None,
        };
        h.attach();
        h
    }
}

impl Clone for Histogram {
    fn clone(&self) -> Self {
        let mut h = Self {
            name: self.name.clone(),
            lo: self.lo,
            hi: self.hi,
            bins: self.bins.clone(),
            underflow: self.underflow,
            overflow: self.overflow,
            entries: self.entries,
            sum_w: self.sum_w,
            sum_wx: self.sum_wx,
            namespace: None,
        };
        h.attach();
        h
    }
}

impl Drop for Histogram {
    fn drop(&mut self) {
        self.detach();
    }
}

impl Registered for Histogram {
    fn namespace(&self) -> Option<Namespace> {
        self.namespace.clone()
    }

    fn detach(&mut self) {
        if let Some(ns) = self.namespace.take() {
            ns.unregister(&self.name);
        }
    }
}

impl Absorb for Histogram {
    fn absorb(&mut self, other: &Self) {
        if !self.same_binning(other) {
            tracing::warn!(
                target: "replica_kit::merge",
                target_name = %self.name,
                source_name = %other.name,
                "cannot absorb histogram with different binning, skipping"
            );
            return;
        }
        for (mine, theirs) in self.bins.iter_mut().zip(&other.bins) {
            *mine += theirs;
        }
        self.underflow += other.underflow;
        self.overflow += other.overflow;
        self.entries += other.entries;
        self.sum_w += other.sum_w;
        self.sum_wx += other.sum_wx;
    }
}

impl Replicable for Histogram {
    type Duplication = ByClone;
    type Placement = Managed;
}
