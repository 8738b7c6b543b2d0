use thiserror::Error;

/// Errors reported by the slot map, the replica store and engine construction.
///
/// Every variant is recoverable: the engine stays usable after reporting one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplicaError {
    /// More distinct identities asked for a slot than the engine has slots.
    #[error("maximum number of slots reached ({capacity} slots already assigned)")]
    CapacityExceeded {
        /// The engine's fixed slot count.
        capacity: usize,
    },

    /// A raw slot index outside `[0, capacity)` was requested.
    #[error("slot {slot} out of range for capacity {capacity}")]
    SlotOutOfRange {
        /// The requested slot.
        slot: usize,
        /// The engine's fixed slot count.
        capacity: usize,
    },

    /// The configuration resolved to an engine without any slot.
    #[error("replica capacity must be at least 1")]
    ZeroCapacity,
}
