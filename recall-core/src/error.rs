//! Errors in the library.
use thiserror::Error;

/// Errors raised by replay buffer operations.
///
/// All validation happens before any mutation, so a returned error implies
/// that the buffer, the priority tree and the episode records are unchanged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReplayError {
    /// A negative value was given where a priority is expected.
    #[error("Priority must be non-negative, got {0}")]
    InvalidPriority(f32),

    /// Paired array arguments have inconsistent lengths.
    #[error("Length mismatch: expected {expected}, got {actual}")]
    LengthMismatch {
        /// The length implied by the other arguments.
        expected: usize,
        /// The length actually supplied.
        actual: usize,
    },

    /// Sampling was requested while no transitions are stored.
    #[error("Cannot sample from an empty buffer")]
    EmptyBuffer,

    /// Sampling was requested while the total priority mass is zero.
    #[error("Cannot sample: total priority mass is zero")]
    DegenerateDistribution,

    /// A single store call requested more steps than the buffer can
    /// hold.
    #[error("Store of {requested} steps exceeds free capacity {capacity}")]
    CapacityViolation {
        /// Number of steps in the rejected call.
        requested: usize,
        /// Capacity available to the call: the full buffer for the
        /// ring, the slots up to the end of the buffer for the
        /// episode store.
        capacity: usize,
    },
}
