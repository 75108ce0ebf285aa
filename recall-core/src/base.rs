//! Core interfaces.
use crate::replay_buffer::{TransitionBatch, TransitionRef};
use anyhow::Result;
use num_traits::Float;
use std::fmt::Debug;

/// Scalar element type of observation, action and reward arrays.
///
/// The storage layout is an array of structures with per-field
/// dimensionality, so a single scalar type covers all three fields.
/// Done flags are kept apart as `i8` with the legacy 0/1 encoding and
/// priorities are always `f32`.
pub trait Element: Float + Debug + Send + Sync + 'static {}

impl<T> Element for T where T: Float + Debug + Send + Sync + 'static {}

/// Interface for buffers that accept batches of transitions.
///
/// Implemented by the ring-backed buffers and by the episode store.
/// Writer threads in the concurrent access layer only see this trait.
pub trait ExperienceWriter {
    /// Scalar element type of the stored fields.
    type Elem: Element;

    /// Appends a batch of transitions.
    ///
    /// # Errors
    ///
    /// Fails before any mutation when the batch fields have
    /// inconsistent lengths or when a single call exceeds the buffer
    /// capacity.
    fn push(&mut self, batch: &TransitionRef<'_, Self::Elem>) -> Result<()>;

    /// Returns the current number of stored transitions.
    fn len(&self) -> usize;

    /// Returns `true` while no transitions are stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Interface for buffers that produce training batches.
///
/// Sampling is uniform or priority-weighted depending on how the
/// implementing buffer was configured.
pub trait BatchSampler {
    /// Scalar element type of the sampled fields.
    type Elem: Element;

    /// Draws `size` transitions with replacement.
    fn batch(&mut self, size: usize) -> Result<TransitionBatch<Self::Elem>>;

    /// Updates the priorities of previously sampled transitions.
    ///
    /// A no-op for buffers without a priority index, following the
    /// convention that priority bookkeeping is an optional concern of
    /// the sampler, not of the caller.
    fn update_priority(&mut self, ixs: &[usize], priorities: &[f32]) -> Result<()>;
}
