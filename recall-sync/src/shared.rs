//! Coarse-lock shared access to a replay buffer.
use anyhow::Result;
use recall_core::{
    replay_buffer::{TransitionBatch, TransitionRef},
    BatchSampler, ExperienceWriter,
};
use std::sync::{Arc, Mutex};

/// A replay buffer shared between writer and reader threads.
///
/// All operations serialize on a single coarse mutex. Batch operations
/// dominate the workload and the tree depth behind priority updates is
/// small, so one lock around a full store/sample/update call is
/// preferred over fine-grained locking of tree nodes. Every operation
/// is a short, bounded critical section and observes a consistent
/// snapshot: a sampler never sees a half-propagated tree sum and two
/// writers never claim overlapping slot ranges.
#[derive(Debug)]
pub struct SharedReplayBuffer<B> {
    inner: Arc<Mutex<B>>,
}

impl<B> Clone for SharedReplayBuffer<B> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<B> SharedReplayBuffer<B> {
    /// Wraps a buffer for shared access.
    pub fn new(buffer: B) -> Self {
        Self {
            inner: Arc::new(Mutex::new(buffer)),
        }
    }

    /// Runs a closure on the buffer under the shared lock.
    ///
    /// The escape hatch for operations beyond the writer and sampler
    /// interfaces, e.g. deleting an episode from a wrapped
    /// [`EpisodicStore`](recall_core::replay_buffer::EpisodicStore).
    /// The closure must not block; it holds up every other thread.
    pub fn with<R>(&self, f: impl FnOnce(&mut B) -> R) -> R {
        f(&mut self.inner.lock().unwrap())
    }
}

impl<B: ExperienceWriter> SharedReplayBuffer<B> {
    /// Appends a batch of transitions under the lock.
    pub fn push(&self, batch: &TransitionRef<'_, B::Elem>) -> Result<()> {
        self.inner.lock().unwrap().push(batch)
    }

    /// Current number of stored transitions.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    /// Returns `true` while no transitions are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<B: BatchSampler> SharedReplayBuffer<B> {
    /// Draws a batch of transitions under the lock.
    pub fn batch(&self, size: usize) -> Result<TransitionBatch<B::Elem>> {
        self.inner.lock().unwrap().batch(size)
    }

    /// Updates priorities of sampled transitions under the lock.
    pub fn update_priority(&self, ixs: &[usize], priorities: &[f32]) -> Result<()> {
        self.inner.lock().unwrap().update_priority(ixs, priorities)
    }
}
