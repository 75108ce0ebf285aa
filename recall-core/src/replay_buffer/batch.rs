//! Transition batches exchanged with the replay buffer.
use crate::{Element, ReplayError};

/// A borrowed batch of transitions in array-of-structures layout.
///
/// Each field is a caller-allocated contiguous buffer whose length is
/// `count * dimensionality` for that field. The batch length is derived
/// from the reward field, which always has dimensionality 1.
///
/// The same type doubles as the view returned when reading a contiguous
/// slot range back out of the storage.
#[derive(Clone, Copy, Debug)]
pub struct TransitionRef<'a, T> {
    /// Observations, `count * obs_dim` elements.
    pub obs: &'a [T],
    /// Actions, `count * act_dim` elements.
    pub act: &'a [T],
    /// Scalar rewards, `count` elements.
    pub reward: &'a [T],
    /// Next observations, `count * obs_dim` elements.
    pub next_obs: &'a [T],
    /// Done flags with the legacy 0/1 numeric encoding, `count` elements.
    pub done: &'a [i8],
}

impl<'a, T: Element> TransitionRef<'a, T> {
    /// Number of transitions in the batch.
    pub fn len(&self) -> usize {
        self.reward.len()
    }

    /// Returns `true` for a zero-length batch.
    pub fn is_empty(&self) -> bool {
        self.reward.is_empty()
    }

    /// Validates field lengths against the given dimensionalities.
    ///
    /// Returns the batch length on success. Performed before any write
    /// so that a failed store leaves the buffer untouched.
    pub fn check(&self, obs_dim: usize, act_dim: usize) -> Result<usize, ReplayError> {
        let count = self.reward.len();
        let expect = |expected: usize, actual: usize| {
            if expected == actual {
                Ok(())
            } else {
                Err(ReplayError::LengthMismatch { expected, actual })
            }
        };
        expect(count * obs_dim, self.obs.len())?;
        expect(count * act_dim, self.act.len())?;
        expect(count * obs_dim, self.next_obs.len())?;
        expect(count, self.done.len())?;
        Ok(count)
    }
}

/// An owned batch of transitions.
///
/// Produced by sampling and by episode retrieval; also used as the
/// accumulation buffer of the channel-based writer proxy. The optional
/// fields are populated depending on the buffer flavor: `weight` and
/// `ix_sample` by prioritized sampling, `discount` by n-step return
/// computation.
#[derive(Clone, Debug, PartialEq)]
pub struct TransitionBatch<T> {
    /// Observations.
    pub obs: Vec<T>,
    /// Actions.
    pub act: Vec<T>,
    /// Rewards, or n-step returns for the n-step flavor.
    pub reward: Vec<T>,
    /// Next observations, or horizon observations for the n-step flavor.
    pub next_obs: Vec<T>,
    /// Done flags, or the done flag at the horizon for the n-step flavor.
    pub done: Vec<i8>,
    /// Bootstrap discounts `gamma^m`, n-step flavor only.
    pub discount: Option<Vec<T>>,
    /// Importance weights, prioritized flavor only.
    pub weight: Option<Vec<f32>>,
    /// Slot indexes the batch was drawn from.
    pub ix_sample: Option<Vec<usize>>,
}

impl<T: Element> TransitionBatch<T> {
    /// Creates an empty batch with reserved space for `capacity` steps.
    pub fn with_capacity(capacity: usize, obs_dim: usize, act_dim: usize) -> Self {
        Self {
            obs: Vec::with_capacity(capacity * obs_dim),
            act: Vec::with_capacity(capacity * act_dim),
            reward: Vec::with_capacity(capacity),
            next_obs: Vec::with_capacity(capacity * obs_dim),
            done: Vec::with_capacity(capacity),
            discount: None,
            weight: None,
            ix_sample: None,
        }
    }

    /// Number of transitions in the batch.
    pub fn len(&self) -> usize {
        self.reward.len()
    }

    /// Returns `true` for a zero-length batch.
    pub fn is_empty(&self) -> bool {
        self.reward.is_empty()
    }

    /// Appends the transitions of a borrowed batch.
    pub fn append(&mut self, batch: &TransitionRef<'_, T>) {
        self.obs.extend_from_slice(batch.obs);
        self.act.extend_from_slice(batch.act);
        self.reward.extend_from_slice(batch.reward);
        self.next_obs.extend_from_slice(batch.next_obs);
        self.done.extend_from_slice(batch.done);
    }

    /// Borrows the batch as a [`TransitionRef`].
    pub fn view(&self) -> TransitionRef<'_, T> {
        TransitionRef {
            obs: &self.obs,
            act: &self.act,
            reward: &self.reward,
            next_obs: &self.next_obs,
            done: &self.done,
        }
    }
}
