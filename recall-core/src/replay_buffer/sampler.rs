//! Proportional sampling with importance weights.
use super::SumTree;
use crate::ReplayError;

/// Priority bookkeeping and proportional sampling over buffer slots.
///
/// Composes a [`SumTree`] with the running maximum priority. Newly
/// inserted slots that arrive without an explicit priority receive the
/// running maximum (1.0 before anything was ever assigned), so new data
/// is sampled at least as often as the best-known data until its first
/// priority update.
///
/// Priorities are raw, pre-exponent values; the tree applies the
/// `alpha` exponent internally.
#[derive(Clone, Debug)]
pub struct PrioritizedSampler {
    capacity: usize,
    sum_tree: SumTree,
    max_priority: f32,
    default_max_priority: f32,
    rng: fastrand::Rng,
}

impl PrioritizedSampler {
    /// Creates a sampler over `capacity` slots.
    ///
    /// `alpha` controls how strongly priorities shape the sampling
    /// distribution; `alpha = 0` degenerates to uniform sampling over
    /// the slots that ever received a priority.
    pub fn new(capacity: usize, alpha: f32, seed: u64) -> Self {
        Self {
            capacity,
            sum_tree: SumTree::new(capacity, alpha),
            max_priority: 1.0,
            default_max_priority: 1.0,
            rng: fastrand::Rng::with_seed(seed),
        }
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The running maximum of all raw priorities ever set.
    pub fn max_priority(&self) -> f32 {
        self.max_priority
    }

    /// Total priority mass currently in the tree.
    pub fn total_priority(&self) -> f32 {
        self.sum_tree.total()
    }

    /// Sets the priority of one slot.
    ///
    /// # Errors
    ///
    /// Fails with [`ReplayError::InvalidPriority`] for negative or NaN
    /// values; the tree is left untouched.
    pub fn set_priority(&mut self, ix: usize, priority: f32) -> Result<(), ReplayError> {
        if !(priority >= 0.0) {
            return Err(ReplayError::InvalidPriority(priority));
        }
        assert!(ix < self.capacity, "slot index out of range");
        if priority > self.max_priority {
            self.max_priority = priority;
        }
        self.sum_tree.update(ix, priority);
        Ok(())
    }

    /// Sets explicit priorities for `priorities.len()` slots starting
    /// at `first`, wrapping past the last slot.
    ///
    /// Used when a caller stores transitions together with their
    /// priorities. The whole batch is validated before any leaf is
    /// touched.
    pub fn set_priorities(&mut self, first: usize, priorities: &[f32]) -> Result<(), ReplayError> {
        for &p in priorities.iter() {
            if !(p >= 0.0) {
                return Err(ReplayError::InvalidPriority(p));
            }
        }
        for (j, &p) in priorities.iter().enumerate() {
            if p > self.max_priority {
                self.max_priority = p;
            }
            self.sum_tree.update((first + j) % self.capacity, p);
        }
        Ok(())
    }

    /// Assigns the running maximum priority to `count` slots starting
    /// at `first`, wrapping past the last slot.
    ///
    /// Called for transitions stored without explicit priorities.
    pub fn set_default_priorities(&mut self, first: usize, count: usize) {
        for j in 0..count {
            self.sum_tree
                .update((first + j) % self.capacity, self.max_priority);
        }
    }

    /// Batch point-update of priorities after a learning step.
    ///
    /// All-or-nothing: the batch is validated in full before the first
    /// leaf is mutated.
    ///
    /// # Errors
    ///
    /// Fails with [`ReplayError::LengthMismatch`] when `ixs` and
    /// `priorities` differ in length and with
    /// [`ReplayError::InvalidPriority`] when any priority is negative
    /// or NaN.
    pub fn update_priorities(
        &mut self,
        ixs: &[usize],
        priorities: &[f32],
    ) -> Result<(), ReplayError> {
        if ixs.len() != priorities.len() {
            return Err(ReplayError::LengthMismatch {
                expected: ixs.len(),
                actual: priorities.len(),
            });
        }
        for &p in priorities.iter() {
            if !(p >= 0.0) {
                return Err(ReplayError::InvalidPriority(p));
            }
        }
        for &ix in ixs.iter() {
            assert!(ix < self.capacity, "slot index out of range");
        }

        for (&ix, &p) in ixs.iter().zip(priorities.iter()) {
            if p > self.max_priority {
                self.max_priority = p;
            }
            self.sum_tree.update(ix, p);
        }
        Ok(())
    }

    /// Draws `batch_size` slot indexes with replacement, each selected
    /// with probability proportional to its priority mass among the
    /// `stored_size` occupied leaves.
    ///
    /// Returns the indexes and their importance weights
    /// `(stored_size * p_i / total)^(-beta)`, divided by the largest
    /// weight in the batch so the maximum is 1. `beta = 0` therefore
    /// yields a weight of exactly 1 for every draw.
    ///
    /// # Errors
    ///
    /// Fails with [`ReplayError::EmptyBuffer`] when `stored_size` is
    /// zero and [`ReplayError::DegenerateDistribution`] when the total
    /// priority mass is zero.
    pub fn sample(
        &mut self,
        batch_size: usize,
        beta: f32,
        stored_size: usize,
    ) -> Result<(Vec<usize>, Vec<f32>), ReplayError> {
        if stored_size == 0 {
            return Err(ReplayError::EmptyBuffer);
        }
        let total = self.sum_tree.total();
        if !(total > 0.0) {
            return Err(ReplayError::DegenerateDistribution);
        }
        if batch_size == 0 {
            return Ok((Vec::new(), Vec::new()));
        }

        let ixs = (0..batch_size)
            .map(|_| self.sum_tree.descend(self.rng.f32() * total))
            .collect::<Vec<_>>();

        let n = stored_size as f32 / total;
        let ws = ixs
            .iter()
            .map(|&ix| (n * self.sum_tree.leaf(ix)).powf(-beta))
            .collect::<Vec<_>>();

        let w_max = ws.iter().fold(f32::MIN, |m, &w| w.max(m));
        let ws = ws.iter().map(|w| w / w_max).collect::<Vec<_>>();

        Ok((ixs, ws))
    }

    /// Resets every priority to zero and the running maximum to its
    /// default of 1.0.
    pub fn clear(&mut self) {
        self.sum_tree.clear();
        self.max_priority = self.default_max_priority;
    }
}
