//! The composed replay buffer.
use super::{
    FixedCapacityRing, IwScheduler, NStepReturnComputer, PerConfig, PrioritizedSampler,
    ReplayBufferConfig, TransitionBatch, TransitionRef,
};
use crate::{BatchSampler, Element, ExperienceWriter, ReplayError};
use anyhow::Result;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// State of prioritized sampling: the sampler itself plus the schedule
/// of the importance-weight exponent.
#[derive(Debug)]
struct PerState {
    sampler: PrioritizedSampler,
    iw_scheduler: IwScheduler,
}

impl PerState {
    fn new(capacity: usize, config: &PerConfig, seed: u64) -> Self {
        Self {
            sampler: PrioritizedSampler::new(capacity, config.alpha, seed),
            iw_scheduler: IwScheduler::new(config.beta_0, config.beta_final, config.n_opts_final),
        }
    }
}

/// Fixed-capacity replay buffer with configurable retrieval.
///
/// Owns a [`FixedCapacityRing`] and, depending on the configuration, a
/// [`PrioritizedSampler`] and an [`NStepReturnComputer`]. The flavors
/// compose instead of specializing: uniform sampling is the base
/// behavior, priorities reshape the sampling distribution, and the
/// n-step computer rewrites the sampled rewards, next observations and
/// done flags in terms of the truncated multi-step horizon.
///
/// Transitions stored without explicit priorities receive the running
/// maximum priority, so fresh data is sampled at least as often as the
/// best-known data until its first update.
#[derive(Debug)]
pub struct ReplayBuffer<T> {
    ring: FixedCapacityRing<T>,
    per_state: Option<PerState>,
    n_step: Option<NStepReturnComputer<T>>,
    rng: StdRng,
}

impl<T: Element> ReplayBuffer<T> {
    /// Builds a buffer from the configuration.
    pub fn build(config: &ReplayBufferConfig) -> Self {
        let per_state = config
            .per_config
            .as_ref()
            .map(|c| PerState::new(config.capacity, c, config.seed));
        let n_step = config.n_step_config.as_ref().map(|c| {
            NStepReturnComputer::new(c.n, T::from(c.gamma).unwrap(), config.obs_dim)
        });
        Self {
            ring: FixedCapacityRing::new(config.capacity, config.obs_dim, config.act_dim),
            per_state,
            n_step,
            rng: StdRng::seed_from_u64(config.seed),
        }
    }

    /// Appends a batch of transitions, overwriting the oldest slots
    /// once the buffer is full.
    ///
    /// With prioritized sampling enabled, every written slot receives
    /// the running maximum priority.
    pub fn push(&mut self, batch: &TransitionRef<'_, T>) -> Result<()> {
        let start = self.ring.next_index();
        let count = batch.len();
        self.ring.push(batch)?;
        if let Some(per) = &mut self.per_state {
            per.sampler.set_default_priorities(start, count);
        }
        Ok(())
    }

    /// Appends a batch together with explicit per-step priorities.
    ///
    /// Without prioritized sampling the priorities are ignored, in line
    /// with priority updates being a no-op on uniform buffers.
    pub fn push_with_priorities(
        &mut self,
        batch: &TransitionRef<'_, T>,
        priorities: &[f32],
    ) -> Result<()> {
        if priorities.len() != batch.len() {
            return Err(ReplayError::LengthMismatch {
                expected: batch.len(),
                actual: priorities.len(),
            }
            .into());
        }
        for &p in priorities.iter() {
            if !(p >= 0.0) {
                return Err(ReplayError::InvalidPriority(p).into());
            }
        }

        let start = self.ring.next_index();
        self.ring.push(batch)?;
        if let Some(per) = &mut self.per_state {
            per.sampler.set_priorities(start, priorities)?;
        }
        Ok(())
    }

    /// Draws a batch of `size` transitions with replacement.
    ///
    /// Prioritized buffers attach importance weights normalized to a
    /// batch maximum of 1; n-step buffers report returns, horizon
    /// observations, horizon done flags and bootstrap discounts in
    /// place of the raw step fields.
    pub fn batch(&mut self, size: usize) -> Result<TransitionBatch<T>> {
        if self.ring.is_empty() {
            return Err(ReplayError::EmptyBuffer.into());
        }

        let (ixs, weight) = match &mut self.per_state {
            Some(per) => {
                let beta = per.iw_scheduler.beta();
                let (ixs, ws) = per.sampler.sample(size, beta, self.ring.len())?;
                (ixs, Some(ws))
            }
            None => {
                let len = self.ring.len();
                let ixs = (0..size)
                    .map(|_| self.rng.gen_range(0..len))
                    .collect::<Vec<_>>();
                (ixs, None)
            }
        };

        let mut batch = match &self.n_step {
            Some(n_step) => {
                let ns = n_step.compute(
                    &ixs,
                    self.ring.rewards(),
                    self.ring.next_observations(),
                    self.ring.done_flags(),
                )?;
                let mut batch = self.ring.select(&ixs);
                batch.reward = ns.returns;
                batch.next_obs = ns.next_obs;
                batch.done = ns.terminal;
                batch.discount = Some(ns.discounts);
                batch
            }
            None => self.ring.select(&ixs),
        };
        batch.weight = weight;
        batch.ix_sample = Some(ixs);
        Ok(batch)
    }

    /// Updates the priorities of previously sampled slots and advances
    /// the beta schedule. A no-op on uniform buffers.
    pub fn update_priority(&mut self, ixs: &[usize], priorities: &[f32]) -> Result<()> {
        if let Some(per) = &mut self.per_state {
            per.sampler.update_priorities(ixs, priorities)?;
            per.iw_scheduler.add_n_opts();
        }
        Ok(())
    }

    /// Current number of stored transitions.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` while nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Maximum number of stored transitions.
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// The slot the next push will write first.
    pub fn next_index(&self) -> usize {
        self.ring.next_index()
    }

    /// The running maximum priority, `None` on uniform buffers.
    pub fn max_priority(&self) -> Option<f32> {
        self.per_state.as_ref().map(|per| per.sampler.max_priority())
    }

    /// The current importance-weight exponent, `None` on uniform
    /// buffers.
    pub fn beta(&self) -> Option<f32> {
        self.per_state.as_ref().map(|per| per.iw_scheduler.beta())
    }

    /// Number of set done flags among the stored transitions.
    pub fn num_done_flags(&self) -> usize {
        self.ring.num_done_flags()
    }

    /// Sum of the stored rewards.
    pub fn sum_rewards(&self) -> T {
        self.ring.sum_rewards()
    }

    /// Discards all stored transitions and priorities. The beta
    /// schedule tracks training progress, not buffer contents, and is
    /// left running.
    pub fn clear(&mut self) {
        self.ring.clear();
        if let Some(per) = &mut self.per_state {
            per.sampler.clear();
        }
    }
}

impl<T: Element> ExperienceWriter for ReplayBuffer<T> {
    type Elem = T;

    fn push(&mut self, batch: &TransitionRef<'_, T>) -> Result<()> {
        ReplayBuffer::push(self, batch)
    }

    fn len(&self) -> usize {
        ReplayBuffer::len(self)
    }
}

impl<T: Element> BatchSampler for ReplayBuffer<T> {
    type Elem = T;

    fn batch(&mut self, size: usize) -> Result<TransitionBatch<T>> {
        ReplayBuffer::batch(self, size)
    }

    fn update_priority(&mut self, ixs: &[usize], priorities: &[f32]) -> Result<()> {
        ReplayBuffer::update_priority(self, ixs, priorities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay_buffer::NStepConfig;

    fn transitions(base: f32, count: usize, done: &[i8]) -> TransitionBatch<f32> {
        assert_eq!(done.len(), count);
        let mut b = TransitionBatch::with_capacity(count, 1, 1);
        for k in 0..count {
            let v = base + k as f32;
            b.obs.push(v);
            b.act.push(-v);
            b.reward.push(v);
            b.next_obs.push(v + 1.0);
            b.done.push(done[k]);
        }
        b
    }

    fn uniform_config(capacity: usize) -> ReplayBufferConfig {
        ReplayBufferConfig::default()
            .capacity(capacity)
            .obs_dim(1)
            .act_dim(1)
            .seed(42)
    }

    #[test]
    fn uniform_flavor_samples_stored_rows() {
        let mut buffer = ReplayBuffer::<f32>::build(&uniform_config(16));
        buffer
            .push(&transitions(0.0, 6, &[0, 0, 0, 1, 0, 0]).view())
            .unwrap();
        assert_eq!(buffer.len(), 6);
        assert_eq!(buffer.num_done_flags(), 1);

        let batch = buffer.batch(32).unwrap();
        assert_eq!(batch.len(), 32);
        assert!(batch.weight.is_none());
        assert!(batch.discount.is_none());
        let ixs = batch.ix_sample.as_ref().unwrap();
        for (k, &ix) in ixs.iter().enumerate() {
            assert!(ix < 6);
            assert_eq!(batch.reward[k], ix as f32);
            assert_eq!(batch.obs[k], ix as f32);
            assert_eq!(batch.next_obs[k], ix as f32 + 1.0);
        }
    }

    #[test]
    fn sampling_an_empty_buffer_fails() {
        let mut buffer = ReplayBuffer::<f32>::build(&uniform_config(8));
        let err = buffer.batch(4).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ReplayError>(),
            Some(&ReplayError::EmptyBuffer)
        );
    }

    #[test]
    fn per_flavor_attaches_unit_weights_while_beta_is_zero() {
        let config = uniform_config(8)
            .per_config(Some(PerConfig::default().alpha(0.6).beta_0(0.0)));
        let mut buffer = ReplayBuffer::<f32>::build(&config);
        buffer.push(&transitions(0.0, 8, &[0; 8]).view()).unwrap();

        let batch = buffer.batch(16).unwrap();
        let ws = batch.weight.as_ref().unwrap();
        assert!(ws.iter().all(|&w| w == 1.0));
        assert_eq!(buffer.max_priority(), Some(1.0));
    }

    #[test]
    fn priority_updates_steer_sampling_and_the_maximum() {
        let config = uniform_config(8).per_config(Some(PerConfig::default().alpha(0.7)));
        let mut buffer = ReplayBuffer::<f32>::build(&config);
        buffer.push(&transitions(0.0, 8, &[0; 8]).view()).unwrap();

        buffer.update_priority(&[5], &[1e10]).unwrap();
        assert_eq!(buffer.max_priority(), Some(1e10));

        let batch = buffer.batch(1000).unwrap();
        let hits = batch
            .ix_sample
            .as_ref()
            .unwrap()
            .iter()
            .filter(|&&ix| ix == 5)
            .count();
        assert!(hits > 990, "index 5 drawn only {} of 1000 times", hits);

        // Fresh pushes now inherit the raised maximum.
        buffer.push(&transitions(8.0, 1, &[0]).view()).unwrap();
        assert_eq!(buffer.max_priority(), Some(1e10));
    }

    #[test]
    fn rejected_priorities_leave_the_buffer_unwritten() {
        let config = uniform_config(8).per_config(Some(PerConfig::default()));
        let mut buffer = ReplayBuffer::<f32>::build(&config);
        let err = buffer
            .push_with_priorities(&transitions(0.0, 2, &[0, 0]).view(), &[0.5, -2.0])
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<ReplayError>(),
            Some(&ReplayError::InvalidPriority(-2.0))
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn n_step_flavor_rewrites_the_sampled_horizon() {
        let config = uniform_config(8).n_step_config(Some(NStepConfig { n: 2, gamma: 0.5 }));
        let mut buffer = ReplayBuffer::<f32>::build(&config);
        buffer.push(&transitions(1.0, 4, &[0, 0, 1, 0]).view()).unwrap();

        // Per index: (return, discount, horizon done, horizon next_obs).
        let expected = [
            (1.0 + 0.5 * 2.0, 0.25, 0, 3.0),
            (2.0 + 0.5 * 3.0, 0.25, 1, 4.0),
            (3.0, 0.5, 1, 4.0),
            // Window truncated by the end of the stored range.
            (4.0, 0.5, 0, 5.0),
        ];

        let batch = buffer.batch(64).unwrap();
        let discounts = batch.discount.as_ref().unwrap();
        for (k, &ix) in batch.ix_sample.as_ref().unwrap().iter().enumerate() {
            let (ret, disc, done, next_obs) = expected[ix];
            assert_eq!(batch.reward[k], ret, "return at index {}", ix);
            assert_eq!(discounts[k], disc, "discount at index {}", ix);
            assert_eq!(batch.done[k], done, "done at index {}", ix);
            assert_eq!(batch.next_obs[k], next_obs, "horizon obs at index {}", ix);
        }
    }

    #[test]
    fn per_bookkeeping_follows_wraparound_overwrites() {
        let config = uniform_config(4).per_config(Some(PerConfig::default().alpha(1.0)));
        let mut buffer = ReplayBuffer::<f32>::build(&config);

        // Six pushes into four slots; every occupied slot must carry
        // the default priority of 1, so the total mass is 4.
        for k in 0..6 {
            buffer.push(&transitions(k as f32, 1, &[0]).view()).unwrap();
        }
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.next_index(), 2);

        let batch = buffer.batch(256).unwrap();
        let ixs = batch.ix_sample.as_ref().unwrap();
        assert!(ixs.iter().all(|&ix| ix < 4));
    }

    #[test]
    fn clear_empties_storage_and_priorities() {
        let config = uniform_config(8).per_config(Some(PerConfig::default()));
        let mut buffer = ReplayBuffer::<f32>::build(&config);
        buffer.push(&transitions(0.0, 4, &[0; 4]).view()).unwrap();
        buffer.update_priority(&[0], &[3.0]).unwrap();

        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.max_priority(), Some(1.0));
        assert!(buffer.batch(4).is_err());
    }
}
