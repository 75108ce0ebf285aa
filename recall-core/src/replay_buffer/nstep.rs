//! Multi-step discounted returns.
use crate::{Element, ReplayError};

/// Output of one n-step computation, parallel over the input indexes.
#[derive(Clone, Debug, PartialEq)]
pub struct NStepBatch<T> {
    /// Discounted return over the truncated window,
    /// `sum_{k=0}^{m-1} gamma^k * reward[i + k]`.
    pub returns: Vec<T>,

    /// Bootstrap discount `gamma^m` for the value estimate at the
    /// horizon observation.
    pub discounts: Vec<T>,

    /// The observation `m` steps ahead of each index, flattened with
    /// the observation dimensionality.
    pub next_obs: Vec<T>,

    /// The truncation count `m` itself: `n`, or fewer when a done flag
    /// or the end of the buffer cut the window short.
    pub steps: Vec<usize>,

    /// Done flag at the horizon step, distinguishing "episode ended"
    /// from "ran out of buffer" for truncated windows.
    pub terminal: Vec<i8>,
}

/// Computes discounted n-step returns over reward/done/next-observation
/// slices.
///
/// The computer is stateless per call: it takes a batch of arbitrary,
/// possibly non-contiguous step indexes and produces parallel output
/// arrays without retaining the inputs. Each index gets its own window
/// of up to `n` steps, truncated independently at the first done flag
/// at or after it and at the end of the slices. The step carrying the
/// done flag still contributes its reward; nothing beyond it does.
///
/// Zeroing the bootstrap term for terminal horizons is left to the
/// caller, which is why the discount stays `gamma^m` even when the
/// window ended on a done flag and why [`NStepBatch::terminal`] is
/// reported alongside it.
#[derive(Clone, Debug)]
pub struct NStepReturnComputer<T> {
    n: usize,
    gamma: T,
    obs_dim: usize,
}

impl<T: Element> NStepReturnComputer<T> {
    /// Creates a computer for `n`-step returns with discount `gamma`.
    ///
    /// # Panics
    ///
    /// Panics if `n` is zero or `gamma` is outside `(0, 1]`.
    pub fn new(n: usize, gamma: T, obs_dim: usize) -> Self {
        assert!(n >= 1, "n must be at least 1");
        assert!(
            gamma > T::zero() && gamma <= T::one(),
            "gamma must be in (0, 1]"
        );
        assert!(obs_dim > 0, "obs_dim must be positive");
        Self { n, gamma, obs_dim }
    }

    /// The window length `n`.
    pub fn n(&self) -> usize {
        self.n
    }

    /// The discount factor.
    pub fn gamma(&self) -> T {
        self.gamma
    }

    /// Computes returns, discounts and horizon observations for the
    /// given step indexes.
    ///
    /// `reward` and `done` hold one entry per step, `next_obs` holds
    /// `obs_dim` entries per step.
    ///
    /// # Errors
    ///
    /// Fails with [`ReplayError::LengthMismatch`] when the slice
    /// lengths are inconsistent.
    ///
    /// # Panics
    ///
    /// Panics if an index is out of range of the slices.
    pub fn compute(
        &self,
        indexes: &[usize],
        reward: &[T],
        next_obs: &[T],
        done: &[i8],
    ) -> Result<NStepBatch<T>, ReplayError> {
        let steps = reward.len();
        if done.len() != steps {
            return Err(ReplayError::LengthMismatch {
                expected: steps,
                actual: done.len(),
            });
        }
        if next_obs.len() != steps * self.obs_dim {
            return Err(ReplayError::LengthMismatch {
                expected: steps * self.obs_dim,
                actual: next_obs.len(),
            });
        }

        let mut batch = NStepBatch {
            returns: Vec::with_capacity(indexes.len()),
            discounts: Vec::with_capacity(indexes.len()),
            next_obs: Vec::with_capacity(indexes.len() * self.obs_dim),
            steps: Vec::with_capacity(indexes.len()),
            terminal: Vec::with_capacity(indexes.len()),
        };

        for &i in indexes.iter() {
            assert!(i < steps, "step index out of range");

            let mut ret = T::zero();
            let mut g = T::one();
            let mut m = 0;
            let mut horizon = i;
            for k in 0..self.n {
                let j = i + k;
                if j >= steps {
                    break;
                }
                ret = ret + g * reward[j];
                g = g * self.gamma;
                m += 1;
                horizon = j;
                if done[j] != 0 {
                    break;
                }
            }

            batch.returns.push(ret);
            batch.discounts.push(g);
            batch.steps.push(m);
            batch.terminal.push(done[horizon]);
            batch
                .next_obs
                .extend_from_slice(&next_obs[horizon * self.obs_dim..(horizon + 1) * self.obs_dim]);
        }

        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GAMMA: f64 = 0.99;

    /// Inputs of the reference scenario: 16 steps, unit rewards,
    /// episodes ending at steps 8 and 15, obs_dim = 3.
    fn reference_inputs() -> (Vec<f64>, Vec<f64>, Vec<i8>) {
        let steps = 16;
        let obs_dim = 3;
        let reward = vec![1.0; steps];
        let next_obs = (0..steps * obs_dim).map(|v| (v + 1) as f64).collect();
        let mut done = vec![0i8; steps];
        done[8] = 1;
        done[15] = 1;
        (reward, next_obs, done)
    }

    #[test]
    fn reference_scenario_returns_and_discounts() {
        let (reward, next_obs, done) = reference_inputs();
        let steps = reward.len();
        let computer = NStepReturnComputer::new(4, GAMMA, 3);
        let indexes: Vec<usize> = (0..steps).collect();
        let out = computer.compute(&indexes, &reward, &next_obs, &done).unwrap();

        for i in 0..steps {
            // First done flag at or after i, capped by the window.
            let done_at = (i..steps).find(|&j| done[j] != 0).unwrap();
            let m = 4.min(done_at - i + 1);

            let expected_ret: f64 = (0..m).map(|k| GAMMA.powi(k as i32)).sum();
            assert!(
                (out.returns[i] - expected_ret).abs() < 1e-9,
                "return at {}",
                i
            );
            assert!(
                (out.discounts[i] - GAMMA.powi(m as i32)).abs() < 1e-9,
                "discount at {}",
                i
            );
            assert_eq!(out.steps[i], m);

            // Horizon observation is the next_obs of step i + m - 1.
            let h = i + m - 1;
            assert_eq!(&out.next_obs[i * 3..(i + 1) * 3], &next_obs[h * 3..(h + 1) * 3]);
        }

        // Step 0: full window, 1 + g + g^2 + g^3 ~ 3.94.
        assert!((out.returns[0] - 3.9403989).abs() < 1e-6);
        assert_eq!(out.steps[0], 4);
        assert_eq!(out.terminal[0], 0);

        // Step 6: window covers 6, 7 and the terminal step 8.
        assert_eq!(out.steps[6], 3);
        assert!((out.discounts[6] - GAMMA.powi(3)).abs() < 1e-9);
        assert_eq!(out.terminal[6], 1);
    }

    #[test]
    fn buffer_end_truncation_is_not_terminal() {
        let reward = vec![1.0f64; 6];
        let next_obs: Vec<f64> = (0..6).map(|v| v as f64).collect();
        let done = vec![0i8; 6];
        let computer = NStepReturnComputer::new(4, GAMMA, 1);

        let out = computer.compute(&[4], &reward, &next_obs, &done).unwrap();
        // Only steps 4 and 5 fit in the window.
        assert_eq!(out.steps[0], 2);
        assert_eq!(out.terminal[0], 0);
        assert!((out.returns[0] - (1.0 + GAMMA)).abs() < 1e-9);
        assert!((out.discounts[0] - GAMMA * GAMMA).abs() < 1e-9);
        assert_eq!(out.next_obs[0], 5.0);
    }

    #[test]
    fn done_on_the_first_step_stops_the_window() {
        let reward = vec![2.0f64, 7.0];
        let next_obs = vec![10.0, 11.0];
        let done = vec![1i8, 0];
        let computer = NStepReturnComputer::new(3, GAMMA, 1);

        let out = computer.compute(&[0], &reward, &next_obs, &done).unwrap();
        assert_eq!(out.returns[0], 2.0);
        assert_eq!(out.steps[0], 1);
        assert_eq!(out.terminal[0], 1);
        assert!((out.discounts[0] - GAMMA).abs() < 1e-12);
        assert_eq!(out.next_obs[0], 10.0);
    }

    #[test]
    fn non_contiguous_indexes_are_independent() {
        let reward = vec![1.0f64, 2.0, 3.0, 4.0];
        let next_obs = vec![0.0, 1.0, 2.0, 3.0];
        let done = vec![0i8, 1, 0, 0];
        let computer = NStepReturnComputer::new(2, 0.5, 1);

        let out = computer.compute(&[2, 0], &reward, &next_obs, &done).unwrap();
        assert_eq!(out.returns, vec![3.0 + 0.5 * 4.0, 1.0 + 0.5 * 2.0]);
        assert_eq!(out.steps, vec![2, 2]);
        assert_eq!(out.terminal, vec![0, 1]);
    }

    #[test]
    fn inconsistent_slices_are_rejected() {
        let computer = NStepReturnComputer::new(2, 0.9f32, 2);
        let err = computer
            .compute(&[0], &[1.0, 1.0], &[0.0; 3], &[0, 0])
            .unwrap_err();
        assert_eq!(err, ReplayError::LengthMismatch { expected: 4, actual: 3 });
    }
}
