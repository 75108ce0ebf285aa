//! Configuration of the replay buffer.
//!
//! The buffer flavors are selected here rather than by separate types:
//! a [`ReplayBufferConfig`] without optional parts builds a uniform
//! buffer, adding [`PerConfig`] enables prioritized sampling and adding
//! [`NStepConfig`] turns sampled rewards into n-step returns.
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    default::Default,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of prioritized sampling.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct PerConfig {
    /// Exponent shaping the sampling distribution. Zero gives uniform
    /// sampling over prioritized slots, one uses raw priorities.
    pub alpha: f32,

    /// Initial importance-weight exponent.
    pub beta_0: f32,

    /// Final importance-weight exponent, typically 1.0 to fully
    /// compensate for the non-uniform sampling.
    pub beta_final: f32,

    /// Optimization step at which `beta` reaches its final value.
    pub n_opts_final: usize,
}

impl Default for PerConfig {
    fn default() -> Self {
        Self {
            alpha: 0.6,
            beta_0: 0.4,
            beta_final: 1.0,
            n_opts_final: 500_000,
        }
    }
}

impl PerConfig {
    /// Sets the prioritization exponent.
    pub fn alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    /// Sets the initial importance-weight exponent.
    pub fn beta_0(mut self, beta_0: f32) -> Self {
        self.beta_0 = beta_0;
        self
    }

    /// Sets the final importance-weight exponent.
    pub fn beta_final(mut self, beta_final: f32) -> Self {
        self.beta_final = beta_final;
        self
    }

    /// Sets the step at which `beta` saturates.
    pub fn n_opts_final(mut self, n_opts_final: usize) -> Self {
        self.n_opts_final = n_opts_final;
        self
    }
}

/// Configuration of n-step return computation.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct NStepConfig {
    /// Number of steps in the return window, at least 1.
    pub n: usize,

    /// Discount factor in `(0, 1]`.
    pub gamma: f32,
}

impl Default for NStepConfig {
    fn default() -> Self {
        Self { n: 3, gamma: 0.99 }
    }
}

impl NStepConfig {
    /// Sets the window length.
    pub fn n(mut self, n: usize) -> Self {
        self.n = n;
        self
    }

    /// Sets the discount factor.
    pub fn gamma(mut self, gamma: f32) -> Self {
        self.gamma = gamma;
        self
    }
}

/// Configuration of the composed replay buffer.
///
/// # Examples
///
/// ```
/// use recall_core::replay_buffer::{NStepConfig, PerConfig, ReplayBufferConfig};
///
/// let config = ReplayBufferConfig::default()
///     .capacity(100_000)
///     .obs_dim(8)
///     .act_dim(2)
///     .seed(7)
///     .per_config(Some(PerConfig::default().alpha(0.7)))
///     .n_step_config(Some(NStepConfig::default().n(4).gamma(0.99)));
/// ```
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ReplayBufferConfig {
    /// Maximum number of stored transitions. Once reached, new writes
    /// overwrite the oldest slots in insertion order.
    pub capacity: usize,

    /// Observation dimensionality.
    pub obs_dim: usize,

    /// Action dimensionality.
    pub act_dim: usize,

    /// Seed of the sampling random number generators.
    pub seed: u64,

    /// Prioritized sampling, `None` for uniform sampling.
    pub per_config: Option<PerConfig>,

    /// N-step returns, `None` for raw single-step rewards.
    pub n_step_config: Option<NStepConfig>,
}

impl Default for ReplayBufferConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            obs_dim: 1,
            act_dim: 1,
            seed: 42,
            per_config: None,
            n_step_config: None,
        }
    }
}

impl ReplayBufferConfig {
    /// Sets the capacity.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the observation dimensionality.
    pub fn obs_dim(mut self, obs_dim: usize) -> Self {
        self.obs_dim = obs_dim;
        self
    }

    /// Sets the action dimensionality.
    pub fn act_dim(mut self, act_dim: usize) -> Self {
        self.act_dim = act_dim;
        self
    }

    /// Sets the sampling seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Enables or disables prioritized sampling.
    pub fn per_config(mut self, per_config: Option<PerConfig>) -> Self {
        self.per_config = per_config;
        self
    }

    /// Enables or disables n-step returns.
    pub fn n_step_config(mut self, n_step_config: Option<NStepConfig>) -> Self {
        self.n_step_config = n_step_config;
        self
    }

    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves the configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
