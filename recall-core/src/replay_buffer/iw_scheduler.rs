//! Scheduling of the importance-weight exponent.
use serde::{Deserialize, Serialize};

/// Linear schedule of the importance-weight exponent `beta`.
///
/// `beta` ramps from `beta_0` to `beta_final` over `n_opts_final`
/// optimization steps and stays at `beta_final` afterwards. The
/// composed buffer advances the step counter once per priority update.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct IwScheduler {
    /// Initial exponent.
    pub beta_0: f32,

    /// Final exponent.
    pub beta_final: f32,

    /// Optimization step at which `beta` reaches `beta_final`.
    pub n_opts_final: usize,

    /// Optimization steps taken so far.
    pub n_opts: usize,
}

impl IwScheduler {
    /// Creates a scheduler.
    pub fn new(beta_0: f32, beta_final: f32, n_opts_final: usize) -> Self {
        Self {
            beta_0,
            beta_final,
            n_opts_final,
            n_opts: 0,
        }
    }

    /// The current exponent.
    pub fn beta(&self) -> f32 {
        if self.n_opts >= self.n_opts_final {
            self.beta_final
        } else {
            let d = self.beta_final - self.beta_0;
            self.beta_0 + d * (self.n_opts as f32 / self.n_opts_final as f32)
        }
    }

    /// Records one optimization step.
    pub fn add_n_opts(&mut self) {
        self.n_opts += 1;
    }
}
