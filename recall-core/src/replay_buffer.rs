//! Replay buffer components and their composition.
//!
//! The components follow a leaf-first dependency order:
//!
//! - [`FixedCapacityRing`]: circular storage of transition fields with
//!   wraparound write-splitting and FIFO eviction.
//! - [`SumTree`]: flat-array sum tree mapping slot indexes to priority
//!   mass, with O(log capacity) point update and weighted selection.
//! - [`PrioritizedSampler`]: sum tree plus running max-priority,
//!   proportional sampling and importance weights.
//! - [`NStepReturnComputer`]: discounted multi-step returns truncated
//!   at episode boundaries.
//! - [`EpisodicStore`]: ring storage plus episode boundary records,
//!   with single-episode deletion and index compaction.
//! - [`ReplayBuffer`]: the composed buffer. Uniform, prioritized and
//!   n-step flavors are selected by [`ReplayBufferConfig`] rather than
//!   by separate types.
//!
//! # Examples
//!
//! ```
//! use recall_core::replay_buffer::{
//!     PerConfig, ReplayBuffer, ReplayBufferConfig, TransitionRef,
//! };
//!
//! let config = ReplayBufferConfig::default()
//!     .capacity(256)
//!     .obs_dim(3)
//!     .act_dim(1)
//!     .per_config(Some(PerConfig::default().alpha(0.6)));
//! let mut buffer = ReplayBuffer::<f32>::build(&config);
//!
//! let batch = TransitionRef {
//!     obs: &[0.1, 0.2, 0.3],
//!     act: &[1.0],
//!     reward: &[1.0],
//!     next_obs: &[0.2, 0.3, 0.4],
//!     done: &[0],
//! };
//! buffer.push(&batch).unwrap();
//! ```
mod base;
mod batch;
mod config;
mod episodic;
mod iw_scheduler;
mod nstep;
mod ring;
mod sampler;
mod sum_tree;
pub use base::ReplayBuffer;
pub use batch::{TransitionBatch, TransitionRef};
pub use config::{NStepConfig, PerConfig, ReplayBufferConfig};
pub use episodic::{EpisodeSpan, EpisodicStore};
pub use iw_scheduler::IwScheduler;
pub use nstep::{NStepBatch, NStepReturnComputer};
pub use ring::{FixedCapacityRing, RingView};
pub use sampler::PrioritizedSampler;
pub use sum_tree::SumTree;
