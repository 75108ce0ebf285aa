#![warn(missing_docs)]
//! Concurrent access layer for the recall replay buffer.
//!
//! Two pieces wrap the single-threaded buffers of `recall-core` for
//! multi-threaded use:
//!
//! - [`SharedReplayBuffer`]: one coarse mutex around the whole buffer.
//!   Writers, samplers and priority updaters interleave arbitrarily,
//!   but each operation is atomic with respect to the ring cursor, the
//!   tree sums and the episode records.
//! - [`StoreProxy`] and [`Collector`]: a channel-based path for
//!   environment worker threads. Each worker accumulates transitions
//!   lock-free in its own proxy and ships them in batches to a single
//!   collector thread, which is the only writer of the shared buffer.
mod error;
mod proxy;
mod shared;
pub use error::SyncError;
pub use proxy::{Collector, StoreProxy, StoreProxyConfig};
pub use shared::SharedReplayBuffer;
