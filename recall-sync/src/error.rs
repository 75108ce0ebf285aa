//! Errors of the concurrent access layer.
use thiserror::Error;

/// Errors raised by the channel-based writer machinery.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The channel to the collector rejected a flushed batch.
    #[error("Failed to send stored transitions to the collector")]
    SendFailed,
}
