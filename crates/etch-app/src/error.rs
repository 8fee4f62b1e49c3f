//! Application layer errors.

use thiserror::Error;

/// Errors from a group channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The channel has no remaining members to deliver to.
    #[error("channel closed")]
    Closed,
}

/// Errors from talking to a runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// The runtime task has exited.
    #[error("runtime stopped")]
    Stopped,
}
