//! Protocol error types.

use thiserror::Error;

/// Result alias for codec operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while encoding or decoding a payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Payload is not a well-formed message.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// Payload is a well-formed message of a kind this peer does not know.
    ///
    /// Newer peers may add message kinds; receivers log and skip these.
    #[error("unknown message kind: {kind}")]
    UnknownKind {
        /// The `type` tag found in the payload.
        kind: String,
    },

    /// Payload exceeds [`crate::MAX_PAYLOAD_SIZE`].
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Actual payload size.
        size: usize,
        /// Maximum accepted size.
        max: usize,
    },

    /// Serializing a message failed.
    #[error("failed to encode {kind} message: {reason}")]
    Encode {
        /// Wire name of the message kind.
        kind: &'static str,
        /// Underlying serializer error.
        reason: String,
    },
}

impl ProtocolError {
    /// Whether this error indicates forward-compatible traffic rather than a
    /// broken payload.
    pub fn is_unknown_kind(&self) -> bool {
        matches!(self, Self::UnknownKind { .. })
    }
}
