//! Wire format for the Etch annotation sync protocol.
//!
//! Every message travels as a single payload on a room-scoped group channel.
//! The channel is broadcast-only, so messages meant for one peer (the
//! catch-up snapshot) carry the recipient's id inside the payload.
//!
//! Payloads are CBOR maps with a `type` key naming the message kind and
//! camelCase field keys. CBOR keeps the encoding compact for the
//! high-frequency `stroke_update` traffic while staying self-describing, which
//! is what lets a receiver tell an unknown-but-well-formed message apart from
//! garbage.
//!
//! # Security
//!
//! Decoding never panics. Payloads above [`MAX_PAYLOAD_SIZE`] are rejected
//! before parsing. There is no authentication at this layer: any member of the
//! room can publish any message.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
pub mod errors;
pub mod message;

pub use codec::{MAX_PAYLOAD_SIZE, decode, encode};
pub use errors::{ProtocolError, Result};
pub use message::{Message, MessageKind, Point, Stroke, StrokeData, Tool};
