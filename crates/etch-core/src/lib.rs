//! Etch annotation sync core
//!
//! Pure state machine logic for keeping a shared freehand-drawing overlay
//! consistent across the peers of one collaborative session, decoupled from
//! I/O so it can be driven by a production runtime or a deterministic
//! simulation alike.
//!
//! # Architecture
//!
//! The [`SyncController`] never sleeps, spawns or touches the network. Time and
//! randomness come from an [`Environment`] supplied by the caller. Every
//! operation returns declarative [`SyncAction`]s (publish this message, the
//! canvas changed, the sync state changed) that the driver executes. Timers are
//! deadlines: the driver asks [`SyncController::next_deadline`] when to call
//! [`SyncController::tick`].
//!
//! Two write paths feed the [`StrokeStore`]: the local user's gestures,
//! applied optimistically, and messages received from other peers. Both go
//! through the same idempotent store operations, so their relative ordering
//! never corrupts state.
//!
//! # Components
//!
//! - [`store`]: completed strokes, in-progress remote strokes, local gesture
//! - [`catchup`]: late-joiner state request/retry state machine
//! - [`controller`]: publish and receive paths
//! - [`event`]: events fed into the controller and actions it produces
//! - [`config`]: timing configuration
//! - [`role`]: participant roles for gating privileged actions
//! - [`mod@env`]: environment abstraction (time, RNG)

pub mod catchup;
pub mod config;
pub mod controller;
pub mod env;
pub mod event;
pub mod role;
pub mod store;

pub use catchup::{CatchUp, RetryOutcome, SyncState};
pub use config::SyncConfig;
pub use controller::{CanvasView, SyncController};
pub use env::Environment;
pub use etch_proto::{Message, MessageKind, Point, Stroke, StrokeData, Tool};
pub use event::{SyncAction, SyncEvent};
pub use role::ParticipantRole;
pub use store::{RemoteActiveStroke, StrokeStore};
