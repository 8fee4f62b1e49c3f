//! Application layer for Etch
//!
//! Runs a [`etch_core::SyncController`] against a real group channel on a
//! tokio task. The controller stays sans-IO; this crate supplies the clock,
//! the randomness and the event loop that executes its actions.
//!
//! # Components
//!
//! - [`Channel`]: group messaging channel abstraction
//! - [`BroadcastRoom`]: in-process channel over `tokio::sync::broadcast`
//! - [`Runtime`]: event loop driving one controller
//! - [`RuntimeHandle`]: UI-side handle for commands and the canvas view
//! - [`SystemEnv`]: production environment (tokio clock, OS randomness)

mod channel;
mod error;
mod runtime;
mod system_env;

pub use channel::{BroadcastChannel, BroadcastRoom, Channel, Inbound};
pub use error::{ChannelError, RuntimeError};
pub use runtime::{Runtime, RuntimeConfig, RuntimeHandle};
pub use system_env::SystemEnv;
