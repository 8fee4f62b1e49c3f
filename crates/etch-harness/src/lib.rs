//! Deterministic simulation harness for Etch.
//!
//! Runs any number of [`etch_core::SyncController`]s against an in-memory
//! room with a virtual clock and seeded randomness, so multi-peer behavior
//! (catch-up, retries, jittered replies) is reproducible from a seed.
//!
//! - [`SimEnv`]: virtual clock + ChaCha RNG
//! - [`World`]: peers, in-flight payloads, delivery and time control
//! - [`scenario`]: declarative scenario builder with mandatory oracle
//! - [`model`]: reference model and operations for model-based tests

pub mod logging;
pub mod model;
pub mod scenario;
pub mod sim_env;
pub mod world;

pub use logging::init_tracing;
pub use model::{ModelWorld, Operation, run_operations};
pub use sim_env::SimEnv;
pub use world::{Published, World};
