//! Scenario-based testing with mandatory oracle verification.
//!
//! A scenario is a named script of peer actions run against a fresh
//! [`World`]. Every scenario must end with an oracle: a check over the final
//! world state. A scenario that cannot state what "correct" means does not
//! run.

mod builder;
pub mod oracle;

pub use builder::{RunnableScenario, Scenario, Step};

use crate::World;

/// Final-state check. Returns a description of the first violation.
pub type OracleFn = Box<dyn Fn(&World) -> Result<(), String>>;
