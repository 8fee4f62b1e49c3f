//! Scenario builder API.

use std::time::Duration;

use etch_core::{Point, SyncConfig};

use crate::{World, scenario::OracleFn};

/// One scripted action.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Join the room and open the shared surface
    Join(String),
    /// Draw a complete stroke
    Draw {
        /// Drawing peer
        peer: String,
        /// Stroke points
        points: Vec<Point>,
    },
    /// Delete the peer's `index`-th completed stroke in render order
    Delete {
        /// Deleting peer
        peer: String,
        /// Render-order index
        index: usize,
    },
    /// Clear the canvas
    ClearAll(String),
    /// Close the shared surface
    Deactivate(String),
    /// Leave the room
    Leave(String),
    /// Deliver every in-flight payload
    Deliver,
    /// Advance virtual time
    Advance(Duration),
}

/// Scenario builder.
///
/// Add steps, then call [`Scenario::oracle`] to obtain something runnable.
#[derive(Debug, Clone)]
pub struct Scenario {
    name: String,
    seed: u64,
    config: SyncConfig,
    steps: Vec<Step>,
}

impl Scenario {
    /// Create an empty scenario.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), seed: 0, config: SyncConfig::default(), steps: Vec::new() }
    }

    /// Seed the world's randomness.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Use custom sync timing for every peer.
    pub fn config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Append a step.
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Join the room and open the surface.
    pub fn join(self, peer: impl Into<String>) -> Self {
        self.step(Step::Join(peer.into()))
    }

    /// Draw a stroke from `(x, y)` pairs.
    pub fn draw(self, peer: impl Into<String>, points: &[(f32, f32)]) -> Self {
        let points = points.iter().map(|&(x, y)| Point::new(x, y)).collect();
        self.step(Step::Draw { peer: peer.into(), points })
    }

    /// Delete the peer's `index`-th stroke.
    pub fn delete(self, peer: impl Into<String>, index: usize) -> Self {
        self.step(Step::Delete { peer: peer.into(), index })
    }

    /// Clear the canvas.
    pub fn clear_all(self, peer: impl Into<String>) -> Self {
        self.step(Step::ClearAll(peer.into()))
    }

    /// Leave the room.
    pub fn leave(self, peer: impl Into<String>) -> Self {
        self.step(Step::Leave(peer.into()))
    }

    /// Deliver everything in flight.
    pub fn deliver(self) -> Self {
        self.step(Step::Deliver)
    }

    /// Advance virtual time by `millis`.
    pub fn advance_ms(self, millis: u64) -> Self {
        self.step(Step::Advance(Duration::from_millis(millis)))
    }

    /// Set the oracle and return a runnable scenario.
    pub fn oracle(self, oracle: OracleFn) -> RunnableScenario {
        RunnableScenario { scenario: self, oracle }
    }
}

/// A scenario with its oracle.
pub struct RunnableScenario {
    scenario: Scenario,
    oracle: OracleFn,
}

impl RunnableScenario {
    /// Run every step against a fresh world, then the oracle.
    pub fn run(self) -> Result<World, String> {
        let Scenario { name, seed, config, steps } = self.scenario;
        let mut world = World::with_config(seed, config);

        for (n, step) in steps.into_iter().enumerate() {
            run_step(&mut world, step).map_err(|e| format!("scenario '{name}', step {n}: {e}"))?;
        }

        (self.oracle)(&world).map_err(|e| format!("scenario '{name}': {e}"))?;
        Ok(world)
    }
}

fn run_step(world: &mut World, step: Step) -> Result<(), String> {
    match step {
        Step::Join(peer) => world.join_and_activate(peer),
        Step::Draw { peer, points } => {
            require_peer(world, &peer)?;
            world.draw(&peer, &points).ok_or("cannot draw a stroke without points")?;
        },
        Step::Delete { peer, index } => {
            require_peer(world, &peer)?;
            let ids = world.stroke_ids(&peer);
            let id = ids
                .get(index)
                .ok_or_else(|| format!("{peer} has {} strokes, no index {index}", ids.len()))?;
            world.delete(&peer, id);
        },
        Step::ClearAll(peer) => {
            require_peer(world, &peer)?;
            world.clear_all(&peer);
        },
        Step::Deactivate(peer) => {
            require_peer(world, &peer)?;
            world.deactivate(&peer);
        },
        Step::Leave(peer) => {
            require_peer(world, &peer)?;
            world.leave(&peer);
        },
        Step::Deliver => {
            world.deliver_all();
        },
        Step::Advance(duration) => world.advance(duration),
    }
    Ok(())
}

fn require_peer(world: &World, peer: &str) -> Result<(), String> {
    match world.peer(peer) {
        Some(_) => Ok(()),
        None => Err(format!("unknown peer {peer}")),
    }
}
