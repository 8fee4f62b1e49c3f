//! Reference model for model-based tests.
//!
//! The model is the obvious single-copy canvas: an ordered list of stroke
//! ids. [`run_operations`] applies the same operations to a real [`World`]
//! (delivering everything after each one) and checks that every peer ends up
//! holding exactly what the model holds, in the same order.
//!
//! ```text
//! Vec<Operation>
//!      │
//!      ├──> ModelWorld (single ordered list)
//!      │
//!      └──> World (N controllers, encoded payloads, virtual time)
//!                  │
//!                  └──> every peer's completed strokes == model
//! ```

use std::time::Duration;

use arbitrary::Arbitrary;
use etch_core::{Point, SyncState};

use crate::World;

/// One user-level action against the shared canvas.
#[derive(Debug, Clone, PartialEq, Eq, Arbitrary)]
pub enum Operation {
    /// A peer draws a stroke of `points` points (at least one)
    Draw {
        /// Peer index, taken modulo the peer count
        peer: u8,
        /// Number of points
        points: u8,
    },
    /// A peer deletes a stroke
    Delete {
        /// Peer index, taken modulo the peer count
        peer: u8,
        /// Stroke index, taken modulo the stroke count
        stroke: u8,
    },
    /// A peer clears the canvas
    ClearAll {
        /// Peer index, taken modulo the peer count
        peer: u8,
    },
    /// Virtual time passes
    AdvanceTime {
        /// Milliseconds
        millis: u16,
    },
}

/// Single-copy reference canvas.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelWorld {
    strokes: Vec<String>,
}

impl ModelWorld {
    /// Empty canvas.
    pub fn new() -> Self {
        Self::default()
    }

    /// A stroke was completed.
    pub fn draw(&mut self, id: String) {
        self.strokes.push(id);
    }

    /// A stroke was deleted.
    pub fn delete(&mut self, id: &str) {
        self.strokes.retain(|s| s != id);
    }

    /// The canvas was cleared.
    pub fn clear_all(&mut self) {
        self.strokes.clear();
    }

    /// Stroke ids in render order.
    pub fn strokes(&self) -> &[String] {
        &self.strokes
    }
}

/// Run `operations` against `peers` simulated peers and the reference model.
///
/// All peers join and finish catch-up first. Returns a description of the
/// first divergence.
pub fn run_operations(seed: u64, peers: usize, operations: &[Operation]) -> Result<(), String> {
    let peers = peers.max(1);
    let names: Vec<String> = (0..peers).map(|n| format!("peer-{n}")).collect();

    let mut world = World::new(seed);
    let mut model = ModelWorld::new();

    for name in &names {
        world.join_and_activate(name.clone());
        world.deliver_all();
    }
    // Let jittered replies and retries settle
    world.advance(Duration::from_secs(30));

    for name in &names {
        if world.sync_state(name) != Some(SyncState::Synced) {
            return Err(format!("{name} did not finish catch-up"));
        }
    }

    for (step, op) in operations.iter().enumerate() {
        apply(&mut world, &mut model, &names, op);
        world.deliver_all();
        check(&world, &model, &names).map_err(|e| format!("after step {step} {op:?}: {e}"))?;
    }

    Ok(())
}

fn apply(world: &mut World, model: &mut ModelWorld, names: &[String], op: &Operation) {
    match *op {
        Operation::Draw { peer, points } => {
            let name = &names[usize::from(peer) % names.len()];
            let points: Vec<Point> = (0..points.max(1))
                .map(|i| {
                    let t = f32::from(i) / 255.0;
                    Point::new(t, 1.0 - t)
                })
                .collect();
            if let Some(id) = world.draw(name, &points) {
                model.draw(id);
            }
        },
        Operation::Delete { peer, stroke } => {
            if model.strokes().is_empty() {
                return;
            }
            let name = &names[usize::from(peer) % names.len()];
            let id = model.strokes()[usize::from(stroke) % model.strokes().len()].clone();
            world.delete(name, &id);
            model.delete(&id);
        },
        Operation::ClearAll { peer } => {
            let name = &names[usize::from(peer) % names.len()];
            world.clear_all(name);
            model.clear_all();
        },
        Operation::AdvanceTime { millis } => {
            world.advance(Duration::from_millis(u64::from(millis)));
        },
    }
}

fn check(world: &World, model: &ModelWorld, names: &[String]) -> Result<(), String> {
    for name in names {
        let ids = world.stroke_ids(name);
        if ids != model.strokes() {
            return Err(format!("{name} holds {ids:?}, model holds {:?}", model.strokes()));
        }
        let active = world.active_count(name);
        if active > 0 {
            return Err(format!("{name} holds {active} in-progress strokes"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_tracks_order_and_removal() {
        let mut model = ModelWorld::new();
        model.draw("a".into());
        model.draw("b".into());
        model.draw("c".into());
        model.delete("b");
        assert_eq!(model.strokes(), ["a".to_string(), "c".to_string()]);

        model.clear_all();
        assert!(model.strokes().is_empty());
    }

    #[test]
    fn empty_run_converges() {
        assert_eq!(run_operations(1, 3, &[]), Ok(()));
    }
}
