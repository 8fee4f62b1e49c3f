//! Reusable oracles.

use etch_core::SyncState;

use crate::scenario::OracleFn;

/// Every joined peer finished catch-up.
pub fn all_synced() -> OracleFn {
    Box::new(|world| {
        for name in world.joined_peers() {
            let state = world.sync_state(&name);
            if state != Some(SyncState::Synced) {
                return Err(format!("{name} is {state:?}, expected Synced"));
            }
        }
        Ok(())
    })
}

/// Every joined peer holds the same completed strokes in the same order.
pub fn converged() -> OracleFn {
    Box::new(|world| {
        let peers = world.joined_peers();
        let Some((first, rest)) = peers.split_first() else {
            return Ok(());
        };

        let expected = world.strokes(first);
        for name in rest {
            let actual = world.strokes(name);
            if actual != expected {
                return Err(format!(
                    "{name} holds {:?}, {first} holds {:?}",
                    ids(&actual),
                    ids(&expected)
                ));
            }
        }
        Ok(())
    })
}

/// No joined peer holds a remote in-progress stroke.
pub fn no_active_strokes() -> OracleFn {
    Box::new(|world| {
        for name in world.joined_peers() {
            let active = world.active_count(&name);
            if active > 0 {
                return Err(format!("{name} still holds {active} in-progress strokes"));
            }
        }
        Ok(())
    })
}

/// Every joined peer holds exactly `count` completed strokes.
pub fn stroke_count(count: usize) -> OracleFn {
    Box::new(move |world| {
        for name in world.joined_peers() {
            let actual = world.strokes(&name).len();
            if actual != count {
                return Err(format!("{name} holds {actual} strokes, expected {count}"));
            }
        }
        Ok(())
    })
}

/// All oracles must pass; reports the first failure.
pub fn all_of(oracles: Vec<OracleFn>) -> OracleFn {
    Box::new(move |world| oracles.iter().try_for_each(|oracle| oracle(world)))
}

fn ids(strokes: &[etch_core::Stroke]) -> Vec<&str> {
    strokes.iter().map(|s| s.id.as_str()).collect()
}
