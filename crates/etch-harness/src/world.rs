//! Multi-peer world.
//!
//! Holds every simulated peer and an in-memory room. Published payloads queue
//! up in flight until the test delivers them; delivery reaches every joined
//! peer, the publisher included, in publish order. Nothing is delivered or
//! fired implicitly: tests drive the world with [`World::deliver_all`] and
//! [`World::advance`].

use std::{
    collections::{BTreeMap, VecDeque},
    time::Duration,
};

use bytes::Bytes;
use etch_core::{
    Environment, Message, MessageKind, Point, Stroke, SyncAction, SyncConfig, SyncController,
    SyncState,
};
use etch_proto::encode;
use tracing::{trace, warn};

use crate::SimEnv;

/// Upper bound on deliveries per [`World::deliver_all`] call.
const MAX_DELIVERIES: usize = 100_000;

/// A message some peer published, as recorded by the world.
#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    /// Virtual time of publication
    pub at: Duration,
    /// Publishing peer
    pub sender: String,
    /// Decoded message
    pub message: Message,
}

#[derive(Debug, Clone)]
struct Envelope {
    sender: String,
    payload: Bytes,
}

#[derive(Debug)]
struct Peer {
    controller: SyncController<SimEnv>,
    joined: bool,
}

/// Simulated room with any number of peers.
#[derive(Debug)]
pub struct World {
    env: SimEnv,
    config: SyncConfig,
    peers: BTreeMap<String, Peer>,
    in_flight: VecDeque<Envelope>,
    published: Vec<Published>,
}

impl World {
    /// Create an empty world seeded with `seed`.
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, SyncConfig::default())
    }

    /// Create an empty world whose peers use `config`.
    pub fn with_config(seed: u64, config: SyncConfig) -> Self {
        Self {
            env: SimEnv::with_seed(seed),
            config,
            peers: BTreeMap::new(),
            in_flight: VecDeque::new(),
            published: Vec::new(),
        }
    }

    /// The world's environment. All peers share its clock.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Virtual time since the world was created.
    pub fn elapsed(&self) -> Duration {
        self.env.elapsed()
    }

    /// Add a peer to the room.
    ///
    /// It receives everything published from now on but does not open its
    /// surface; see [`World::activate`].
    pub fn join(&mut self, name: impl Into<String>) {
        let name = name.into();
        let controller =
            SyncController::with_config(self.env.fork(), name.clone(), self.config.clone());
        self.peers.insert(name, Peer { controller, joined: true });
    }

    /// Open `name`'s shared surface, starting catch-up against every other
    /// joined peer.
    pub fn activate(&mut self, name: &str) {
        let remote_peers =
            self.peers.iter().filter(|(n, p)| p.joined && n.as_str() != name).count();
        self.with_peer(name, |c| c.activate_surface(remote_peers));
    }

    /// Join and activate in one step, as a client opening a session does.
    pub fn join_and_activate(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.join(name.clone());
        self.activate(&name);
    }

    /// Close `name`'s shared surface.
    pub fn deactivate(&mut self, name: &str) {
        self.with_peer(name, SyncController::deactivate_surface);
    }

    /// Remove `name` from the room and tell everyone else.
    ///
    /// The peer's controller stays inspectable.
    pub fn leave(&mut self, name: &str) {
        self.deactivate(name);
        if let Some(peer) = self.peers.get_mut(name) {
            peer.joined = false;
        }

        let others = self.joined_peers();
        for other in others {
            self.with_peer(&other, |c| c.peer_left(name));
        }
    }

    /// Draw a whole stroke through `name`'s local gesture path.
    ///
    /// Publishes one update for the first point, one for the rest and one
    /// completion. Returns the stroke id, or `None` if `points` is empty or
    /// the peer is unknown.
    pub fn draw(&mut self, name: &str, points: &[Point]) -> Option<String> {
        let (first, rest) = points.split_first()?;
        let id = self.start_stroke(name, *first)?;
        if !rest.is_empty() {
            self.extend_stroke(name, rest);
        }
        self.finish_stroke(name);
        Some(id)
    }

    /// Put `name`'s pen down. Returns the new stroke id.
    pub fn start_stroke(&mut self, name: &str, point: Point) -> Option<String> {
        let peer = self.peers.get_mut(name)?;
        let (id, actions) = peer.controller.start_local_stroke(point);
        self.apply(name, actions);
        Some(id)
    }

    /// Move `name`'s pen.
    pub fn extend_stroke(&mut self, name: &str, points: &[Point]) {
        self.with_peer(name, |c| c.extend_local_stroke(points.to_vec()));
    }

    /// Lift `name`'s pen.
    pub fn finish_stroke(&mut self, name: &str) {
        self.with_peer(name, SyncController::finish_local_stroke);
    }

    /// Delete a stroke as `name`.
    pub fn delete(&mut self, name: &str, stroke_id: &str) {
        self.with_peer(name, |c| c.delete_stroke(stroke_id));
    }

    /// Clear the canvas as `name`.
    pub fn clear_all(&mut self, name: &str) {
        self.with_peer(name, SyncController::clear_all);
    }

    /// Publish a raw payload into the room as `sender`.
    pub fn inject(&mut self, sender: impl Into<String>, payload: Bytes) {
        self.in_flight.push_back(Envelope { sender: sender.into(), payload });
    }

    /// Number of payloads waiting for delivery.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Deliver the oldest in-flight payload to every joined peer.
    ///
    /// Returns false if nothing was in flight.
    pub fn deliver_one(&mut self) -> bool {
        let Some(envelope) = self.in_flight.pop_front() else {
            return false;
        };

        for name in self.joined_peers() {
            trace!(from = %envelope.sender, to = %name, "deliver");
            self.with_peer(&name, |c| c.handle_payload(&envelope.payload, &envelope.sender));
        }
        true
    }

    /// Deliver until nothing is in flight. Returns the number of payloads
    /// delivered.
    pub fn deliver_all(&mut self) -> usize {
        let mut delivered = 0;
        while delivered < MAX_DELIVERIES && self.deliver_one() {
            delivered += 1;
        }
        if delivered == MAX_DELIVERIES {
            warn!(delivered, "delivery limit reached with payloads still in flight");
        }
        delivered
    }

    /// Advance virtual time by `duration`.
    ///
    /// Time stops at every peer deadline on the way. Due peers are ticked one
    /// at a time, each followed by full delivery, so a reply published at some
    /// instant is seen by everyone before the next peer's timer fires.
    pub fn advance(&mut self, duration: Duration) {
        let target = self.env.now() + duration;

        loop {
            let next = self
                .peers
                .values()
                .filter_map(|p| p.controller.next_deadline())
                .filter(|deadline| *deadline <= target)
                .min();
            let Some(next) = next else {
                break;
            };

            self.env.advance_to(next);
            self.tick_due();
        }

        self.env.advance_to(target);
        self.tick_due();
    }

    fn tick_due(&mut self) {
        let now = self.env.now();
        let names: Vec<String> = self.peers.keys().cloned().collect();
        for name in names {
            let due = self
                .peers
                .get(&name)
                .and_then(|p| p.controller.next_deadline())
                .is_some_and(|deadline| deadline <= now);
            if due {
                self.with_peer(&name, SyncController::tick);
                self.deliver_all();
            }
        }
    }

    // Inspection

    /// A peer's controller.
    pub fn peer(&self, name: &str) -> Option<&SyncController<SimEnv>> {
        self.peers.get(name).map(|p| &p.controller)
    }

    /// Names of all peers ever added, joined or not.
    pub fn peer_names(&self) -> Vec<String> {
        self.peers.keys().cloned().collect()
    }

    /// Names of peers currently in the room.
    pub fn joined_peers(&self) -> Vec<String> {
        self.peers.iter().filter(|(_, p)| p.joined).map(|(n, _)| n.clone()).collect()
    }

    /// Completed strokes held by `name`, in render order.
    pub fn strokes(&self, name: &str) -> Vec<Stroke> {
        self.peer(name)
            .map(|c| c.store().completed_strokes().cloned().collect())
            .unwrap_or_default()
    }

    /// Completed stroke ids held by `name`, in render order.
    pub fn stroke_ids(&self, name: &str) -> Vec<String> {
        self.strokes(name).into_iter().map(|s| s.id).collect()
    }

    /// Number of remote in-progress strokes `name` holds.
    pub fn active_count(&self, name: &str) -> usize {
        self.peer(name).map_or(0, |c| c.store().active_strokes().count())
    }

    /// `name`'s catch-up state.
    pub fn sync_state(&self, name: &str) -> Option<SyncState> {
        self.peer(name).map(SyncController::sync_state)
    }

    /// Every message published so far, in order.
    pub fn published(&self) -> &[Published] {
        &self.published
    }

    /// Messages of `kind` published by `sender`.
    pub fn published_by(&self, sender: &str, kind: MessageKind) -> Vec<&Published> {
        self.published
            .iter()
            .filter(|p| p.sender == sender && p.message.kind() == kind)
            .collect()
    }

    /// Number of messages of `kind` published by anyone.
    pub fn count_published(&self, kind: MessageKind) -> usize {
        self.published.iter().filter(|p| p.message.kind() == kind).count()
    }

    fn with_peer<F>(&mut self, name: &str, f: F)
    where
        F: FnOnce(&mut SyncController<SimEnv>) -> Vec<SyncAction>,
    {
        let Some(peer) = self.peers.get_mut(name) else {
            warn!(peer = %name, "no such peer");
            return;
        };
        let actions = f(&mut peer.controller);
        self.apply(name, actions);
    }

    fn apply(&mut self, sender: &str, actions: Vec<SyncAction>) {
        for action in actions {
            let SyncAction::Publish(message) = action else {
                continue;
            };
            let payload = match encode(&message) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(peer = %sender, error = %e, "failed to encode message");
                    continue;
                },
            };
            self.published.push(Published {
                at: self.env.elapsed(),
                sender: sender.to_string(),
                message,
            });
            self.in_flight.push_back(Envelope { sender: sender.to_string(), payload });
        }
    }
}
