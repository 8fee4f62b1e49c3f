//! Sync controller: the protocol engine.
//!
//! Owns the [`StrokeStore`] and all per-session protocol state for one local
//! peer. Construct one controller per collaborative session; nothing here is
//! process-wide.
//!
//! # Publish path
//!
//! `publish_*` methods return [`SyncAction::Publish`] actions. They never loop
//! a message back into the local store: local edits are applied optimistically
//! by the caller (or by the `*_local_*` intent helpers, which do both).
//!
//! # Receive path
//!
//! [`SyncController::handle_payload`] decodes one channel payload and
//! dispatches it with a single exhaustive match in
//! [`SyncController::handle_message`]:
//!
//! | Message | Rule |
//! |---|---|
//! | `stroke_update` | ignored from self; otherwise create/append remote active stroke |
//! | `stroke_complete` | ignored from self; otherwise replace active with completed |
//! | `stroke_delete` | applied from anyone, self included (no-op then) |
//! | `clear_all` | applied from anyone |
//! | `state_request` | answered once per requester per session, after jitter |
//! | `state_snapshot` | applied only if addressed to us while active; first one wins |
//!
//! # Timers
//!
//! Two kinds of deadline exist: the catch-up request timeout and the jittered
//! snapshot replies. [`SyncController::next_deadline`] reports the earliest;
//! [`SyncController::tick`] fires whatever is due.

use std::{
    collections::HashSet,
    time::{Duration, Instant},
};

use etch_proto::{Message, Point, ProtocolError, Stroke, StrokeData, Tool, decode};
use tracing::{debug, info, trace, warn};

use crate::{
    catchup::{CatchUp, RetryOutcome, SyncState},
    config::SyncConfig,
    env::Environment,
    event::{SyncAction, SyncEvent},
    store::{RemoteActiveStroke, StrokeStore},
};

/// Owned copy of everything a renderer needs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CanvasView {
    /// Catch-up progress
    pub sync_state: SyncState,
    /// Completed strokes in render order
    pub strokes: Vec<Stroke>,
    /// Strokes other peers are drawing
    pub active_strokes: Vec<RemoteActiveStroke>,
    /// The local gesture in progress
    pub local_stroke: Option<Stroke>,
}

impl CanvasView {
    /// Ids of the completed strokes in render order.
    pub fn stroke_ids(&self) -> Vec<&str> {
        self.strokes.iter().map(|s| s.id.as_str()).collect()
    }
}

/// A snapshot reply waiting out its jitter delay.
#[derive(Debug, Clone)]
struct PendingResponse {
    requester_id: String,
    due: Instant,
}

/// Annotation sync state machine for one local peer.
#[derive(Debug)]
pub struct SyncController<E: Environment> {
    env: E,
    config: SyncConfig,
    local_peer_id: String,
    store: StrokeStore,
    catch_up: CatchUp,
    /// Requesters already answered (or scheduled) this session
    responded_to: HashSet<String>,
    pending_responses: Vec<PendingResponse>,
    surface_active: bool,
}

impl<E: Environment> SyncController<E> {
    /// Create a controller with default timing.
    pub fn new(env: E, local_peer_id: impl Into<String>) -> Self {
        Self::with_config(env, local_peer_id, SyncConfig::default())
    }

    /// Create a controller with custom timing.
    pub fn with_config(env: E, local_peer_id: impl Into<String>, config: SyncConfig) -> Self {
        Self {
            env,
            config,
            local_peer_id: local_peer_id.into(),
            store: StrokeStore::new(),
            catch_up: CatchUp::new(),
            responded_to: HashSet::new(),
            pending_responses: Vec::new(),
            surface_active: false,
        }
    }

    /// Id of the local peer.
    pub fn local_peer_id(&self) -> &str {
        &self.local_peer_id
    }

    /// Current catch-up state.
    pub fn sync_state(&self) -> SyncState {
        self.catch_up.state()
    }

    /// Timing configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Whether the shared surface is active.
    pub fn is_surface_active(&self) -> bool {
        self.surface_active
    }

    /// Stroke storage.
    pub fn store(&self) -> &StrokeStore {
        &self.store
    }

    /// Mutable stroke storage, for the local optimistic path.
    pub fn store_mut(&mut self) -> &mut StrokeStore {
        &mut self.store
    }

    /// Number of state requests sent this session.
    pub fn request_attempts(&self) -> u32 {
        self.catch_up.attempts()
    }

    /// Owned copy of the canvas for rendering.
    pub fn view(&self) -> CanvasView {
        CanvasView {
            sync_state: self.sync_state(),
            strokes: self.store.completed_strokes().cloned().collect(),
            active_strokes: self.store.active_strokes().cloned().collect(),
            local_stroke: self.store.local_stroke().cloned(),
        }
    }

    /// Earliest pending deadline, if any.
    ///
    /// The driver should call [`Self::tick`] once this instant is reached.
    pub fn next_deadline(&self) -> Option<Instant> {
        let response = self.pending_responses.iter().map(|p| p.due).min();
        match (self.catch_up.deadline(), response) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Process one event.
    pub fn handle(&mut self, event: SyncEvent) -> Vec<SyncAction> {
        match event {
            SyncEvent::Received { payload, sender_id } => self.handle_payload(&payload, &sender_id),
            SyncEvent::Tick => self.tick(),
            SyncEvent::SurfaceActivated { remote_peers } => self.activate_surface(remote_peers),
            SyncEvent::SurfaceDeactivated => self.deactivate_surface(),
            SyncEvent::PeerLeft { peer_id } => self.peer_left(&peer_id),
            SyncEvent::StartStroke { point } => self.start_local_stroke(point).1,
            SyncEvent::ExtendStroke { points } => self.extend_local_stroke(points),
            SyncEvent::FinishStroke => self.finish_local_stroke(),
            SyncEvent::DeleteStroke { stroke_id } => self.delete_stroke(&stroke_id),
            SyncEvent::ClearAll => self.clear_all(),
            SyncEvent::SelectTool { tool } => {
                self.store.set_tool(tool);
                Vec::new()
            },
            SyncEvent::SelectColor { color } => {
                self.store.set_color(color);
                Vec::new()
            },
        }
    }

    // Session lifecycle

    /// The shared surface became active.
    ///
    /// Starts catch-up: with at least one remote peer a `state_request` goes
    /// out immediately; with none this peer is first and is synced at once.
    pub fn activate_surface(&mut self, remote_peers: usize) -> Vec<SyncAction> {
        if self.surface_active {
            debug!("surface already active");
            return Vec::new();
        }
        self.surface_active = true;

        let before = self.sync_state();
        let mut actions = Vec::new();

        if self.catch_up.begin(self.env.now(), remote_peers, &self.config) {
            info!(peer = %self.local_peer_id, remote_peers, "requesting annotation state");
            actions.push(SyncAction::Publish(self.state_request()));
        } else {
            debug!(peer = %self.local_peer_id, remote_peers, "no catch-up needed");
        }

        self.push_state_change(before, &mut actions);
        actions
    }

    /// The shared surface went away. Tears the session down.
    pub fn deactivate_surface(&mut self) -> Vec<SyncAction> {
        self.surface_active = false;
        self.teardown()
    }

    /// Reset all per-session state.
    ///
    /// Cancels the request timeout and pending snapshot replies, forgets which
    /// requesters were answered and whether a snapshot arrived, and discards
    /// in-progress remote strokes. Completed strokes stay.
    pub fn teardown(&mut self) -> Vec<SyncAction> {
        let before = self.sync_state();
        let mut actions = Vec::new();

        self.catch_up.reset();
        self.responded_to.clear();
        self.pending_responses.clear();

        if self.store.discard_all_active() > 0 {
            actions.push(SyncAction::StrokesChanged);
        }

        debug!(peer = %self.local_peer_id, "sync session torn down");
        self.push_state_change(before, &mut actions);
        actions
    }

    /// A peer left the room; its unfinished strokes are discarded.
    pub fn peer_left(&mut self, peer_id: &str) -> Vec<SyncAction> {
        self.pending_responses.retain(|p| p.requester_id != peer_id);

        let discarded = self.store.discard_active_by_author(peer_id);
        if discarded == 0 {
            return Vec::new();
        }
        debug!(peer = %peer_id, discarded, "discarded in-progress strokes of departed peer");
        vec![SyncAction::StrokesChanged]
    }

    /// Fire every deadline that has passed.
    pub fn tick(&mut self) -> Vec<SyncAction> {
        let now = self.env.now();
        let mut actions = self.fire_due_responses(now);

        match self.catch_up.poll_timeout(now, &self.config) {
            RetryOutcome::Pending => {},
            RetryOutcome::Resend { attempt } => {
                info!(peer = %self.local_peer_id, attempt, "no snapshot yet, resending request");
                actions.push(SyncAction::Publish(self.state_request()));
            },
            RetryOutcome::Exhausted => {
                info!(
                    peer = %self.local_peer_id,
                    attempts = self.catch_up.attempts(),
                    "no snapshot received, assuming empty remote state"
                );
                actions.push(SyncAction::SyncStateChanged(SyncState::Synced));
            },
        }

        actions
    }

    // Publish path

    /// Publish points appended to an in-progress stroke.
    ///
    /// Does nothing when `points` is empty.
    pub fn publish_stroke_update(
        &self,
        stroke_id: &str,
        author_id: &str,
        tool: Tool,
        color: &str,
        points: Vec<Point>,
    ) -> Vec<SyncAction> {
        if points.is_empty() {
            return Vec::new();
        }

        vec![SyncAction::Publish(Message::StrokeUpdate(StrokeData {
            stroke_id: stroke_id.to_string(),
            author_id: author_id.to_string(),
            tool,
            color: color.to_string(),
            points,
            timestamp: self.env.unix_millis(),
        }))]
    }

    /// Publish a finished stroke with its full point list.
    ///
    /// The timestamp carries the stroke's creation time, so every receiver
    /// stores an identical stroke.
    pub fn publish_stroke(&self, stroke: &Stroke) -> Vec<SyncAction> {
        vec![SyncAction::Publish(Message::StrokeComplete(StrokeData {
            stroke_id: stroke.id.clone(),
            author_id: stroke.author_id.clone(),
            tool: stroke.tool,
            color: stroke.color.clone(),
            points: stroke.points.clone(),
            timestamp: stroke.created_at,
        }))]
    }

    /// Publish a stroke deletion. The caller deletes locally.
    pub fn publish_delete(&self, stroke_id: &str) -> Vec<SyncAction> {
        vec![SyncAction::Publish(Message::StrokeDelete {
            stroke_id: stroke_id.to_string(),
            deleted_by: self.local_peer_id.clone(),
            timestamp: self.env.unix_millis(),
        })]
    }

    /// Publish a canvas clear.
    ///
    /// No access check happens here; callers gate this by role.
    pub fn publish_clear_all(&self) -> Vec<SyncAction> {
        vec![SyncAction::Publish(Message::ClearAll {
            cleared_by: self.local_peer_id.clone(),
            timestamp: self.env.unix_millis(),
        })]
    }

    // Local intents: optimistic apply + publish

    /// Start a local stroke with the selected tool and color.
    ///
    /// Returns the minted stroke id.
    pub fn start_local_stroke(&mut self, point: Point) -> (String, Vec<SyncAction>) {
        let id = self.mint_stroke_id();
        let created_at = self.env.unix_millis();
        let author = self.local_peer_id.clone();

        let stroke = self.store.begin_local_stroke(id.clone(), author, point, created_at);
        let (tool, color) = (stroke.tool, stroke.color.clone());

        let mut actions =
            self.publish_stroke_update(&id, &self.local_peer_id, tool, &color, vec![point]);
        actions.push(SyncAction::StrokesChanged);
        (id, actions)
    }

    /// Extend the local stroke.
    pub fn extend_local_stroke(&mut self, points: Vec<Point>) -> Vec<SyncAction> {
        if points.is_empty() {
            return Vec::new();
        }
        let Some(stroke) = self.store.extend_local_stroke(&points) else {
            debug!("extend without a local stroke in progress");
            return Vec::new();
        };
        let (id, tool, color) = (stroke.id.clone(), stroke.tool, stroke.color.clone());

        let mut actions =
            self.publish_stroke_update(&id, &self.local_peer_id, tool, &color, points);
        actions.push(SyncAction::StrokesChanged);
        actions
    }

    /// Finish the local stroke and publish it.
    pub fn finish_local_stroke(&mut self) -> Vec<SyncAction> {
        let Some(stroke) = self.store.finish_local_stroke() else {
            debug!("finish without a local stroke in progress");
            return Vec::new();
        };

        let mut actions = self.publish_stroke(&stroke);
        actions.push(SyncAction::StrokesChanged);
        actions
    }

    /// Delete a stroke locally and publish the deletion.
    pub fn delete_stroke(&mut self, stroke_id: &str) -> Vec<SyncAction> {
        let changed = self.store.delete_stroke(stroke_id);
        let mut actions = self.publish_delete(stroke_id);
        if changed {
            actions.push(SyncAction::StrokesChanged);
        }
        actions
    }

    /// Clear the canvas locally and publish the clear.
    pub fn clear_all(&mut self) -> Vec<SyncAction> {
        let changed = self.store.clear_all();
        let mut actions = self.publish_clear_all();
        if changed {
            actions.push(SyncAction::StrokesChanged);
        }
        actions
    }

    // Receive path

    /// Decode and apply one channel payload.
    ///
    /// Undecodable payloads are logged and dropped; the channel may carry
    /// unrelated traffic.
    pub fn handle_payload(&mut self, payload: &[u8], sender_id: &str) -> Vec<SyncAction> {
        match decode(payload) {
            Ok(message) => self.handle_message(message, sender_id),
            Err(e) if e.is_unknown_kind() => {
                warn!(sender = %sender_id, error = %e, "ignoring unknown message kind");
                Vec::new()
            },
            Err(e @ ProtocolError::PayloadTooLarge { .. }) => {
                warn!(sender = %sender_id, error = %e, "dropping oversized payload");
                Vec::new()
            },
            Err(e) => {
                debug!(sender = %sender_id, error = %e, "dropping undecodable payload");
                Vec::new()
            },
        }
    }

    /// Apply one decoded message from `sender_id`.
    pub fn handle_message(&mut self, message: Message, sender_id: &str) -> Vec<SyncAction> {
        let from_self = sender_id == self.local_peer_id;

        match message {
            Message::StrokeUpdate(data) => self.on_stroke_update(data, sender_id, from_self),
            Message::StrokeComplete(data) => self.on_stroke_complete(data, sender_id, from_self),
            Message::StrokeDelete { stroke_id, deleted_by, .. } => {
                self.on_stroke_delete(&stroke_id, &deleted_by)
            },
            Message::ClearAll { cleared_by, .. } => self.on_clear_all(&cleared_by),
            Message::StateRequest { requester_id } => self.on_state_request(requester_id),
            Message::StateSnapshot { requester_id, strokes, .. } => {
                self.on_state_snapshot(&requester_id, strokes, sender_id)
            },
        }
    }

    fn on_stroke_update(
        &mut self,
        data: StrokeData,
        sender_id: &str,
        from_self: bool,
    ) -> Vec<SyncAction> {
        if from_self {
            trace!(stroke_id = %data.stroke_id, "ignoring own stroke update");
            return Vec::new();
        }
        if self.store.completed_stroke(&data.stroke_id).is_some() {
            trace!(stroke_id = %data.stroke_id, "ignoring update for completed stroke");
            return Vec::new();
        }

        warn_out_of_range(&data.stroke_id, sender_id, &data.points);
        self.store.upsert_active_stroke(data);
        vec![SyncAction::StrokesChanged]
    }

    fn on_stroke_complete(
        &mut self,
        data: StrokeData,
        sender_id: &str,
        from_self: bool,
    ) -> Vec<SyncAction> {
        if from_self {
            trace!(stroke_id = %data.stroke_id, "ignoring own stroke complete");
            return Vec::new();
        }

        warn_out_of_range(&data.stroke_id, sender_id, &data.points);
        // Replaces any in-progress entry with the same id
        self.store.add_completed_stroke(data.into_completed());
        vec![SyncAction::StrokesChanged]
    }

    fn on_stroke_delete(&mut self, stroke_id: &str, deleted_by: &str) -> Vec<SyncAction> {
        if !self.store.delete_stroke(stroke_id) {
            trace!(stroke_id, deleted_by, "delete for unknown stroke");
            return Vec::new();
        }
        debug!(stroke_id, deleted_by, "stroke deleted");
        vec![SyncAction::StrokesChanged]
    }

    fn on_clear_all(&mut self, cleared_by: &str) -> Vec<SyncAction> {
        info!(cleared_by, "canvas cleared");
        if self.store.clear_all() { vec![SyncAction::StrokesChanged] } else { Vec::new() }
    }

    fn on_state_request(&mut self, requester_id: String) -> Vec<SyncAction> {
        if requester_id == self.local_peer_id {
            return Vec::new();
        }
        if self.responded_to.contains(&requester_id) {
            debug!(requester = %requester_id, "already answered this requester");
            return Vec::new();
        }

        let now = self.env.now();
        let delay = self.response_jitter();
        let Some(due) = now.checked_add(delay) else {
            warn!(requester = %requester_id, ?delay, "reply delay out of clock range");
            return Vec::new();
        };
        debug!(requester = %requester_id, ?delay, "scheduling snapshot reply");

        self.responded_to.insert(requester_id.clone());
        self.pending_responses.push(PendingResponse { requester_id, due });

        // A zero delay goes out right away
        self.fire_due_responses(now)
    }

    fn on_state_snapshot(
        &mut self,
        requester_id: &str,
        strokes: Vec<Stroke>,
        sender_id: &str,
    ) -> Vec<SyncAction> {
        if requester_id != self.local_peer_id {
            if sender_id != self.local_peer_id {
                // Someone else already answered; our reply would be redundant
                let before = self.pending_responses.len();
                self.pending_responses.retain(|p| p.requester_id != requester_id);
                if self.pending_responses.len() < before {
                    debug!(
                        requester = %requester_id,
                        answered_by = %sender_id,
                        "cancelled redundant snapshot reply"
                    );
                }
            }
            return Vec::new();
        }

        if !self.surface_active {
            debug!(sender = %sender_id, "ignoring snapshot between sessions");
            return Vec::new();
        }

        let before = self.sync_state();
        if !self.catch_up.accept_snapshot() {
            debug!(sender = %sender_id, "ignoring duplicate snapshot");
            return Vec::new();
        }

        for stroke in &strokes {
            warn_out_of_range(&stroke.id, sender_id, &stroke.points);
        }
        let received = strokes.len();
        let added = self.store.replace_all_completed(strokes);
        info!(sender = %sender_id, received, added, "applied annotation snapshot");

        let mut actions = Vec::new();
        if added > 0 {
            actions.push(SyncAction::StrokesChanged);
        }
        self.push_state_change(before, &mut actions);
        actions
    }

    // Helpers

    fn fire_due_responses(&mut self, now: Instant) -> Vec<SyncAction> {
        if self.pending_responses.is_empty() {
            return Vec::new();
        }

        let (due, waiting): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.pending_responses).into_iter().partition(|p| p.due <= now);
        self.pending_responses = waiting;

        due.into_iter()
            .map(|pending| {
                let message = self.snapshot_for(pending.requester_id);
                SyncAction::Publish(message)
            })
            .collect()
    }

    /// Build a snapshot of completed strokes only.
    fn snapshot_for(&self, requester_id: String) -> Message {
        let strokes: Vec<Stroke> =
            self.store.completed_strokes().filter(|s| s.is_complete).cloned().collect();
        debug!(requester = %requester_id, strokes = strokes.len(), "sending snapshot");
        Message::StateSnapshot { requester_id, strokes, timestamp: self.env.unix_millis() }
    }

    fn state_request(&self) -> Message {
        Message::StateRequest { requester_id: self.local_peer_id.clone() }
    }

    fn response_jitter(&self) -> Duration {
        let max_ms = u64::try_from(self.config.max_response_jitter.as_millis()).unwrap_or(u64::MAX);
        if max_ms == 0 {
            return Duration::ZERO;
        }
        match max_ms.checked_add(1) {
            Some(span) => Duration::from_millis(self.env.random_u64() % span),
            None => Duration::from_millis(self.env.random_u64()),
        }
    }

    fn mint_stroke_id(&self) -> String {
        let mut bytes = [0u8; 16];
        self.env.random_bytes(&mut bytes);
        uuid::Builder::from_random_bytes(bytes).into_uuid().to_string()
    }

    fn push_state_change(&self, before: SyncState, actions: &mut Vec<SyncAction>) {
        let after = self.sync_state();
        if after != before {
            actions.push(SyncAction::SyncStateChanged(after));
        }
    }
}

/// Log points outside the normalized range. They are accepted as-is.
fn warn_out_of_range(stroke_id: &str, sender_id: &str, points: &[Point]) {
    let out_of_range = points.iter().filter(|p| !p.is_normalized()).count();
    if out_of_range > 0 {
        warn!(stroke_id, sender = %sender_id, out_of_range, "accepting points outside [0, 1]");
    }
}
