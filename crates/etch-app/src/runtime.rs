//! Event loop driving one sync controller.
//!
//! ```text
//!   RuntimeHandle ──mpsc──┐
//!                         ▼
//!   Channel::recv ──> select! ──> SyncController ──> Vec<SyncAction>
//!                         ▲                               │
//!   sleep(next_deadline) ─┘        Publish ──> encode ──> Channel::publish
//!                                  *Changed ──> watch<CanvasView>
//! ```
//!
//! Every transition happens on the task running [`Runtime::run`], so the
//! controller needs no locking.

use std::time::Instant;

use etch_core::{
    CanvasView, Environment, ParticipantRole, Point, SyncAction, SyncConfig, SyncController,
    SyncEvent, Tool,
};
use etch_proto::encode;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::{Channel, Inbound, RuntimeError};

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Capacity of the command queue between handle and runtime
    pub command_buffer: usize,
    /// Role of the local participant, used to gate privileged commands
    pub role: ParticipantRole,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { command_buffer: 64, role: ParticipantRole::Participant }
    }
}

/// UI-side handle to a running [`Runtime`].
///
/// Dropping every handle stops the runtime.
#[derive(Debug, Clone)]
pub struct RuntimeHandle {
    local_peer_id: String,
    role: ParticipantRole,
    commands: mpsc::Sender<SyncEvent>,
    view: watch::Receiver<CanvasView>,
}

impl RuntimeHandle {
    /// Forward an event to the runtime.
    pub async fn send(&self, event: SyncEvent) -> Result<(), RuntimeError> {
        self.commands.send(event).await.map_err(|_| RuntimeError::Stopped)
    }

    /// The shared surface became active with `remote_peers` others present.
    pub async fn activate_surface(&self, remote_peers: usize) -> Result<(), RuntimeError> {
        self.send(SyncEvent::SurfaceActivated { remote_peers }).await
    }

    /// The shared surface went away.
    pub async fn deactivate_surface(&self) -> Result<(), RuntimeError> {
        self.send(SyncEvent::SurfaceDeactivated).await
    }

    /// A peer left the room.
    pub async fn peer_left(&self, peer_id: impl Into<String>) -> Result<(), RuntimeError> {
        self.send(SyncEvent::PeerLeft { peer_id: peer_id.into() }).await
    }

    /// Pen down.
    pub async fn start_stroke(&self, point: Point) -> Result<(), RuntimeError> {
        self.send(SyncEvent::StartStroke { point }).await
    }

    /// Pen moved.
    pub async fn extend_stroke(&self, points: Vec<Point>) -> Result<(), RuntimeError> {
        self.send(SyncEvent::ExtendStroke { points }).await
    }

    /// Pen up.
    pub async fn finish_stroke(&self) -> Result<(), RuntimeError> {
        self.send(SyncEvent::FinishStroke).await
    }

    /// Select the tool for the next stroke.
    pub async fn select_tool(&self, tool: Tool) -> Result<(), RuntimeError> {
        self.send(SyncEvent::SelectTool { tool }).await
    }

    /// Select the color for the next stroke.
    pub async fn select_color(&self, color: impl Into<String>) -> Result<(), RuntimeError> {
        self.send(SyncEvent::SelectColor { color: color.into() }).await
    }

    /// Delete a completed stroke if the local role allows it.
    ///
    /// Returns false without sending anything when the stroke is unknown or
    /// the role forbids deleting it.
    pub async fn delete_stroke(&self, stroke_id: &str) -> Result<bool, RuntimeError> {
        let author = self
            .view
            .borrow()
            .strokes
            .iter()
            .find(|s| s.id == stroke_id)
            .map(|s| s.author_id.clone());

        let Some(author) = author else {
            debug!(stroke_id, "delete for unknown stroke");
            return Ok(false);
        };
        if !self.role.can_delete(&self.local_peer_id, &author) {
            debug!(stroke_id, author = %author, "role may not delete this stroke");
            return Ok(false);
        }

        self.send(SyncEvent::DeleteStroke { stroke_id: stroke_id.to_string() }).await?;
        Ok(true)
    }

    /// Clear the canvas if the local role allows it.
    pub async fn clear_all(&self) -> Result<bool, RuntimeError> {
        if !self.role.can_clear_all() {
            debug!(role = ?self.role, "role may not clear the canvas");
            return Ok(false);
        }
        self.send(SyncEvent::ClearAll).await?;
        Ok(true)
    }

    /// Latest canvas view.
    pub fn view(&self) -> CanvasView {
        self.view.borrow().clone()
    }

    /// Subscribe to canvas view updates.
    pub fn subscribe(&self) -> watch::Receiver<CanvasView> {
        self.view.clone()
    }

    /// Id of the local peer.
    pub fn local_peer_id(&self) -> &str {
        &self.local_peer_id
    }
}

/// Runs one [`SyncController`] against a [`Channel`].
pub struct Runtime<E: Environment, C: Channel> {
    env: E,
    controller: SyncController<E>,
    channel: C,
    commands: mpsc::Receiver<SyncEvent>,
    view: watch::Sender<CanvasView>,
}

impl<E: Environment, C: Channel> Runtime<E, C> {
    /// Create a runtime and its handle.
    pub fn new(
        env: E,
        local_peer_id: impl Into<String>,
        channel: C,
        sync_config: SyncConfig,
        config: &RuntimeConfig,
    ) -> (Self, RuntimeHandle) {
        let local_peer_id = local_peer_id.into();
        let controller =
            SyncController::with_config(env.clone(), local_peer_id.clone(), sync_config);
        let (commands_tx, commands_rx) = mpsc::channel(config.command_buffer.max(1));
        let (view_tx, view_rx) = watch::channel(controller.view());

        let runtime = Self { env, controller, channel, commands: commands_rx, view: view_tx };
        let handle = RuntimeHandle {
            local_peer_id,
            role: config.role,
            commands: commands_tx,
            view: view_rx,
        };
        (runtime, handle)
    }

    /// The controller this runtime drives.
    pub fn controller(&self) -> &SyncController<E> {
        &self.controller
    }

    /// Run until every handle is dropped or the channel closes.
    ///
    /// The session is torn down on exit. Returns the controller so callers can
    /// inspect the final state.
    pub async fn run(mut self) -> SyncController<E> {
        info!(peer = %self.controller.local_peer_id(), "sync runtime started");

        loop {
            let deadline = self.controller.next_deadline();
            let env = self.env.clone();

            tokio::select! {
                biased;

                command = self.commands.recv() => {
                    let Some(event) = command else {
                        debug!("all runtime handles dropped");
                        break;
                    };
                    let actions = self.controller.handle(event);
                    self.execute(actions).await;
                },
                inbound = self.channel.recv() => {
                    let Some(Inbound { payload, sender_id }) = inbound else {
                        info!("channel closed");
                        break;
                    };
                    let event = SyncEvent::Received { payload, sender_id };
                    let actions = self.controller.handle(event);
                    self.execute(actions).await;
                },
                () = wait_until(env, deadline) => {
                    let actions = self.controller.tick();
                    self.execute(actions).await;
                },
            }
        }

        let actions = self.controller.teardown();
        self.execute(actions).await;
        info!(peer = %self.controller.local_peer_id(), "sync runtime stopped");
        self.controller
    }

    async fn execute(&mut self, actions: Vec<SyncAction>) {
        let mut view_changed = false;

        for action in actions {
            match action {
                SyncAction::Publish(message) => {
                    let kind = message.kind();
                    match encode(&message) {
                        Ok(payload) => {
                            if let Err(e) = self.channel.publish(payload).await {
                                warn!(%kind, error = %e, "publish failed");
                            }
                        },
                        Err(e) => warn!(%kind, error = %e, "failed to encode message"),
                    }
                },
                SyncAction::StrokesChanged | SyncAction::SyncStateChanged(_) => {
                    view_changed = true;
                },
            }
        }

        if view_changed {
            self.view.send_replace(self.controller.view());
        }
    }
}

/// Resolve at `deadline`, or never if there is none.
async fn wait_until<E: Environment>(env: E, deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => {
            let remaining = deadline.saturating_duration_since(env.now());
            env.sleep(remaining).await;
        },
        None => std::future::pending().await,
    }
}
