//! Events fed into the sync controller and the actions it produces.

use bytes::Bytes;
use etch_proto::{Message, Point, Tool};

use crate::catchup::SyncState;

/// Input to [`crate::SyncController::handle`].
///
/// Mirrors the controller's methods so a runtime can forward UI commands and
/// network input through a single queue.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// A payload arrived on the group channel.
    Received {
        /// Raw payload
        payload: Bytes,
        /// Channel-level sender id
        sender_id: String,
    },

    /// A deadline may have passed.
    Tick,

    /// The shared surface became active.
    SurfaceActivated {
        /// Number of other peers present in the session
        remote_peers: usize,
    },

    /// The shared surface went away; the session ends.
    SurfaceDeactivated,

    /// A peer left the room.
    PeerLeft {
        /// Departed peer
        peer_id: String,
    },

    /// The local user put the pen down.
    StartStroke {
        /// First point of the gesture
        point: Point,
    },

    /// The local user moved the pen.
    ExtendStroke {
        /// Points since the previous event
        points: Vec<Point>,
    },

    /// The local user lifted the pen.
    FinishStroke,

    /// The local user deleted a stroke.
    DeleteStroke {
        /// Stroke to delete
        stroke_id: String,
    },

    /// The local user cleared the canvas. Callers gate this by role.
    ClearAll,

    /// Select the tool for the next stroke.
    SelectTool {
        /// New tool
        tool: Tool,
    },

    /// Select the color for the next stroke.
    SelectColor {
        /// New color
        color: String,
    },
}

/// Effects produced by the sync controller for the driver to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncAction {
    /// Encode and publish this message on the group channel.
    ///
    /// Fire-and-forget: no acknowledgement is expected and failures are not
    /// retried.
    Publish(Message),

    /// Stroke content changed; the canvas should be redrawn.
    StrokesChanged,

    /// Catch-up state changed.
    SyncStateChanged(SyncState),
}

impl SyncAction {
    /// The message to publish, if this is a publish action.
    pub fn as_publish(&self) -> Option<&Message> {
        match self {
            Self::Publish(message) => Some(message),
            _ => None,
        }
    }
}
