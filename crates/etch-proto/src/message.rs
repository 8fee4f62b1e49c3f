//! Message and stroke types carried on the wire.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A point on the shared surface.
///
/// Both coordinates are normalized to `[0, 1]` relative to the shared surface
/// so strokes render the same at any resolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position, 0.0 = left edge
    pub x: f32,
    /// Vertical position, 0.0 = top edge
    pub y: f32,
}

impl Point {
    /// Create a point.
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// True if both coordinates are finite and inside `[0, 1]`.
    pub fn is_normalized(&self) -> bool {
        (0.0..=1.0).contains(&self.x) && (0.0..=1.0).contains(&self.y)
    }
}

/// Drawing tool used for a stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    /// Opaque freehand line
    #[default]
    Pen,
    /// Wide translucent line
    Highlighter,
}

/// One continuous freehand gesture by one author.
///
/// Identity is `id`, minted by the author. Points only grow while
/// `is_complete` is false; a complete stroke is immutable until deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stroke {
    /// Globally unique stroke id
    pub id: String,
    /// Peer that drew the stroke
    pub author_id: String,
    /// Tool the stroke was drawn with
    pub tool: Tool,
    /// CSS-style color string, e.g. `#ff5757`
    pub color: String,
    /// Points in drawing order
    pub points: Vec<Point>,
    /// Unix milliseconds when the author started the stroke
    pub created_at: u64,
    /// Whether the author finished drawing
    pub is_complete: bool,
}

/// Stroke content shared by `stroke_update` and `stroke_complete`.
///
/// In a `stroke_update`, `points` are the points drawn since the previous
/// update. In a `stroke_complete`, `points` is the full, final point list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrokeData {
    /// Stroke being drawn
    pub stroke_id: String,
    /// Author of the stroke
    pub author_id: String,
    /// Tool in use
    pub tool: Tool,
    /// Stroke color
    pub color: String,
    /// Appended points (update) or all points (complete)
    pub points: Vec<Point>,
    /// Unix milliseconds
    pub timestamp: u64,
}

impl StrokeData {
    /// Build the completed stroke this payload describes.
    pub fn into_completed(self) -> Stroke {
        Stroke {
            id: self.stroke_id,
            author_id: self.author_id,
            tool: self.tool,
            color: self.color,
            points: self.points,
            created_at: self.timestamp,
            is_complete: true,
        }
    }
}

/// Top-level protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Message {
    /// Points appended to a stroke that is still being drawn.
    StrokeUpdate(StrokeData),

    /// A stroke was finished. Carries the authoritative final points.
    StrokeComplete(StrokeData),

    /// A completed stroke was removed.
    StrokeDelete {
        /// Stroke to remove
        stroke_id: String,
        /// Peer that removed it
        deleted_by: String,
        /// Unix milliseconds
        timestamp: u64,
    },

    /// Every stroke was removed.
    ClearAll {
        /// Peer that cleared the canvas
        cleared_by: String,
        /// Unix milliseconds
        timestamp: u64,
    },

    /// A late joiner asks for the current set of completed strokes.
    StateRequest {
        /// Peer asking for state
        requester_id: String,
    },

    /// Answer to a [`Message::StateRequest`].
    ///
    /// Broadcast like every other message, but only the peer whose id matches
    /// `requester_id` applies it.
    StateSnapshot {
        /// Peer the snapshot is addressed to
        requester_id: String,
        /// Completed strokes only
        strokes: Vec<Stroke>,
        /// Unix milliseconds
        timestamp: u64,
    },
}

impl Message {
    /// Kind of this message.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::StrokeUpdate(_) => MessageKind::StrokeUpdate,
            Self::StrokeComplete(_) => MessageKind::StrokeComplete,
            Self::StrokeDelete { .. } => MessageKind::StrokeDelete,
            Self::ClearAll { .. } => MessageKind::ClearAll,
            Self::StateRequest { .. } => MessageKind::StateRequest,
            Self::StateSnapshot { .. } => MessageKind::StateSnapshot,
        }
    }
}

/// Discriminant of [`Message`], used for routing decisions and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// `stroke_update`
    StrokeUpdate,
    /// `stroke_complete`
    StrokeComplete,
    /// `stroke_delete`
    StrokeDelete,
    /// `clear_all`
    ClearAll,
    /// `state_request`
    StateRequest,
    /// `state_snapshot`
    StateSnapshot,
}

impl MessageKind {
    /// All kinds this version understands.
    pub const ALL: [Self; 6] = [
        Self::StrokeUpdate,
        Self::StrokeComplete,
        Self::StrokeDelete,
        Self::ClearAll,
        Self::StateRequest,
        Self::StateSnapshot,
    ];

    /// Wire name (the `type` tag).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StrokeUpdate => "stroke_update",
            Self::StrokeComplete => "stroke_complete",
            Self::StrokeDelete => "stroke_delete",
            Self::ClearAll => "clear_all",
            Self::StateRequest => "state_request",
            Self::StateSnapshot => "state_snapshot",
        }
    }

    /// Look up a kind by its wire name.
    pub fn from_wire(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_wire_names_round_trip() {
        for kind in MessageKind::ALL {
            assert_eq!(MessageKind::from_wire(kind.as_str()), Some(kind));
        }
        assert_eq!(MessageKind::from_wire("cursor_move"), None);
    }

    #[test]
    fn point_normalization() {
        assert!(Point::new(0.0, 1.0).is_normalized());
        assert!(Point::new(0.5, 0.5).is_normalized());
        assert!(!Point::new(-0.01, 0.5).is_normalized());
        assert!(!Point::new(0.5, 1.5).is_normalized());
        assert!(!Point::new(f32::NAN, 0.5).is_normalized());
    }

    #[test]
    fn stroke_data_into_completed() {
        let data = StrokeData {
            stroke_id: "s1".to_string(),
            author_id: "alice".to_string(),
            tool: Tool::Highlighter,
            color: "#ffff00".to_string(),
            points: vec![Point::new(0.1, 0.1)],
            timestamp: 1_700_000_000_000,
        };

        let stroke = data.into_completed();
        assert_eq!(stroke.id, "s1");
        assert_eq!(stroke.created_at, 1_700_000_000_000);
        assert!(stroke.is_complete);
    }
}
