//! In-memory stroke storage.
//!
//! Holds the completed strokes in render order (oldest first), the strokes
//! other peers are still drawing, the local user's in-progress gesture, and the
//! selected tool and color.
//!
//! Every mutation is total and idempotent: unknown ids are no-ops, and applying
//! the same operation twice leaves the store as applying it once. Both the
//! local optimistic path and the network path rely on that to stay consistent
//! regardless of the order their writes land in.

use etch_proto::{Point, Stroke, StrokeData, Tool};
use indexmap::IndexMap;
use tracing::{debug, warn};

/// Default stroke color for a fresh store.
pub const DEFAULT_COLOR: &str = "#ff5757";

/// A stroke another peer is still drawing.
///
/// Exists from its first `stroke_update` until its `stroke_complete`, or until
/// the session ends or its author leaves, in which case it is discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteActiveStroke {
    /// Stroke id
    pub id: String,
    /// Peer drawing the stroke
    pub author_id: String,
    /// Tool in use
    pub tool: Tool,
    /// Stroke color
    pub color: String,
    /// Points received so far
    pub points: Vec<Point>,
    /// Timestamp of the first update seen
    pub started_at: u64,
}

impl RemoteActiveStroke {
    fn from_update(data: StrokeData) -> Self {
        Self {
            id: data.stroke_id,
            author_id: data.author_id,
            tool: data.tool,
            color: data.color,
            points: data.points,
            started_at: data.timestamp,
        }
    }

    /// Turn the accumulated points into a completed stroke.
    pub fn into_completed(self) -> Stroke {
        Stroke {
            id: self.id,
            author_id: self.author_id,
            tool: self.tool,
            color: self.color,
            points: self.points,
            created_at: self.started_at,
            is_complete: true,
        }
    }
}

/// Stroke storage for one collaborative session.
#[derive(Debug, Clone)]
pub struct StrokeStore {
    completed: IndexMap<String, Stroke>,
    active: IndexMap<String, RemoteActiveStroke>,
    local: Option<Stroke>,
    tool: Tool,
    color: String,
}

impl StrokeStore {
    /// Create an empty store with the pen selected.
    pub fn new() -> Self {
        Self {
            completed: IndexMap::new(),
            active: IndexMap::new(),
            local: None,
            tool: Tool::Pen,
            color: DEFAULT_COLOR.to_string(),
        }
    }

    /// Insert or replace a completed stroke.
    ///
    /// Last write wins for a duplicate id; the stroke keeps its original render
    /// position. Any in-progress entry with the same id is dropped since the
    /// completed stroke supersedes it.
    pub fn add_completed_stroke(&mut self, mut stroke: Stroke) {
        stroke.is_complete = true;
        self.active.shift_remove(&stroke.id);
        self.completed.insert(stroke.id.clone(), stroke);
    }

    /// Remove a stroke. Returns true if anything was removed.
    pub fn delete_stroke(&mut self, id: &str) -> bool {
        let completed = self.completed.shift_remove(id).is_some();
        let active = self.active.shift_remove(id).is_some();
        completed || active
    }

    /// Remove every completed and in-progress remote stroke.
    ///
    /// The local gesture survives; the user is still drawing it.
    pub fn clear_all(&mut self) -> bool {
        let changed = !self.completed.is_empty() || !self.active.is_empty();
        self.completed.clear();
        self.active.clear();
        changed
    }

    /// Merge a snapshot into the completed strokes.
    ///
    /// This is a union by id, never an overwrite: strokes drawn locally while
    /// catch-up was pending stay. Incoming strokes not marked complete are
    /// skipped. Returns how many strokes were new.
    pub fn replace_all_completed(&mut self, strokes: Vec<Stroke>) -> usize {
        let mut added = 0;
        for stroke in strokes {
            if !stroke.is_complete {
                warn!(stroke_id = %stroke.id, "skipping incomplete stroke in snapshot");
                continue;
            }
            if !self.completed.contains_key(&stroke.id) {
                added += 1;
            }
            self.add_completed_stroke(stroke);
        }
        added
    }

    /// Create an in-progress remote stroke, or append to an existing one.
    ///
    /// Returns true if a new entry was created.
    pub fn upsert_active_stroke(&mut self, data: StrokeData) -> bool {
        if let Some(active) = self.active.get_mut(&data.stroke_id) {
            active.points.extend_from_slice(&data.points);
            return false;
        }
        self.active.insert(data.stroke_id.clone(), RemoteActiveStroke::from_update(data));
        true
    }

    /// Move an in-progress stroke into the completed set with the points
    /// accumulated so far.
    ///
    /// Returns false if no such in-progress stroke exists.
    pub fn promote_active_to_completed(&mut self, id: &str) -> bool {
        match self.active.shift_remove(id) {
            Some(active) => {
                self.add_completed_stroke(active.into_completed());
                true
            },
            None => false,
        }
    }

    /// Drop an in-progress remote stroke without promoting it.
    pub fn remove_active_stroke(&mut self, id: &str) -> Option<RemoteActiveStroke> {
        self.active.shift_remove(id)
    }

    /// Remove every completed stroke drawn by `author_id`.
    pub fn delete_by_author(&mut self, author_id: &str) -> usize {
        let before = self.completed.len();
        self.completed.retain(|_, stroke| stroke.author_id != author_id);
        before - self.completed.len()
    }

    /// Drop every in-progress stroke by `author_id` without promotion.
    pub fn discard_active_by_author(&mut self, author_id: &str) -> usize {
        let before = self.active.len();
        self.active.retain(|_, active| active.author_id != author_id);
        before - self.active.len()
    }

    /// Drop every in-progress remote stroke.
    pub fn discard_all_active(&mut self) -> usize {
        let count = self.active.len();
        self.active.clear();
        count
    }

    /// Start the local gesture with the selected tool and color.
    ///
    /// An unfinished previous gesture is abandoned.
    pub fn begin_local_stroke(
        &mut self,
        id: String,
        author_id: String,
        start: Point,
        created_at: u64,
    ) -> &Stroke {
        if let Some(previous) = &self.local {
            debug!(stroke_id = %previous.id, "abandoning unfinished local stroke");
        }
        self.local.insert(Stroke {
            id,
            author_id,
            tool: self.tool,
            color: self.color.clone(),
            points: vec![start],
            created_at,
            is_complete: false,
        })
    }

    /// Append points to the local gesture.
    pub fn extend_local_stroke(&mut self, points: &[Point]) -> Option<&Stroke> {
        let stroke = self.local.as_mut()?;
        stroke.points.extend_from_slice(points);
        Some(stroke)
    }

    /// Finish the local gesture and add it to the completed strokes.
    ///
    /// Returns the completed stroke, or `None` if no gesture was in progress.
    pub fn finish_local_stroke(&mut self) -> Option<Stroke> {
        let mut stroke = self.local.take()?;
        stroke.is_complete = true;
        self.add_completed_stroke(stroke.clone());
        Some(stroke)
    }

    /// Abandon the local gesture without completing it.
    pub fn cancel_local_stroke(&mut self) -> Option<Stroke> {
        self.local.take()
    }

    /// The local gesture in progress, if any.
    pub fn local_stroke(&self) -> Option<&Stroke> {
        self.local.as_ref()
    }

    /// Completed strokes in render order (oldest first).
    pub fn completed_strokes(&self) -> impl Iterator<Item = &Stroke> {
        self.completed.values()
    }

    /// Look up a completed stroke.
    pub fn completed_stroke(&self, id: &str) -> Option<&Stroke> {
        self.completed.get(id)
    }

    /// In-progress remote strokes, in the order they started.
    pub fn active_strokes(&self) -> impl Iterator<Item = &RemoteActiveStroke> {
        self.active.values()
    }

    /// Look up an in-progress remote stroke.
    pub fn active_stroke(&self, id: &str) -> Option<&RemoteActiveStroke> {
        self.active.get(id)
    }

    /// Number of completed strokes.
    pub fn len(&self) -> usize {
        self.completed.len()
    }

    /// True if there are no completed strokes.
    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }

    /// Currently selected tool.
    pub fn tool(&self) -> Tool {
        self.tool
    }

    /// Select the tool for the next local stroke.
    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
    }

    /// Currently selected color.
    pub fn color(&self) -> &str {
        &self.color
    }

    /// Select the color for the next local stroke.
    pub fn set_color(&mut self, color: impl Into<String>) {
        self.color = color.into();
    }
}

impl Default for StrokeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stroke(id: &str, author: &str) -> Stroke {
        Stroke {
            id: id.to_string(),
            author_id: author.to_string(),
            tool: Tool::Pen,
            color: DEFAULT_COLOR.to_string(),
            points: vec![Point::new(0.1, 0.1), Point::new(0.2, 0.2)],
            created_at: 1,
            is_complete: true,
        }
    }

    fn update(id: &str, author: &str, points: &[Point]) -> StrokeData {
        StrokeData {
            stroke_id: id.to_string(),
            author_id: author.to_string(),
            tool: Tool::Highlighter,
            color: "#ffff00".to_string(),
            points: points.to_vec(),
            timestamp: 10,
        }
    }

    fn ids(store: &StrokeStore) -> Vec<&str> {
        store.completed_strokes().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn add_completed_is_idempotent() {
        let mut store = StrokeStore::new();
        store.add_completed_stroke(stroke("s1", "alice"));
        store.add_completed_stroke(stroke("s1", "alice"));

        assert_eq!(store.len(), 1);
        assert_eq!(store.completed_stroke("s1"), Some(&stroke("s1", "alice")));
    }

    #[test]
    fn add_completed_forces_complete_flag() {
        let mut store = StrokeStore::new();
        let mut s = stroke("s1", "alice");
        s.is_complete = false;
        store.add_completed_stroke(s);

        assert!(store.completed_stroke("s1").unwrap().is_complete);
    }

    #[test]
    fn replace_keeps_render_position() {
        let mut store = StrokeStore::new();
        store.add_completed_stroke(stroke("a", "p1"));
        store.add_completed_stroke(stroke("b", "p1"));
        store.add_completed_stroke(stroke("c", "p1"));

        let mut replacement = stroke("a", "p1");
        replacement.color = "#000000".to_string();
        store.add_completed_stroke(replacement);

        assert_eq!(ids(&store), vec!["a", "b", "c"]);
        assert_eq!(store.completed_stroke("a").unwrap().color, "#000000");
    }

    #[test]
    fn delete_is_idempotent_and_total() {
        let mut store = StrokeStore::new();
        store.add_completed_stroke(stroke("s1", "alice"));

        assert!(store.delete_stroke("s1"));
        assert!(!store.delete_stroke("s1"));
        assert!(!store.delete_stroke("never-existed"));
        assert!(store.is_empty());
    }

    #[test]
    fn delete_preserves_order_of_rest() {
        let mut store = StrokeStore::new();
        for id in ["a", "b", "c", "d"] {
            store.add_completed_stroke(stroke(id, "p1"));
        }
        store.delete_stroke("b");

        assert_eq!(ids(&store), vec!["a", "c", "d"]);
    }

    #[test]
    fn clear_all_keeps_local_gesture() {
        let mut store = StrokeStore::new();
        store.add_completed_stroke(stroke("s1", "alice"));
        store.upsert_active_stroke(update("r1", "bob", &[Point::new(0.5, 0.5)]));
        store.begin_local_stroke("l1".to_string(), "me".to_string(), Point::new(0.1, 0.1), 5);

        assert!(store.clear_all());
        assert!(store.is_empty());
        assert_eq!(store.active_strokes().count(), 0);
        assert!(store.local_stroke().is_some());
        assert!(!store.clear_all());
    }

    #[test]
    fn snapshot_merge_is_union() {
        let mut store = StrokeStore::new();
        store.add_completed_stroke(stroke("local", "me"));
        store.add_completed_stroke(stroke("shared", "alice"));

        let added = store.replace_all_completed(vec![
            stroke("shared", "alice"),
            stroke("remote-1", "alice"),
            stroke("remote-2", "bob"),
        ]);

        assert_eq!(added, 2);
        assert_eq!(ids(&store), vec!["local", "shared", "remote-1", "remote-2"]);
    }

    #[test]
    fn snapshot_merge_skips_incomplete() {
        let mut store = StrokeStore::new();
        let mut partial = stroke("partial", "alice");
        partial.is_complete = false;

        let added = store.replace_all_completed(vec![partial, stroke("done", "alice")]);

        assert_eq!(added, 1);
        assert!(store.completed_stroke("partial").is_none());
    }

    #[test]
    fn upsert_creates_then_appends() {
        let mut store = StrokeStore::new();
        assert!(store.upsert_active_stroke(update("r1", "bob", &[Point::new(0.1, 0.1)])));
        assert!(!store.upsert_active_stroke(update(
            "r1",
            "bob",
            &[Point::new(0.2, 0.2), Point::new(0.3, 0.3)]
        )));

        let active = store.active_stroke("r1").unwrap();
        assert_eq!(active.points.len(), 3);
        assert_eq!(active.tool, Tool::Highlighter);
        assert_eq!(active.started_at, 10);
        assert!(store.is_empty());
    }

    #[test]
    fn promote_moves_accumulated_points() {
        let mut store = StrokeStore::new();
        store.upsert_active_stroke(update("r1", "bob", &[Point::new(0.1, 0.1)]));
        store.upsert_active_stroke(update("r1", "bob", &[Point::new(0.2, 0.2)]));

        assert!(store.promote_active_to_completed("r1"));
        assert!(!store.promote_active_to_completed("r1"));

        let completed = store.completed_stroke("r1").unwrap();
        assert_eq!(completed.points.len(), 2);
        assert!(completed.is_complete);
        assert!(store.active_stroke("r1").is_none());
    }

    #[test]
    fn completed_supersedes_active() {
        let mut store = StrokeStore::new();
        store.upsert_active_stroke(update("r1", "bob", &[Point::new(0.1, 0.1)]));
        store.add_completed_stroke(stroke("r1", "bob"));

        assert!(store.active_stroke("r1").is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn author_scoped_removal() {
        let mut store = StrokeStore::new();
        store.add_completed_stroke(stroke("s1", "p1"));
        store.add_completed_stroke(stroke("s2", "p2"));
        store.add_completed_stroke(stroke("s3", "p1"));
        store.upsert_active_stroke(update("r1", "p1", &[Point::new(0.5, 0.5)]));
        store.upsert_active_stroke(update("r2", "p2", &[Point::new(0.5, 0.5)]));

        assert_eq!(store.delete_by_author("p1"), 2);
        assert_eq!(ids(&store), vec!["s2"]);

        assert_eq!(store.discard_active_by_author("p1"), 1);
        assert!(store.active_stroke("r2").is_some());
        // Discarded strokes are not promoted
        assert!(store.completed_stroke("r1").is_none());
    }

    #[test]
    fn local_gesture_lifecycle() {
        let mut store = StrokeStore::new();
        store.set_tool(Tool::Highlighter);
        store.set_color("#57ff90");

        store.begin_local_stroke("l1".to_string(), "me".to_string(), Point::new(0.1, 0.1), 99);
        store.extend_local_stroke(&[Point::new(0.2, 0.2), Point::new(0.3, 0.3)]);

        let local = store.local_stroke().unwrap();
        assert_eq!(local.points.len(), 3);
        assert!(!local.is_complete);
        assert!(store.is_empty());

        let finished = store.finish_local_stroke().unwrap();
        assert!(finished.is_complete);
        assert_eq!(finished.tool, Tool::Highlighter);
        assert_eq!(finished.color, "#57ff90");
        assert_eq!(store.completed_stroke("l1"), Some(&finished));
        assert!(store.local_stroke().is_none());
        assert!(store.finish_local_stroke().is_none());
    }

    #[test]
    fn extend_without_gesture_is_noop() {
        let mut store = StrokeStore::new();
        assert!(store.extend_local_stroke(&[Point::new(0.1, 0.1)]).is_none());
        assert!(store.cancel_local_stroke().is_none());
    }
}
