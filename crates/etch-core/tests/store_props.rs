//! Property tests for stroke store merge semantics.

use std::collections::BTreeSet;

use etch_core::{Point, Stroke, StrokeStore, Tool};
use proptest::prelude::*;

fn stroke(id: u8, author: u8) -> Stroke {
    Stroke {
        id: format!("s{id}"),
        author_id: format!("p{author}"),
        tool: if id % 2 == 0 { Tool::Pen } else { Tool::Highlighter },
        color: "#123456".to_string(),
        points: vec![Point::new(f32::from(id) / 255.0, 0.5)],
        created_at: u64::from(id),
        is_complete: true,
    }
}

fn strokes() -> impl Strategy<Value = Vec<Stroke>> {
    prop::collection::vec((any::<u8>(), 0u8..4), 0..32)
        .prop_map(|pairs| pairs.into_iter().map(|(id, author)| stroke(id, author)).collect())
}

fn ids(store: &StrokeStore) -> Vec<String> {
    store.completed_strokes().map(|s| s.id.clone()).collect()
}

proptest! {
    #[test]
    fn adding_twice_equals_adding_once(input in strokes()) {
        let mut once = StrokeStore::new();
        let mut twice = StrokeStore::new();
        for s in &input {
            once.add_completed_stroke(s.clone());
            twice.add_completed_stroke(s.clone());
            twice.add_completed_stroke(s.clone());
        }
        prop_assert_eq!(ids(&once), ids(&twice));
    }

    #[test]
    fn snapshot_merge_is_union_without_duplicates(local in strokes(), remote in strokes()) {
        let mut store = StrokeStore::new();
        for s in &local {
            store.add_completed_stroke(s.clone());
        }
        store.replace_all_completed(remote.clone());

        let expected: BTreeSet<String> =
            local.iter().chain(remote.iter()).map(|s| s.id.clone()).collect();
        let actual = ids(&store);
        let unique: BTreeSet<String> = actual.iter().cloned().collect();

        prop_assert_eq!(actual.len(), unique.len());
        prop_assert_eq!(unique, expected);
    }

    #[test]
    fn delete_by_author_leaves_only_others(input in strokes(), author in 0u8..4) {
        let mut store = StrokeStore::new();
        for s in &input {
            store.add_completed_stroke(s.clone());
        }
        store.delete_by_author(&format!("p{author}"));

        let target = format!("p{author}");
        prop_assert!(store.completed_strokes().all(|s| s.author_id != target));
    }
}
