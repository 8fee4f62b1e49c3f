//! Property tests for the decoder.
//!
//! The group channel may carry traffic from other subsystems or from buggy
//! peers, so the decoder must fail closed on anything it does not understand.

use etch_proto::{Message, Point, StrokeData, Tool, decode, encode};
use proptest::prelude::*;

fn point_strategy() -> impl Strategy<Value = Point> {
    (0.0f32..=1.0, 0.0f32..=1.0).prop_map(|(x, y)| Point::new(x, y))
}

fn stroke_data_strategy() -> impl Strategy<Value = StrokeData> {
    (
        "[a-z0-9-]{1,16}",
        "[a-z]{1,8}",
        prop_oneof![Just(Tool::Pen), Just(Tool::Highlighter)],
        prop::collection::vec(point_strategy(), 0..32),
        any::<u64>(),
    )
        .prop_map(|(stroke_id, author_id, tool, points, timestamp)| StrokeData {
            stroke_id,
            author_id,
            tool,
            color: "#57a6ff".to_string(),
            points,
            timestamp,
        })
}

proptest! {
    /// Arbitrary bytes never panic the decoder.
    #[test]
    fn prop_decode_arbitrary_bytes_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = decode(&bytes);
    }

    /// A truncated stroke update either fails or decodes to the original.
    ///
    /// CBOR is length-prefixed, so a cut payload must never silently turn into
    /// a shorter but valid message.
    #[test]
    fn prop_truncated_payload_fails_closed(data in stroke_data_strategy(), cut in 0usize..1024) {
        let message = Message::StrokeUpdate(data);
        let payload = encode(&message).unwrap();
        let cut = cut % payload.len();

        match decode(&payload[..cut]) {
            Ok(decoded) => prop_assert_eq!(decoded, message),
            Err(e) => prop_assert!(!e.is_unknown_kind(), "truncation reported as unknown kind: {e}"),
        }
    }

    /// Stroke payloads decode to exactly what was encoded.
    #[test]
    fn prop_stroke_complete_preserves_points(data in stroke_data_strategy()) {
        let message = Message::StrokeComplete(data);
        let payload = encode(&message).unwrap();
        prop_assert_eq!(decode(&payload).unwrap(), message);
    }
}
