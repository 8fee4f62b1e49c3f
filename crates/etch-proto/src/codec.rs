//! Encoding and decoding of [`Message`] payloads.
//!
//! Decoding happens in two steps. The payload is first parsed into a generic
//! CBOR value so the `type` tag can be inspected on its own; only tags this
//! version knows are then deserialized into a [`Message`]. That split is what
//! separates [`ProtocolError::UnknownKind`] (a newer peer, log and skip) from
//! [`ProtocolError::Malformed`] (garbage, drop).

use bytes::Bytes;
use ciborium::Value;

use crate::{
    errors::{ProtocolError, Result},
    message::{Message, MessageKind},
};

/// Maximum accepted payload size (16 MB).
///
/// Snapshots of a heavily annotated session are the largest messages; this
/// bounds memory use for a single decode.
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Name of the map key holding the message kind.
const TYPE_KEY: &str = "type";

/// Serialize a message into a channel payload.
pub fn encode(message: &Message) -> Result<Bytes> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(message, &mut buf).map_err(|e| ProtocolError::Encode {
        kind: message.kind().as_str(),
        reason: e.to_string(),
    })?;
    Ok(Bytes::from(buf))
}

/// Parse a channel payload into a message.
///
/// Never panics. The channel may carry unrelated traffic, so callers are
/// expected to log and drop every error.
pub fn decode(payload: &[u8]) -> Result<Message> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::PayloadTooLarge { size: payload.len(), max: MAX_PAYLOAD_SIZE });
    }

    let value: Value = ciborium::de::from_reader(payload)
        .map_err(|e| ProtocolError::Malformed(e.to_string()))?;

    let tag = type_tag(&value)?;
    if MessageKind::from_wire(tag).is_none() {
        return Err(ProtocolError::UnknownKind { kind: tag.to_string() });
    }

    value.deserialized::<Message>().map_err(|e| ProtocolError::Malformed(e.to_string()))
}

fn type_tag(value: &Value) -> Result<&str> {
    let Value::Map(entries) = value else {
        return Err(ProtocolError::Malformed("payload is not a map".to_string()));
    };

    entries
        .iter()
        .find_map(|(key, val)| match (key, val) {
            (Value::Text(key), Value::Text(tag)) if key == TYPE_KEY => Some(tag.as_str()),
            _ => None,
        })
        .ok_or_else(|| ProtocolError::Malformed("missing type tag".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Point, Stroke, StrokeData, Tool};

    fn sample_stroke(id: &str) -> Stroke {
        Stroke {
            id: id.to_string(),
            author_id: "alice".to_string(),
            tool: Tool::Pen,
            color: "#ff5757".to_string(),
            points: vec![Point::new(0.1, 0.2), Point::new(0.3, 0.4)],
            created_at: 1_700_000_000_000,
            is_complete: true,
        }
    }

    fn encode_value(value: &Value) -> Vec<u8> {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(value, &mut buf).unwrap();
        buf
    }

    fn map_keys(payload: &[u8]) -> Vec<String> {
        let value: Value = ciborium::de::from_reader(payload).unwrap();
        let Value::Map(entries) = value else { unreachable!("payload is a map") };
        entries
            .into_iter()
            .filter_map(|(k, _)| match k {
                Value::Text(k) => Some(k),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn snapshot_survives_encode_decode() {
        let message = Message::StateSnapshot {
            requester_id: "zoe".to_string(),
            strokes: vec![sample_stroke("s1"), sample_stroke("s2")],
            timestamp: 42,
        };

        let payload = encode(&message).unwrap();
        assert_eq!(decode(&payload).unwrap(), message);
    }

    #[test]
    fn wire_keys_are_camel_case_with_type_tag() {
        let message = Message::StrokeUpdate(StrokeData {
            stroke_id: "s1".to_string(),
            author_id: "alice".to_string(),
            tool: Tool::Highlighter,
            color: "#ffff00".to_string(),
            points: vec![Point::new(0.5, 0.5)],
            timestamp: 7,
        });

        let payload = encode(&message).unwrap();
        let keys = map_keys(&payload);

        assert!(keys.contains(&"type".to_string()));
        assert!(keys.contains(&"strokeId".to_string()));
        assert!(keys.contains(&"authorId".to_string()));
        assert!(!keys.contains(&"stroke_id".to_string()));

        let value: Value = ciborium::de::from_reader(payload.as_ref()).unwrap();
        assert_eq!(type_tag(&value).unwrap(), "stroke_update");
    }

    #[test]
    fn unknown_kind_is_reported_separately() {
        let payload = encode_value(&Value::Map(vec![
            (Value::Text("type".into()), Value::Text("cursor_move".into())),
            (Value::Text("x".into()), Value::Float(0.5)),
        ]));

        let err = decode(&payload).unwrap_err();
        assert_eq!(err, ProtocolError::UnknownKind { kind: "cursor_move".to_string() });
        assert!(err.is_unknown_kind());
    }

    #[test]
    fn known_kind_with_missing_fields_is_malformed() {
        let payload = encode_value(&Value::Map(vec![(
            Value::Text("type".into()),
            Value::Text("stroke_delete".into()),
        )]));

        assert!(matches!(decode(&payload), Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn non_map_payload_is_malformed() {
        let payload = encode_value(&Value::Array(vec![Value::Integer(1.into())]));
        assert!(matches!(decode(&payload), Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(decode(b"{\"type\":"), Err(ProtocolError::Malformed(_))));
        assert!(matches!(decode(&[]), Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn oversized_payload_rejected_before_parsing() {
        let payload = vec![0u8; MAX_PAYLOAD_SIZE + 1];
        assert!(matches!(
            decode(&payload),
            Err(ProtocolError::PayloadTooLarge { size, max })
                if size == MAX_PAYLOAD_SIZE + 1 && max == MAX_PAYLOAD_SIZE
        ));
    }

    #[test]
    fn unknown_tool_is_malformed() {
        let payload = encode_value(&Value::Map(vec![
            (Value::Text("type".into()), Value::Text("stroke_update".into())),
            (Value::Text("strokeId".into()), Value::Text("s1".into())),
            (Value::Text("authorId".into()), Value::Text("a".into())),
            (Value::Text("tool".into()), Value::Text("eraser".into())),
            (Value::Text("color".into()), Value::Text("#000".into())),
            (Value::Text("points".into()), Value::Array(vec![])),
            (Value::Text("timestamp".into()), Value::Integer(1.into())),
        ]));

        assert!(matches!(decode(&payload), Err(ProtocolError::Malformed(_))));
    }
}
