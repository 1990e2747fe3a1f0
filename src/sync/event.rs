//! Change event decoding
//!
//! A broker message names the entity type in its topic, the operation in
//! its key and the affected id in its JSON payload. Decoding happens once,
//! here; everything downstream works on the typed event.

use serde::Deserialize;

use crate::model::{ChangeOp, EntityKind};

/// A decoded change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: EntityKind,
    pub op: ChangeOp,
    pub entity_id: i64,
    /// Diagnostic identifier carried through from the producer; never used
    /// for logic.
    pub correlation_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePayload {
    entity_id: i64,
    #[serde(default)]
    correlation_id: Option<String>,
}

impl ChangeEvent {
    /// Decode one broker message.
    ///
    /// Unknown topics and keys, a key whose entity suffix disagrees with
    /// the topic, and malformed payloads all come back as `None`: the
    /// broker may carry traffic that is not ours, so none of these are
    /// errors.
    pub fn decode(topic: &str, key: &str, payload: &[u8]) -> Option<Self> {
        let kind = EntityKind::from_topic(topic)?;
        let (prefix, suffix) = key.split_once('_')?;
        let op = ChangeOp::from_prefix(prefix)?;
        if suffix != kind.key_suffix() {
            return None;
        }

        let payload: ChangePayload = serde_json::from_slice(payload).ok()?;
        if payload.entity_id < 1 {
            return None;
        }

        Some(ChangeEvent {
            kind,
            op,
            entity_id: payload.entity_id,
            correlation_id: payload.correlation_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_well_formed_messages() {
        let event = ChangeEvent::decode(
            "members",
            "add_member",
            br#"{"entityId": 7, "correlationId": "req-42"}"#,
        )
        .unwrap();

        assert_eq!(
            event,
            ChangeEvent {
                kind: EntityKind::Member,
                op: ChangeOp::Add,
                entity_id: 7,
                correlation_id: Some("req-42".to_string()),
            }
        );
    }

    #[test]
    fn correlation_id_is_optional() {
        let event =
            ChangeEvent::decode("concerts", "delete_concert", br#"{"entityId": 3}"#).unwrap();
        assert_eq!(event.op, ChangeOp::Delete);
        assert_eq!(event.correlation_id, None);
    }

    #[test]
    fn unknown_topic_is_ignored() {
        assert_eq!(
            ChangeEvent::decode("payments", "add_member", br#"{"entityId": 1}"#),
            None
        );
    }

    #[test]
    fn unknown_key_is_ignored() {
        assert_eq!(
            ChangeEvent::decode("members", "upsert_member", br#"{"entityId": 1}"#),
            None
        );
        assert_eq!(
            ChangeEvent::decode("members", "gibberish", br#"{"entityId": 1}"#),
            None
        );
    }

    #[test]
    fn key_topic_disagreement_is_ignored() {
        assert_eq!(
            ChangeEvent::decode("members", "add_concert", br#"{"entityId": 1}"#),
            None
        );
    }

    #[test]
    fn malformed_payload_is_ignored() {
        assert_eq!(ChangeEvent::decode("members", "add_member", b"not json"), None);
        assert_eq!(
            ChangeEvent::decode("members", "add_member", br#"{"entityId": 0}"#),
            None
        );
        assert_eq!(
            ChangeEvent::decode("members", "add_member", br#"{"entityId": -4}"#),
            None
        );
    }
}
