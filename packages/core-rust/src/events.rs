//! Invalidation event schema for the notification channel.
//!
//! Every mutation of the authoritative store publishes one
//! [`InvalidationEvent`] on the resolved channel, in the same transaction
//! as the mutation. Peers drop the affected key from their local tier on
//! receipt. Delivery is FIFO per channel; there are no cross-key ordering
//! guarantees across processes.

use serde::{Deserialize, Serialize};

use crate::codec::CodecError;

/// Mutation kind carried by an invalidation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventOp {
    /// A row was inserted or overwritten.
    Set,
    /// A row was explicitly deleted.
    Invalidate,
    /// A row was removed because its TTL had passed.
    Expire,
}

/// Cross-process invalidation event.
///
/// Wire form is UTF-8 JSON: `{"key": "...", "op": "set", "origin": "..."}`.
/// `origin` is the opaque id of the emitting process, letting listeners
/// recognize their own events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationEvent {
    /// Cache key affected by the mutation.
    pub key: String,
    /// What happened to the row.
    pub op: EventOp,
    /// Opaque id of the originating process.
    pub origin: String,
}

impl InvalidationEvent {
    /// Creates an event for the given key, operation, and origin.
    #[must_use]
    pub fn new(key: impl Into<String>, op: EventOp, origin: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            op,
            origin: origin.into(),
        }
    }

    /// Serializes the event into its notification payload.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if serialization fails (cannot occur
    /// for well-formed events; kept as a `Result` for codec symmetry).
    pub fn to_payload(&self) -> Result<String, CodecError> {
        serde_json::to_string(self).map_err(CodecError::Encode)
    }

    /// Parses an event from a notification payload.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Decode`] for malformed payloads or unknown
    /// operation names.
    pub fn from_payload(payload: &str) -> Result<Self, CodecError> {
        serde_json::from_str(payload).map_err(CodecError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format_is_stable() {
        let event = InvalidationEvent::new("user:42", EventOp::Set, "proc-1");
        let payload = event.to_payload().expect("serialize");
        assert_eq!(
            payload,
            r#"{"key":"user:42","op":"set","origin":"proc-1"}"#
        );
    }

    #[test]
    fn payload_round_trip() {
        for op in [EventOp::Set, EventOp::Invalidate, EventOp::Expire] {
            let event = InvalidationEvent::new("k", op, "origin-abc");
            let payload = event.to_payload().expect("serialize");
            let parsed = InvalidationEvent::from_payload(&payload).expect("parse");
            assert_eq!(event, parsed);
        }
    }

    #[test]
    fn op_names_are_lowercase() {
        assert_eq!(
            serde_json::to_string(&EventOp::Invalidate).expect("serialize"),
            r#""invalidate""#
        );
        assert_eq!(
            serde_json::to_string(&EventOp::Expire).expect("serialize"),
            r#""expire""#
        );
    }

    #[test]
    fn unknown_op_is_rejected() {
        let err = InvalidationEvent::from_payload(
            r#"{"key":"k","op":"upsert","origin":"p"}"#,
        )
        .expect_err("unknown op");
        assert!(matches!(err, CodecError::Decode(_)));
    }

    #[test]
    fn missing_field_is_rejected() {
        let err = InvalidationEvent::from_payload(r#"{"key":"k","op":"set"}"#)
            .expect_err("missing origin");
        assert!(matches!(err, CodecError::Decode(_)));
    }
}
