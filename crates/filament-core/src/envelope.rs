//! Wire envelope and inbound frame decoding.
//!
//! Inbound text frames are either the keepalive literal `"ping"` or a JSON
//! [`MessageBlock`]. Decoding is strict: unknown fields, missing fields, or
//! anything that is not an object of the right shape is rejected.
//!
//! Outbound frames are never enveloped. Clients receive `"pong"`, the
//! reconnect identity prefixed with [`RECONNECT_PREFIX`], or the raw
//! relayed message text.

use serde::{Deserialize, Serialize};

use crate::errors::RelayError;
use crate::filament::Filament;
use crate::ids::ReconnectId;

/// Keepalive request literal.
pub const PING: &str = "ping";

/// Keepalive reply literal.
pub const PONG: &str = "pong";

/// Sentinel prefix marking the reconnect identity frame.
pub const RECONNECT_PREFIX: char = '.';

/// A message addressed to a filament.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessageBlock {
    /// Filament the sender claims to be talking in.
    pub filament: Filament,
    /// Message text, relayed verbatim.
    pub message: String,
}

impl MessageBlock {
    /// Build an envelope.
    pub fn new(filament: Filament, message: impl Into<String>) -> Self {
        Self {
            filament,
            message: message.into(),
        }
    }
}

/// A decoded inbound frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// Keepalive request.
    Ping,
    /// A message to relay.
    Message(MessageBlock),
}

impl Frame {
    /// Decode an inbound text payload.
    ///
    /// The keepalive check is an exact comparison; `" ping"` or `"PING"`
    /// are decoded as JSON and rejected.
    pub fn decode(payload: &str) -> Result<Self, RelayError> {
        if payload == PING {
            return Ok(Self::Ping);
        }
        serde_json::from_str::<MessageBlock>(payload)
            .map(Self::Message)
            .map_err(|e| RelayError::MalformedEnvelope(e.to_string()))
    }

    /// Decode an inbound binary payload as UTF-8 text.
    pub fn decode_bytes(payload: &[u8]) -> Result<Self, RelayError> {
        let text = std::str::from_utf8(payload)
            .map_err(|e| RelayError::MalformedEnvelope(format!("invalid UTF-8: {e}")))?;
        Self::decode(text)
    }
}

/// Outbound frame carrying a reconnect identity: `"." + id`.
pub fn reconnect_frame(id: &ReconnectId) -> String {
    let mut frame = String::with_capacity(id.len() + 1);
    frame.push(RECONNECT_PREFIX);
    frame.push_str(id.as_str());
    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn ping_literal() {
        assert_eq!(Frame::decode("ping").unwrap(), Frame::Ping);
    }

    #[test]
    fn ping_is_exact() {
        assert_matches!(Frame::decode(" ping"), Err(RelayError::MalformedEnvelope(_)));
        assert_matches!(Frame::decode("PING"), Err(RelayError::MalformedEnvelope(_)));
    }

    #[test]
    fn decode_message_block() {
        let json = r#"{"filament":{"domain":"acme","name":"lobby"},"message":"hi"}"#;
        let frame = Frame::decode(json).unwrap();
        assert_eq!(
            frame,
            Frame::Message(MessageBlock::new(Filament::new("acme", "lobby"), "hi"))
        );
    }

    #[test]
    fn decode_keeps_blank_filament_for_validation() {
        let json = r#"{"filament":{"domain":" ","name":"lobby"},"message":"hi"}"#;
        let Frame::Message(block) = Frame::decode(json).unwrap() else {
            panic!("expected message");
        };
        assert_eq!(block.filament.domain, " ");
    }

    #[test]
    fn not_json_is_malformed() {
        assert_matches!(Frame::decode("hello"), Err(RelayError::MalformedEnvelope(_)));
    }

    #[test]
    fn empty_payload_is_malformed() {
        assert_matches!(Frame::decode(""), Err(RelayError::MalformedEnvelope(_)));
    }

    #[test]
    fn missing_message_is_malformed() {
        let json = r#"{"filament":{"domain":"acme","name":"lobby"}}"#;
        assert_matches!(Frame::decode(json), Err(RelayError::MalformedEnvelope(_)));
    }

    #[test]
    fn missing_filament_is_malformed() {
        assert_matches!(
            Frame::decode(r#"{"message":"hi"}"#),
            Err(RelayError::MalformedEnvelope(_))
        );
    }

    #[test]
    fn unknown_top_level_field_is_malformed() {
        let json = r#"{"filament":{"domain":"a","name":"b"},"message":"hi","to":"all"}"#;
        assert_matches!(Frame::decode(json), Err(RelayError::MalformedEnvelope(_)));
    }

    #[test]
    fn non_string_message_is_malformed() {
        let json = r#"{"filament":{"domain":"a","name":"b"},"message":42}"#;
        assert_matches!(Frame::decode(json), Err(RelayError::MalformedEnvelope(_)));
    }

    #[test]
    fn array_is_malformed() {
        assert_matches!(Frame::decode("[1,2,3]"), Err(RelayError::MalformedEnvelope(_)));
    }

    #[test]
    fn binary_utf8_decodes() {
        assert_eq!(Frame::decode_bytes(b"ping").unwrap(), Frame::Ping);
    }

    #[test]
    fn binary_invalid_utf8_is_malformed() {
        assert_matches!(
            Frame::decode_bytes(&[0xff, 0xfe, 0x00]),
            Err(RelayError::MalformedEnvelope(_))
        );
    }

    #[test]
    fn reconnect_frame_has_prefix() {
        let id = ReconnectId::from("abc-123");
        assert_eq!(reconnect_frame(&id), ".abc-123");
    }
}
