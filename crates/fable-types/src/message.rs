//! The `{type, data}` envelope used on the wire in both directions.
//!
//! `type` is an open set of strings. [`MessageKind`] names the tags the
//! bridge understands and keeps everything else in an explicit
//! [`MessageKind::Unknown`] branch so unrecognized traffic is logged rather
//! than rejected.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tagged message envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Logical message type, e.g. `choose-sequence`.
    #[serde(rename = "type")]
    pub message_type: String,
    /// Payload. Either structured JSON or, when the sender's payload did not
    /// parse, the raw string.
    #[serde(default)]
    pub data: Value,
}

impl Message {
    /// Build a message from a type tag and payload.
    pub fn new(message_type: impl Into<String>, data: Value) -> Self {
        Self {
            message_type: message_type.into(),
            data,
        }
    }

    /// Build a synthetic `error` message carrying a human-readable reason.
    pub fn error(reason: &str) -> Self {
        Self::new(
            MessageKind::Error.as_str(),
            serde_json::json!({ "error": reason }),
        )
    }

    /// Classify the type tag.
    pub fn kind(&self) -> MessageKind {
        MessageKind::from_tag(&self.message_type)
    }

    /// Whether this is an `error` message.
    pub fn is_error(&self) -> bool {
        self.kind() == MessageKind::Error
    }
}

/// Message type tags understood by the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Simulation asks which sequence a persona should run next.
    ChooseSequence,
    /// Reply to [`MessageKind::ChooseSequence`].
    ChooseSequenceResponse,
    /// A batch of entity status updates for one tick.
    StatusUpdateTick,
    /// A conversation between personas.
    Conversation,
    /// A persona entered a new sequence step.
    SequenceStep,
    /// Bridge asks the simulation for persona records.
    RequestPersonas,
    /// Reply to [`MessageKind::RequestPersonas`].
    RequestPersonasResponse,
    /// Synthetic error reply.
    Error,
    /// Any tag not listed above.
    Unknown(String),
}

impl MessageKind {
    /// Classify a wire tag.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "choose-sequence" => Self::ChooseSequence,
            "choose-sequence-response" => Self::ChooseSequenceResponse,
            "character-status-update-tick" => Self::StatusUpdateTick,
            "character-conversation" => Self::Conversation,
            "character-sequence-step" => Self::SequenceStep,
            "request-personas" => Self::RequestPersonas,
            "request-personas-response" => Self::RequestPersonasResponse,
            "error" => Self::Error,
            other => Self::Unknown(other.to_owned()),
        }
    }

    /// The wire tag for this kind.
    pub fn as_str(&self) -> &str {
        match self {
            Self::ChooseSequence => "choose-sequence",
            Self::ChooseSequenceResponse => "choose-sequence-response",
            Self::StatusUpdateTick => "character-status-update-tick",
            Self::Conversation => "character-conversation",
            Self::SequenceStep => "character-sequence-step",
            Self::RequestPersonas => "request-personas",
            Self::RequestPersonasResponse => "request-personas-response",
            Self::Error => "error",
            Self::Unknown(tag) => tag,
        }
    }
}

impl core::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decode a payload string: JSON when it parses, the raw string otherwise.
pub fn decode_payload(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()))
}

/// Decode a nested record that may arrive either as an object or as a
/// string containing JSON.
pub fn decode_embedded<T: DeserializeOwned>(value: &Value) -> Result<T, serde_json::Error> {
    match value {
        Value::String(raw) => serde_json::from_str(raw),
        other => T::deserialize(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_roundtrip_through_kind() {
        for tag in [
            "choose-sequence",
            "choose-sequence-response",
            "character-status-update-tick",
            "character-conversation",
            "character-sequence-step",
            "request-personas",
            "request-personas-response",
            "error",
        ] {
            assert_eq!(MessageKind::from_tag(tag).as_str(), tag);
        }
    }

    #[test]
    fn unknown_tags_are_preserved() {
        let kind = MessageKind::from_tag("weather-report");
        assert_eq!(kind, MessageKind::Unknown("weather-report".to_owned()));
        assert_eq!(kind.to_string(), "weather-report");
    }

    #[test]
    fn error_message_shape() {
        let msg = Message::error("no active session");
        assert!(msg.is_error());
        assert_eq!(msg.data["error"], "no active session");
    }

    #[test]
    fn payload_falls_back_to_raw_string() {
        assert_eq!(decode_payload(r#"{"a":1}"#), serde_json::json!({"a": 1}));
        assert_eq!(
            decode_payload("not json {"),
            Value::String("not json {".to_owned())
        );
    }

    #[test]
    fn envelope_uses_type_key() {
        let msg = Message::new("echo", serde_json::json!("hi"));
        let json = serde_json::to_value(&msg).unwrap_or_default();
        assert_eq!(json["type"], "echo");
        assert_eq!(json["data"], "hi");
    }
}
