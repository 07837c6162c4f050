//! JSON frames carried over the WebSocket.
//!
//! A plain WebSocket has no named events and no acknowledgments, so both
//! are encoded in the frame: an [`Frame::Event`] names its event and may
//! carry an `id`; the peer answers such an event with exactly one
//! [`Frame::Ack`] echoing that `id`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outbound correlated request (bridge to simulation, Mode A).
pub const EVENT_MESSAGE_ACK: &str = "message-ack";
/// Message envelope event, request or fire-and-forget (simulation to bridge,
/// Mode B; bridge to simulation for notifications).
pub const EVENT_MESSAGE: &str = "message";
/// Echoed back to the sender unchanged.
pub const EVENT_ECHO: &str = "echo";
/// Acknowledged with its own arguments.
pub const EVENT_ACK: &str = "ack";
/// Liveness signal from the simulation.
pub const EVENT_HEARTBEAT: &str = "heartbeat";

/// One WebSocket text frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Frame {
    /// Acknowledgment of an earlier event that carried an `id`.
    Ack {
        /// The `id` of the acknowledged event.
        ack: u64,
        /// Acknowledgment arguments.
        #[serde(default)]
        args: Vec<Value>,
    },
    /// A named event.
    Event {
        /// Event name.
        event: String,
        /// Positional arguments.
        #[serde(default)]
        args: Vec<Value>,
        /// Present when the sender expects an acknowledgment.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<u64>,
    },
}

impl Frame {
    /// Build an event frame.
    pub fn event(event: &str, args: Vec<Value>, id: Option<u64>) -> Self {
        Self::Event {
            event: event.to_owned(),
            args,
            id,
        }
    }

    /// Build an acknowledgment frame.
    pub const fn ack(id: u64, args: Vec<Value>) -> Self {
        Self::Ack { ack: id, args }
    }

    /// Build the `[type, data-as-json-string]` argument pair used by the
    /// `message` and `message-ack` events and their acknowledgments.
    pub fn envelope_args(message_type: &str, data: &Value) -> Vec<Value> {
        vec![
            Value::String(message_type.to_owned()),
            Value::String(data.to_string()),
        ]
    }

    /// Parse a text frame.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Serialize to a text frame.
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
