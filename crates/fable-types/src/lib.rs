//! Shared type definitions for the fable simulation bridge.
//!
//! Every type that crosses a crate boundary lives here: identifiers, the
//! persona and status-update records streamed by the simulation, the
//! observation events derived from them, and the tagged [`Message`]
//! envelope used on the wire in both directions.
//!
//! # Modules
//!
//! - [`ids`] -- Session and persona identifiers
//! - [`structs`] -- Persona, status update, observation and decode-only records
//! - [`message`] -- The `{type, data}` envelope and the [`MessageKind`] tag set
//! - [`time`] -- Lenient parsing of simulation timestamps

pub mod ids;
pub mod message;
pub mod structs;
pub mod time;

// Re-export all public types at crate root for convenience.
pub use ids::{PersonaGuid, SessionId};
pub use message::{Message, MessageKind, decode_embedded, decode_payload};
pub use structs::{
    Conversation, ConversationLine, ObservationEvent, Persona, SequenceStep, StatusUpdate,
    StatusUpdateWire, Vector3,
};
pub use time::parse_timestamp;
