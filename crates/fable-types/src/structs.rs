//! Core records exchanged with the simulation.
//!
//! The simulation encodes most nested records as JSON strings inside the
//! outer payload (a side effect of its transport library deserializing one
//! level eagerly), so every decoder here is paired with
//! [`decode_embedded`](crate::message::decode_embedded), which accepts either
//! an object or a string holding one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::PersonaGuid;

// ---------------------------------------------------------------------------
// Persona
// ---------------------------------------------------------------------------

/// Static identity and descriptive text for one simulated character.
///
/// Replaced wholesale on every persona reload; never individually deleted.
/// The simulation sends `PascalCase` keys, so each field also accepts that
/// spelling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    /// Persona identifier.
    #[serde(alias = "ID", alias = "Guid")]
    pub guid: PersonaGuid,
    /// Given name.
    #[serde(default, alias = "FirstName")]
    pub first_name: String,
    /// Family name.
    #[serde(default, alias = "LastName")]
    pub last_name: String,
    /// Physical and personality description.
    #[serde(default, alias = "Description")]
    pub description: String,
    /// One-line summary.
    #[serde(default, alias = "Summary")]
    pub summary: String,
    /// Longer backstory.
    #[serde(default, alias = "BackStory", alias = "Backstory")]
    pub backstory: String,
}

// ---------------------------------------------------------------------------
// Vector3
// ---------------------------------------------------------------------------

/// A point in simulation space, in metres.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    /// X coordinate.
    #[serde(default)]
    pub x: f64,
    /// Y coordinate.
    #[serde(default)]
    pub y: f64,
    /// Z coordinate.
    #[serde(default)]
    pub z: f64,
}

impl Vector3 {
    /// Construct a point from its coordinates.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance between two points.
    pub fn distance(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dz.mul_add(dz, dx.mul_add(dx, dy * dy)).sqrt()
    }
}

// ---------------------------------------------------------------------------
// Status updates
// ---------------------------------------------------------------------------

/// One entity's state as it appears inside a `character-status-update-tick`
/// payload. The tick timestamp lives on the envelope, not on each entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdateWire {
    /// Entity (persona) identifier.
    pub guid: PersonaGuid,
    /// Current position.
    pub location: Vector3,
    /// Where the entity is heading, if anywhere.
    #[serde(default)]
    pub destination: Option<Vector3>,
    /// Current action sequence.
    #[serde(default)]
    pub sequence: String,
    /// Current step within the sequence.
    #[serde(default)]
    pub sequence_step: String,
}

/// Snapshot of one entity at one simulation tick. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// Entity (persona) identifier.
    pub guid: PersonaGuid,
    /// Current position.
    pub location: Vector3,
    /// Where the entity is heading, if anywhere.
    pub destination: Option<Vector3>,
    /// Current action sequence.
    pub sequence: String,
    /// Current step within the sequence.
    pub sequence_step: String,
    /// Timestamp of the tick this update belongs to.
    pub timestamp: DateTime<Utc>,
}

impl StatusUpdate {
    /// Attach the tick timestamp to a decoded wire entry.
    pub fn from_wire(timestamp: DateTime<Utc>, wire: StatusUpdateWire) -> Self {
        Self {
            guid: wire.guid,
            location: wire.location,
            destination: wire.destination,
            sequence: wire.sequence,
            sequence_step: wire.sequence_step,
            timestamp,
        }
    }

    /// Distance still to travel, when the entity has a destination.
    pub fn destination_distance(&self) -> Option<f64> {
        self.destination.map(|d| self.location.distance(&d))
    }
}

// ---------------------------------------------------------------------------
// Observations
// ---------------------------------------------------------------------------

/// "Observer noticed subject": one ranked candidate shown to the reasoning
/// backend, optionally annotated with what the backend made of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationEvent {
    /// The subject that was noticed.
    pub persona_guid: PersonaGuid,
    /// The subject's action sequence at capture time.
    pub action: String,
    /// The subject's sequence step at capture time.
    pub action_step: String,
    /// Observer-to-subject distance in metres at capture time.
    pub distance: f64,
    /// Natural-language summary attached by the reasoning backend.
    #[serde(default)]
    pub summary: Option<String>,
    /// Importance score attached by the reasoning backend.
    #[serde(default)]
    pub importance: Option<i64>,
}

impl ObservationEvent {
    /// Capture a candidate update as seen from `distance` metres away.
    pub fn from_status_update(candidate: &StatusUpdate, distance: f64) -> Self {
        Self {
            persona_guid: candidate.guid.clone(),
            action: candidate.sequence.clone(),
            action_step: candidate.sequence_step.clone(),
            distance,
            summary: None,
            importance: None,
        }
    }

    /// Whether the reasoning backend has already annotated this event.
    pub const fn is_annotated(&self) -> bool {
        self.summary.is_some()
    }
}

// ---------------------------------------------------------------------------
// Decode-only records
// ---------------------------------------------------------------------------

/// A conversation reported by the simulation. Decoded and logged only.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Conversation {
    /// Conversation identifier, when the simulation assigns one.
    #[serde(default, alias = "ID")]
    pub guid: String,
    /// Personas taking part.
    #[serde(default)]
    pub participants: Vec<PersonaGuid>,
    /// Spoken lines in order.
    #[serde(default)]
    pub lines: Vec<ConversationLine>,
}

/// One spoken line of a [`Conversation`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationLine {
    /// Who spoke.
    pub speaker: PersonaGuid,
    /// What was said.
    #[serde(default)]
    pub text: String,
}

/// A sequence step transition reported by the simulation. Decoded and
/// logged only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceStep {
    /// Persona performing the sequence.
    pub guid: PersonaGuid,
    /// Sequence name.
    #[serde(default)]
    pub sequence: String,
    /// Step that was entered.
    #[serde(default, alias = "sequence_step")]
    pub step: String,
}
