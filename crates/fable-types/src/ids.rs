//! Identifier types.
//!
//! Sessions are minted by the bridge (UUID v7, time-ordered) whenever the
//! simulation opens a connection. Persona guids are chosen by the
//! simulation and are arbitrary strings such as `wyatt_cooper`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identity of one simulation connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Create a new session identifier using UUID v7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Return the inner [`Uuid`] value.
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for SessionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Simulation-assigned identifier of a persona (and of its entity).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonaGuid(pub String);

impl PersonaGuid {
    /// Wrap a guid string.
    pub fn new(guid: impl Into<String>) -> Self {
        Self(guid.into())
    }

    /// Borrow the guid as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for PersonaGuid {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PersonaGuid {
    fn from(guid: &str) -> Self {
        Self(guid.to_owned())
    }
}

impl From<String> for PersonaGuid {
    fn from(guid: String) -> Self {
        Self(guid)
    }
}
