//! Error types for the bridge.
//!
//! Protocol errors never end the process. They are logged where they
//! occur and turned into a no-op or an `error` message; only startup
//! failures (configuration, templates, bind) propagate out of `main`.

/// Errors that can occur in the bridge.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// No simulation is connected.
    #[error("no active session")]
    NoActiveSession,

    /// The referenced persona is not in the state store.
    #[error("unknown persona: {0}")]
    UnknownPersona(String),

    /// A payload could not be decoded into the record its type implies.
    #[error("malformed payload for {message_type}: {reason}")]
    MalformedPayload {
        /// The message type the payload arrived under.
        message_type: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The reasoning backend returned something that is not the structured
    /// data asked for.
    #[error("reasoning backend returned unparsable output: {0}")]
    ReasoningBackendParseFailure(String),

    /// The state store rejected a write.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: fable_core::StoreError,
    },

    /// The HTTP/WebSocket server failed to bind or serve.
    #[error("server error: {0}")]
    Server(String),

    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: fable_core::ConfigError,
    },

    /// The reasoning adapter could not be set up.
    #[error("reasoning error: {source}")]
    Reasoning {
        /// The underlying reasoning error.
        #[from]
        source: fable_reasoning::ReasoningError,
    },
}

impl BridgeError {
    /// Shorthand for [`BridgeError::MalformedPayload`].
    pub fn malformed(message_type: &str, reason: impl core::fmt::Display) -> Self {
        Self::MalformedPayload {
            message_type: message_type.to_owned(),
            reason: reason.to_string(),
        }
    }
}
