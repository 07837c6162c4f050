//! Error types for the reasoning adapter.
//!
//! These never reach the simulation. [`crate::Reasoning`] logs them and
//! falls back to an empty result.

/// Errors that can occur while producing a decision.
#[derive(Debug, thiserror::Error)]
pub enum ReasoningError {
    /// Failed to load or render a prompt template.
    #[error("template render error: {0}")]
    Template(String),

    /// An LLM backend returned an error or was unreachable.
    #[error("LLM backend error: {0}")]
    LlmBackend(String),

    /// The LLM response was not the structured data we asked for.
    #[error("response parse error: {0}")]
    Parse(String),

    /// The LLM call exceeded its deadline.
    #[error("timeout: LLM call exceeded {timeout_ms}ms")]
    Timeout {
        /// The deadline in milliseconds.
        timeout_ms: u128,
    },

    /// Configuration is invalid or missing.
    #[error("config error: {0}")]
    Config(String),

    /// Serialization or deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}
