//! LLM backend configuration.
//!
//! Credentials stay out of `fable-config.yaml` and are loaded from
//! environment variables instead.

use crate::error::ReasoningError;

/// Configuration for a single LLM backend.
#[derive(Debug, Clone)]
pub struct LlmBackendConfig {
    /// The backend type.
    pub backend_type: BackendType,
    /// Base API URL (e.g. `https://api.openai.com/v1`).
    pub api_url: String,
    /// API key for authentication.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
}

/// Supported LLM backend types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendType {
    /// `OpenAI`-compatible API (works with `OpenAI`, `DeepSeek`, Ollama).
    OpenAi,
    /// Anthropic Messages API (different request format).
    Anthropic,
    /// No model: every call answers with an empty JSON list. Lets the
    /// bridge run against a simulation without LLM credentials.
    Offline,
}

impl BackendType {
    /// Parse a backend name as written in `LLM_BACKEND`.
    ///
    /// # Errors
    ///
    /// Returns [`ReasoningError::Config`] for an unknown name.
    pub fn parse(name: &str) -> Result<Self, ReasoningError> {
        match name.to_lowercase().as_str() {
            "openai" | "deepseek" | "ollama" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "offline" | "none" => Ok(Self::Offline),
            other => Err(ReasoningError::Config(format!(
                "unknown backend type: {other}"
            ))),
        }
    }
}

impl LlmBackendConfig {
    /// Load the backend configuration from environment variables.
    ///
    /// - `LLM_BACKEND` -- backend type (default `offline`)
    /// - `LLM_API_URL` -- API base URL (required unless offline)
    /// - `LLM_API_KEY` -- API key (required unless offline)
    /// - `LLM_MODEL` -- model name (required unless offline)
    pub fn from_env() -> Result<Self, ReasoningError> {
        let backend_str = std::env::var("LLM_BACKEND").unwrap_or_else(|_| "offline".to_owned());
        let backend_type = BackendType::parse(&backend_str)?;

        if backend_type == BackendType::Offline {
            return Ok(Self::offline());
        }

        Ok(Self {
            backend_type,
            api_url: env_var("LLM_API_URL")?,
            api_key: env_var("LLM_API_KEY")?,
            model: env_var("LLM_MODEL")?,
        })
    }

    /// Configuration for the offline backend.
    pub fn offline() -> Self {
        Self {
            backend_type: BackendType::Offline,
            api_url: String::new(),
            api_key: String::new(),
            model: "offline".to_owned(),
        }
    }
}

/// Read a required environment variable.
fn env_var(name: &str) -> Result<String, ReasoningError> {
    std::env::var(name)
        .map_err(|e| ReasoningError::Config(format!("missing required env var {name}: {e}")))
}
