//! LLM backend abstraction and implementations.
//!
//! [`CompletionBackend`] is the seam [`crate::Reasoning`] is generic over:
//! production uses [`LlmBackend`], tests substitute a scripted double. The
//! concrete backends stay behind enum dispatch because async methods are
//! not dyn-compatible.
//!
//! Both HTTP backends go through [`send_json`]; they differ only in the
//! request body, the auth headers and where the reply text sits.

use std::future::Future;
use std::time::Instant;

use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::config::{BackendType, LlmBackendConfig};
use crate::error::ReasoningError;
use crate::prompt::RenderedPrompt;

/// Sampling temperature for every backend.
const TEMPERATURE: f64 = 0.9;

/// Upper bound on generated tokens per call.
const MAX_TOKENS: u32 = 1024;

/// Something that turns a rendered prompt into raw completion text.
pub trait CompletionBackend: Send + Sync {
    /// Send a prompt and return the response text.
    fn complete(
        &self,
        prompt: &RenderedPrompt,
    ) -> impl Future<Output = Result<String, ReasoningError>> + Send;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}

/// The backend selected at startup.
pub enum LlmBackend {
    /// OpenAI-compatible chat completions API.
    OpenAi(OpenAiBackend),
    /// Anthropic Messages API.
    Anthropic(AnthropicBackend),
    /// Answers every prompt with an empty JSON list.
    Offline,
}

impl CompletionBackend for LlmBackend {
    async fn complete(&self, prompt: &RenderedPrompt) -> Result<String, ReasoningError> {
        match self {
            Self::OpenAi(backend) => backend.complete(prompt).await,
            Self::Anthropic(backend) => backend.complete(prompt).await,
            Self::Offline => Ok("[]".to_owned()),
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::OpenAi(_) => "openai-compatible",
            Self::Anthropic(_) => "anthropic",
            Self::Offline => "offline",
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP backends
// ---------------------------------------------------------------------------

/// Endpoint, credentials and model shared by the HTTP backends.
struct Endpoint {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl Endpoint {
    fn from_config(config: &LlmBackendConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.api_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}/{path}", self.base_url))
            .header("Content-Type", "application/json")
    }
}

/// Send `request` and return the decoded JSON body. Non-2xx statuses
/// become [`ReasoningError::LlmBackend`] carrying the response text.
async fn send_json(
    provider: &str,
    request: reqwest::RequestBuilder,
) -> Result<Value, ReasoningError> {
    let started = Instant::now();
    let response = request.send().await.map_err(|e| {
        warn!(provider, error = %e, "LLM request failed");
        ReasoningError::LlmBackend(format!("{provider}: request failed: {e}"))
    })?;

    let status = response.status();
    if !status.is_success() {
        let detail = response.text().await.unwrap_or_default();
        warn!(provider, %status, "LLM returned an error status");
        return Err(ReasoningError::LlmBackend(format!(
            "{provider}: HTTP {status}: {detail}"
        )));
    }

    let body = response.json().await.map_err(|e| {
        warn!(provider, error = %e, "LLM response body unreadable");
        ReasoningError::LlmBackend(format!("{provider}: unreadable body: {e}"))
    })?;
    debug!(
        provider,
        elapsed = ?started.elapsed(),
        "LLM call completed"
    );
    Ok(body)
}

/// Follow `path` into `body` and return the string found there.
fn text_at(provider: &str, body: &Value, path: &[&str]) -> Result<String, ReasoningError> {
    path.iter()
        .try_fold(body, |node, key| match key.parse::<usize>() {
            Ok(index) => node.get(index),
            Err(_) => node.get(*key),
        })
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            ReasoningError::LlmBackend(format!("{provider}: no text at {}", path.join(".")))
        })
}

/// OpenAI-compatible chat completions (`POST {api_url}/chat/completions`).
pub struct OpenAiBackend {
    endpoint: Endpoint,
}

impl OpenAiBackend {
    const PROVIDER: &'static str = "openai";

    /// Build a client for the configured endpoint.
    pub fn new(config: &LlmBackendConfig) -> Self {
        Self {
            endpoint: Endpoint::from_config(config),
        }
    }

    async fn complete(&self, prompt: &RenderedPrompt) -> Result<String, ReasoningError> {
        let body = json!({
            "model": self.endpoint.model,
            "temperature": TEMPERATURE,
            "max_tokens": MAX_TOKENS,
            "messages": [
                {"role": "system", "content": prompt.system},
                {"role": "user", "content": prompt.user},
            ],
        });
        let request = self
            .endpoint
            .post("chat/completions")
            .bearer_auth(&self.endpoint.api_key)
            .json(&body);

        let reply = send_json(Self::PROVIDER, request).await?;
        openai_text(&reply)
    }
}

fn openai_text(reply: &Value) -> Result<String, ReasoningError> {
    text_at(OpenAiBackend::PROVIDER, reply, &["choices", "0", "message", "content"])
}

/// Anthropic Messages API (`POST {api_url}/messages`). The system prompt
/// travels as a top-level field, not as a message.
pub struct AnthropicBackend {
    endpoint: Endpoint,
}

impl AnthropicBackend {
    const PROVIDER: &'static str = "anthropic";
    const API_VERSION: &'static str = "2023-06-01";

    /// Build a client for the configured endpoint.
    pub fn new(config: &LlmBackendConfig) -> Self {
        Self {
            endpoint: Endpoint::from_config(config),
        }
    }

    async fn complete(&self, prompt: &RenderedPrompt) -> Result<String, ReasoningError> {
        let body = json!({
            "model": self.endpoint.model,
            "temperature": TEMPERATURE,
            "max_tokens": MAX_TOKENS,
            "system": prompt.system,
            "messages": [{"role": "user", "content": prompt.user}],
        });
        let request = self
            .endpoint
            .post("messages")
            .header("x-api-key", &self.endpoint.api_key)
            .header("anthropic-version", Self::API_VERSION)
            .json(&body);

        let reply = send_json(Self::PROVIDER, request).await?;
        anthropic_text(&reply)
    }
}

fn anthropic_text(reply: &Value) -> Result<String, ReasoningError> {
    text_at(AnthropicBackend::PROVIDER, reply, &["content", "0", "text"])
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Create an LLM backend from configuration.
pub fn create_backend(config: &LlmBackendConfig) -> LlmBackend {
    match config.backend_type {
        BackendType::OpenAi => LlmBackend::OpenAi(OpenAiBackend::new(config)),
        BackendType::Anthropic => LlmBackend::Anthropic(AnthropicBackend::new(config)),
        BackendType::Offline => LlmBackend::Offline,
    }
}
