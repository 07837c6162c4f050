//! Reasoning adapter for the fable bridge.
//!
//! The bridge does not decide anything itself. For each decision it renders
//! a prompt from on-disk templates, sends it to an LLM over HTTP, and parses
//! the JSON the model returns. Malformed model output is never an error to
//! the caller: it degrades to an empty result and a warning.
//!
//! # Architecture
//!
//! ```text
//! Reasoning::observe / react --> PromptEngine --> CompletionBackend --> parse
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod llm;
pub mod parse;
pub mod prompt;
pub mod service;

pub use config::{BackendType, LlmBackendConfig};
pub use error::ReasoningError;
pub use llm::{CompletionBackend, LlmBackend, create_backend};
pub use prompt::{PromptEngine, RenderedPrompt};
pub use service::Reasoning;
