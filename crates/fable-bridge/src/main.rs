//! Bridge binary.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `fable-config.yaml` (or `FABLE_CONFIG`)
//! 3. Load prompt templates and the LLM backend
//! 4. Start the persona sync loop
//! 5. Serve the WebSocket and status endpoints until Ctrl-C

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use fable_bridge::{AppState, SyncLoop, start_server};
use fable_core::BridgeConfig;
use fable_reasoning::{LlmBackendConfig, PromptEngine, Reasoning, create_backend};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "fable-config.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("fable-bridge starting");

    // 2. Load configuration.
    let config = load_config()?;
    info!(
        bind = %config.server.bind_address(),
        radius = config.observation.radius,
        limit = config.observation.limit,
        auto_observers = config.observation.auto_observers.len(),
        "configuration loaded"
    );

    // 3. Prompt templates and LLM backend.
    let prompts = PromptEngine::new(&config.reasoning.templates_dir)
        .context("loading prompt templates")?;
    let backend_config = LlmBackendConfig::from_env().context("reading LLM backend settings")?;
    let reasoning = Reasoning::new(create_backend(&backend_config), prompts, &config.reasoning);
    info!(
        backend = reasoning.backend_name(),
        model = %backend_config.model,
        templates_dir = %config.reasoning.templates_dir,
        "reasoning backend ready"
    );

    let state = Arc::new(AppState::new(config, reasoning));

    // 4. Persona sync loop.
    tokio::spawn(SyncLoop::new(Arc::clone(&state)).run());

    // 5. Serve.
    start_server(state).await?;
    info!("fable-bridge stopped");
    Ok(())
}

/// Load `FABLE_CONFIG` or `fable-config.yaml`, falling back to defaults
/// when the file does not exist.
fn load_config() -> anyhow::Result<BridgeConfig> {
    let path = std::env::var("FABLE_CONFIG")
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);

    if path.exists() {
        BridgeConfig::from_file(&path)
            .with_context(|| format!("loading {}", path.display()))
    } else {
        warn!(path = %path.display(), "config file not found, using defaults");
        let mut config = BridgeConfig::default();
        config.server.apply_env_overrides()?;
        Ok(config)
    }
}
