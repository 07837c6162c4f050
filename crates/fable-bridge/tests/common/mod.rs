//! Shared fixtures for the bridge integration tests.

#![allow(clippy::unwrap_used, dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use fable_bridge::AppState;
use fable_core::BridgeConfig;
use fable_reasoning::{CompletionBackend, PromptEngine, Reasoning, ReasoningError, RenderedPrompt};
use fable_types::{Persona, PersonaGuid};

/// Backend double that answers with queued responses, then `[]`.
#[derive(Default)]
pub struct Scripted {
    responses: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<RenderedPrompt>>,
}

impl Scripted {
    pub fn with_responses(responses: &[&str]) -> Self {
        Self {
            responses: Mutex::new(responses.iter().map(|r| (*r).to_owned()).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

impl CompletionBackend for Scripted {
    async fn complete(&self, prompt: &RenderedPrompt) -> Result<String, ReasoningError> {
        self.prompts.lock().unwrap().push(prompt.clone());
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "[]".to_owned()))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Write a minimal template set into a directory unique to this test.
pub fn templates_dir(label: &str) -> String {
    let dir = std::env::temp_dir().join(format!(
        "fable_bridge_templates_{label}_{}_{:?}",
        std::process::id(),
        std::thread::current().id()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("system.j2"), "You are {{ self_description }} at {{ time }}.").unwrap();
    std::fs::write(
        dir.join("observation.j2"),
        "Me: {{ self_update }}\nNearby: {{ update_options }}",
    )
    .unwrap();
    std::fs::write(
        dir.join("reactions.j2"),
        "Me: {{ self_update }}\nNoticed: {{ observations }}\nActions: {{ action_options }}",
    )
    .unwrap();
    dir.to_str().unwrap().to_owned()
}

/// Shared state backed by a scripted backend.
pub fn test_state(label: &str, backend: Scripted) -> Arc<AppState<Scripted>> {
    let config = BridgeConfig::default();
    let prompts = PromptEngine::new(&templates_dir(label)).unwrap();
    let reasoning = Reasoning::new(backend, prompts, &config.reasoning);
    Arc::new(AppState::new(config, reasoning))
}

pub fn persona(guid: &str) -> Persona {
    Persona {
        guid: PersonaGuid::from(guid),
        first_name: guid.to_owned(),
        last_name: "Tester".to_owned(),
        description: String::new(),
        summary: String::new(),
        backstory: String::new(),
    }
}

/// Load personas straight into the store.
pub async fn load_personas(state: &AppState<Scripted>, guids: &[&str]) {
    state
        .store
        .write()
        .await
        .upsert_personas(guids.iter().map(|g| persona(g)).collect());
}

/// A status update entry encoded the way the simulation sends it: a JSON
/// string inside the outer payload.
pub fn wire_update(guid: &str, x: f64, sequence: &str) -> serde_json::Value {
    serde_json::Value::String(
        serde_json::json!({
            "guid": guid,
            "location": {"x": x, "y": 0.0, "z": 0.0},
            "sequence": sequence,
            "sequence_step": "step_1",
        })
        .to_string(),
    )
}
