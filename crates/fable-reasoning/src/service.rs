//! The reasoning service the bridge calls into.
//!
//! [`Reasoning`] owns the prompt engine and a backend, and turns bridge
//! records into prompts and model output back into bridge records. Every
//! failure (template, network, timeout, malformed output) is logged here
//! and degrades to an empty result.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use fable_core::config::ReasoningConfig;
use fable_types::{ObservationEvent, Persona, PersonaGuid, StatusUpdate};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::ReasoningError;
use crate::format::{observation_entry, observer_card, persona_card, time_of_day};
use crate::llm::CompletionBackend;
use crate::parse::{parse_action_options, parse_observation_notes};
use crate::prompt::{PromptEngine, RenderedPrompt};

/// Action name dropped from the catalog when the persona must change course.
const CONTINUE_ACTION: &str = "continue";

/// Prompt rendering plus one LLM backend.
pub struct Reasoning<B> {
    backend: B,
    prompts: PromptEngine,
    actions: BTreeMap<String, String>,
    timeout: Duration,
}

impl<B: CompletionBackend> Reasoning<B> {
    /// Assemble the service from its parts.
    pub fn new(backend: B, prompts: PromptEngine, config: &ReasoningConfig) -> Self {
        Self {
            backend,
            prompts,
            actions: config.actions.clone(),
            timeout: config.timeout(),
        }
    }

    /// The backend's name, for logging.
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// The backend this service calls.
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Ask the model what `persona` made of the candidate events.
    ///
    /// Events whose subject is a known persona and which the model mentions
    /// get its summary and importance attached. The rest come back as they
    /// went in. With no events the model is not consulted.
    pub async fn observe(
        &self,
        persona: &Persona,
        observer: &StatusUpdate,
        mut events: Vec<ObservationEvent>,
        known_guids: &BTreeSet<PersonaGuid>,
    ) -> Vec<ObservationEvent> {
        if events.is_empty() {
            debug!(persona_guid = %persona.guid, "nothing nearby to observe");
            return events;
        }

        let entries: Vec<Value> = events.iter().map(observation_entry).collect();
        let context = serde_json::json!({
            "time": time_of_day(&observer.timestamp),
            "self_description": persona_card(persona).to_string(),
            "self_update": observer_card(observer).to_string(),
            "update_options": Value::Array(entries).to_string(),
        });

        let raw = match self.prompts.render_observation(&context) {
            Ok(prompt) => self.complete(&prompt).await,
            Err(e) => Err(e),
        };
        let raw = match raw {
            Ok(raw) => raw,
            Err(e) => {
                warn!(persona_guid = %persona.guid, error = %e, "observation call failed");
                return events;
            }
        };

        let mut annotated = 0_usize;
        for note in parse_observation_notes(&raw) {
            let guid = PersonaGuid::new(note.guid);
            if !known_guids.contains(&guid) {
                debug!(persona_guid = %guid, "model mentioned an unknown persona");
                continue;
            }
            let Some(event) = events
                .iter_mut()
                .find(|e| e.persona_guid == guid && !e.is_annotated())
            else {
                continue;
            };
            event.summary = Some(note.summary_of_activity.unwrap_or_default());
            event.importance = note.importance;
            annotated = annotated.saturating_add(1);
        }

        info!(
            persona_guid = %persona.guid,
            candidates = events.len(),
            annotated,
            "observations produced"
        );
        events
    }

    /// Ask the model how `persona` reacts to what it noticed.
    ///
    /// Returns the model's action options as-is. `ignore_continue` removes
    /// the option to carry on with the current sequence.
    pub async fn react(
        &self,
        persona: &Persona,
        observer: &StatusUpdate,
        observations: &[ObservationEvent],
        ignore_continue: bool,
    ) -> Vec<Value> {
        let mut actions = self.actions.clone();
        if ignore_continue {
            actions.remove(CONTINUE_ACTION);
        }

        let entries: Vec<Value> = observations.iter().map(observation_entry).collect();
        let context = serde_json::json!({
            "time": time_of_day(&observer.timestamp),
            "self_description": persona_card(persona).to_string(),
            "self_update": observer_card(observer).to_string(),
            "observations": Value::Array(entries).to_string(),
            "action_options": serde_json::json!(actions).to_string(),
        });

        let raw = match self.prompts.render_reactions(&context) {
            Ok(prompt) => self.complete(&prompt).await,
            Err(e) => Err(e),
        };
        match raw {
            Ok(raw) => {
                let options = parse_action_options(&raw);
                info!(persona_guid = %persona.guid, options = options.len(), "reactions produced");
                options
            }
            Err(e) => {
                warn!(persona_guid = %persona.guid, error = %e, "reaction call failed");
                Vec::new()
            }
        }
    }

    /// Call the backend under the configured deadline.
    async fn complete(&self, prompt: &RenderedPrompt) -> Result<String, ReasoningError> {
        match tokio::time::timeout(self.timeout, self.backend.complete(prompt)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(ReasoningError::Timeout {
                timeout_ms: self.timeout.as_millis(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::{TimeZone, Utc};
    use fable_types::Vector3;

    use super::*;
    use crate::prompt::tests::temp_templates_dir;

    /// Backend double returning a fixed response and recording prompts.
    struct Scripted {
        response: Result<String, String>,
        delay: Option<Duration>,
        prompts: Mutex<Vec<RenderedPrompt>>,
    }

    impl Scripted {
        fn ok(response: &str) -> Self {
            Self {
                response: Ok(response.to_owned()),
                delay: None,
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.prompts.lock().map(|p| p.len()).unwrap_or_default()
        }

        fn last_user_prompt(&self) -> String {
            self.prompts
                .lock()
                .ok()
                .and_then(|p| p.last().map(|p| p.user.clone()))
                .unwrap_or_default()
        }
    }

    impl CompletionBackend for Scripted {
        async fn complete(&self, prompt: &RenderedPrompt) -> Result<String, ReasoningError> {
            if let Ok(mut prompts) = self.prompts.lock() {
                prompts.push(prompt.clone());
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.response.clone().map_err(ReasoningError::LlmBackend)
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn persona(guid: &str) -> Persona {
        Persona {
            guid: PersonaGuid::from(guid),
            first_name: guid.to_owned(),
            last_name: String::new(),
            description: String::new(),
            summary: String::new(),
            backstory: String::new(),
        }
    }

    fn observer() -> StatusUpdate {
        StatusUpdate {
            guid: PersonaGuid::from("wyatt"),
            location: Vector3::default(),
            destination: None,
            sequence: "idle".to_owned(),
            sequence_step: "standing".to_owned(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).single().unwrap_or_default(),
        }
    }

    fn event(guid: &str, distance: f64) -> ObservationEvent {
        ObservationEvent {
            persona_guid: PersonaGuid::from(guid),
            action: "work".to_owned(),
            action_step: "hammering".to_owned(),
            distance,
            summary: None,
            importance: None,
        }
    }

    fn service(backend: Scripted, label: &str) -> Option<Reasoning<Scripted>> {
        let dir = temp_templates_dir(label);
        let prompts = PromptEngine::new(dir.to_str().unwrap_or(".")).ok()?;
        Some(Reasoning::new(backend, prompts, &ReasoningConfig::default()))
    }

    fn known(guids: &[&str]) -> BTreeSet<PersonaGuid> {
        guids.iter().map(|g| PersonaGuid::from(*g)).collect()
    }

    #[tokio::test]
    async fn observe_annotates_known_candidates() {
        let backend = Scripted::ok(
            r#"[{"guid": "ada", "summary_of_activity": "fixing a fence", "importance": 6},
                {"guid": "ghost", "summary_of_activity": "haunting", "importance": 9}]"#,
        );
        let Some(reasoning) = service(backend, "observe") else {
            return;
        };

        let events = vec![event("ada", 1.0), event("bob", 2.0), event("ghost", 3.0)];
        let out = reasoning
            .observe(&persona("wyatt"), &observer(), events, &known(&["ada", "bob"]))
            .await;

        assert_eq!(out.len(), 3);
        let ada = out.first();
        assert_eq!(ada.and_then(|e| e.summary.as_deref()), Some("fixing a fence"));
        assert_eq!(ada.and_then(|e| e.importance), Some(6));
        // Not mentioned by the model.
        assert!(out.get(1).is_some_and(|e| !e.is_annotated()));
        // Mentioned, but not a known persona.
        assert!(out.get(2).is_some_and(|e| !e.is_annotated()));

        let user = reasoning.backend.last_user_prompt();
        assert!(user.contains("1.00m"));
        assert!(user.contains("hammering"));
    }

    #[tokio::test]
    async fn observe_skips_model_without_events() {
        let Some(reasoning) = service(Scripted::ok("[]"), "observe_empty") else {
            return;
        };
        let out = reasoning
            .observe(&persona("wyatt"), &observer(), Vec::new(), &known(&["ada"]))
            .await;
        assert!(out.is_empty());
        assert_eq!(reasoning.backend.calls(), 0);
    }

    #[tokio::test]
    async fn observe_malformed_output_leaves_events_unannotated() {
        let Some(reasoning) = service(Scripted::ok("the fence, mostly"), "observe_bad") else {
            return;
        };
        let out = reasoning
            .observe(&persona("wyatt"), &observer(), vec![event("ada", 1.0)], &known(&["ada"]))
            .await;
        assert_eq!(out.len(), 1);
        assert!(out.iter().all(|e| !e.is_annotated()));
    }

    #[tokio::test]
    async fn observe_backend_error_returns_events() {
        let backend = Scripted {
            response: Err("connection refused".to_owned()),
            delay: None,
            prompts: Mutex::new(Vec::new()),
        };
        let Some(reasoning) = service(backend, "observe_err") else {
            return;
        };
        let out = reasoning
            .observe(&persona("wyatt"), &observer(), vec![event("ada", 1.0)], &known(&["ada"]))
            .await;
        assert_eq!(out, vec![event("ada", 1.0)]);
    }

    #[tokio::test]
    async fn react_drops_continue_when_asked() {
        let Some(reasoning) = service(Scripted::ok(r#"[{"action": "eat"}]"#), "react") else {
            return;
        };

        let options = reasoning
            .react(&persona("wyatt"), &observer(), &[event("ada", 1.0)], true)
            .await;
        assert_eq!(options.len(), 1);
        let user = reasoning.backend.last_user_prompt();
        assert!(!user.contains("Keep doing the current sequence."));
        assert!(user.contains("Find something to eat."));

        reasoning
            .react(&persona("wyatt"), &observer(), &[], false)
            .await;
        assert!(reasoning
            .backend
            .last_user_prompt()
            .contains("Keep doing the current sequence."));
    }

    #[tokio::test(start_paused = true)]
    async fn react_times_out_to_empty() {
        let backend = Scripted {
            response: Ok(r#"[{"action": "eat"}]"#.to_owned()),
            delay: Some(Duration::from_secs(120)),
            prompts: Mutex::new(Vec::new()),
        };
        let Some(reasoning) = service(backend, "react_timeout") else {
            return;
        };
        let options = reasoning
            .react(&persona("wyatt"), &observer(), &[], true)
            .await;
        assert!(options.is_empty());
    }
}
