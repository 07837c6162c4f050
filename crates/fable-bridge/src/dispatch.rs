//! Message router: one handler per message type.
//!
//! The router holds no state of its own. Status ticks go into the
//! [`StateStore`](fable_core::StateStore), auto-observer results into the
//! [`ObservationMemory`](fable_core::ObservationMemory), and sequence
//! choices are answered with the reasoning backend's options. Store locks
//! are released before any call into the reasoning backend.
//!
//! | type | reply |
//! |------|-------|
//! | `choose-sequence` | `choose-sequence-response` `{"options": [...]}` |
//! | `character-status-update-tick` | none |
//! | `character-conversation` | none (decoded and logged) |
//! | `character-sequence-step` | none (decoded and logged) |
//! | anything else | none (warning) |

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use fable_core::select_candidates;
use fable_reasoning::CompletionBackend;
use fable_types::{
    Conversation, Message, MessageKind, ObservationEvent, Persona, PersonaGuid, SequenceStep,
    StatusUpdate, StatusUpdateWire, decode_embedded, parse_timestamp,
};
use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::BridgeError;
use crate::rpc::MessageHandler;
use crate::state::AppState;

/// Routes decoded inbound messages to their handlers.
pub struct MessageRouter<B> {
    state: Arc<AppState<B>>,
}

impl<B> Clone for MessageRouter<B> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

/// What is left to do for a message once its state effects are applied.
#[derive(Debug)]
pub enum Accepted {
    /// Nothing further; no reply.
    Done,
    /// Generate options for a persona and reply with them.
    ChooseSequence {
        /// The persona choosing.
        persona: Box<Persona>,
        /// Its latest status update.
        observer: Box<StatusUpdate>,
        /// What it noticed most recently.
        observations: Vec<ObservationEvent>,
    },
    /// Run the auto-observers present in a freshly recorded tick.
    Observe {
        /// The tick's timestamp.
        timestamp: DateTime<Utc>,
        /// Each auto-observer with its own update from the tick.
        observers: Vec<(Persona, StatusUpdate)>,
        /// Every update in the tick.
        updates: Vec<StatusUpdate>,
        /// Guids of every loaded persona.
        known_guids: BTreeSet<PersonaGuid>,
    },
}

impl<B: CompletionBackend> MessageRouter<B> {
    /// Create a router over the shared state.
    pub const fn new(state: Arc<AppState<B>>) -> Self {
        Self { state }
    }

    /// Handle one message, returning the reply if its type has one.
    pub async fn route(&self, message: Message) -> Option<Message> {
        self.handle(message).await
    }

    /// Apply a message to the store and snapshot what its completion needs.
    async fn accept_message(&self, message: Message) -> Accepted {
        let kind = message.kind();
        match kind {
            MessageKind::ChooseSequence => self.choose_sequence(&message.data).await,
            MessageKind::StatusUpdateTick => self.status_update_tick(&message.data).await,
            MessageKind::Conversation => {
                log_decoded::<Conversation>(&kind, &message.data, "conversation");
                Accepted::Done
            }
            MessageKind::SequenceStep => {
                log_decoded::<SequenceStep>(&kind, &message.data, "sequence");
                Accepted::Done
            }
            other => {
                warn!(message_type = %other, "no handler for message type");
                Accepted::Done
            }
        }
    }

    async fn complete_message(&self, accepted: Accepted) -> Option<Message> {
        match accepted {
            Accepted::Done => None,
            Accepted::ChooseSequence {
                persona,
                observer,
                observations,
            } => Some(self.sequence_options(&persona, &observer, &observations).await),
            Accepted::Observe {
                timestamp,
                observers,
                updates,
                known_guids,
            } => {
                join_all(observers.iter().map(|(persona, own_update)| {
                    self.observe(persona, own_update, timestamp, &updates, &known_guids)
                }))
                .await;
                None
            }
        }
    }

    /// Look up the persona named in a `choose-sequence` payload.
    async fn choose_sequence(&self, data: &Value) -> Accepted {
        let kind = MessageKind::ChooseSequence;
        let Some(guid) = data.get("persona_guid").and_then(Value::as_str) else {
            warn!(error = %BridgeError::malformed(kind.as_str(), "missing persona_guid"), "dropping request");
            return Accepted::Done;
        };
        let guid = PersonaGuid::from(guid);

        let (persona, observer) = {
            let store = self.state.store.read().await;
            let Some(persona) = store.persona(&guid).cloned() else {
                warn!(error = %BridgeError::UnknownPersona(guid.to_string()), "dropping request");
                return Accepted::Done;
            };
            let Some(observer) = store.latest_update_for(&guid).cloned() else {
                warn!(persona_guid = %guid, "no status update recorded yet, dropping request");
                return Accepted::Done;
            };
            (persona, observer)
        };

        let observations = self
            .state
            .memory
            .read()
            .await
            .latest(&guid)
            .map(|(_, events)| events.to_vec())
            .unwrap_or_default();

        Accepted::ChooseSequence {
            persona: Box::new(persona),
            observer: Box::new(observer),
            observations,
        }
    }

    /// Ask the reasoning backend for options and wrap them as the reply.
    async fn sequence_options(
        &self,
        persona: &Persona,
        observer: &StatusUpdate,
        observations: &[ObservationEvent],
    ) -> Message {
        let options = self
            .state
            .reasoning
            .react(persona, observer, observations, true)
            .await;

        if options.is_empty() {
            warn!(
                persona_guid = %persona.guid,
                error = %BridgeError::ReasoningBackendParseFailure("no action options".to_owned()),
                "replying with an empty option list"
            );
        } else {
            info!(persona_guid = %persona.guid, options = options.len(), "sequence options generated");
        }

        Message::new(
            MessageKind::ChooseSequenceResponse.as_str(),
            serde_json::json!({ "options": options }),
        )
    }

    /// Record a tick and pick out the auto-observers present in it.
    async fn status_update_tick(&self, data: &Value) -> Accepted {
        let kind = MessageKind::StatusUpdateTick;
        let Some(timestamp) = data
            .get("timestamp")
            .and_then(Value::as_str)
            .and_then(parse_timestamp)
        else {
            warn!(error = %BridgeError::malformed(kind.as_str(), "missing or unparsable timestamp"), "dropping tick");
            return Accepted::Done;
        };

        let updates: Vec<StatusUpdate> = data
            .get("updates")
            .and_then(Value::as_array)
            .map(|raw| raw.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|raw| match decode_embedded::<StatusUpdateWire>(raw) {
                Ok(wire) => Some(StatusUpdate::from_wire(timestamp, wire)),
                Err(e) => {
                    warn!(error = %BridgeError::malformed(kind.as_str(), e), "skipping status update");
                    None
                }
            })
            .collect();

        let mut store = self.state.store.write().await;
        if let Err(e) = store.add_tick(timestamp, updates.clone()) {
            warn!(error = %BridgeError::from(e), "tick not recorded, skipping observations");
            return Accepted::Done;
        }
        debug!(%timestamp, updates = updates.len(), "tick recorded");

        let observers = self
            .state
            .config
            .observation
            .auto_observers
            .iter()
            .filter_map(|guid| {
                let Some(persona) = store.persona(guid) else {
                    debug!(persona_guid = %guid, "auto-observer not loaded yet");
                    return None;
                };
                let Some(own_update) = updates.iter().find(|u| u.guid == *guid) else {
                    debug!(persona_guid = %guid, "auto-observer absent from tick");
                    return None;
                };
                Some((persona.clone(), own_update.clone()))
            })
            .collect();
        let known_guids = store.persona_guids();
        drop(store);

        Accepted::Observe {
            timestamp,
            observers,
            updates,
            known_guids,
        }
    }

    /// Run one auto-observer against a tick's updates and remember what it
    /// noticed.
    async fn observe(
        &self,
        persona: &Persona,
        own_update: &StatusUpdate,
        timestamp: DateTime<Utc>,
        updates: &[StatusUpdate],
        known_guids: &BTreeSet<PersonaGuid>,
    ) {
        let candidates = select_candidates(
            own_update,
            updates,
            self.state.config.observation.filter_params(),
        );
        let events = self
            .state
            .reasoning
            .observe(persona, own_update, candidates, known_guids)
            .await;

        debug!(persona_guid = %persona.guid, events = events.len(), "observations recorded");
        self.state
            .memory
            .write()
            .await
            .record(persona.guid.clone(), timestamp, events);
    }
}

impl<B: CompletionBackend> MessageHandler for MessageRouter<B> {
    type Pending = Accepted;

    async fn accept(&self, message: Message) -> Accepted {
        self.accept_message(message).await
    }

    async fn complete(&self, pending: Accepted) -> Option<Message> {
        self.complete_message(pending).await
    }
}

/// Decode the record under `field` and log it. These records are not
/// stored.
fn log_decoded<T: serde::de::DeserializeOwned + core::fmt::Debug>(
    kind: &MessageKind,
    data: &Value,
    field: &str,
) {
    let timestamp = data.get("timestamp").and_then(Value::as_str).and_then(parse_timestamp);
    match data.get(field).map(decode_embedded::<T>) {
        Some(Ok(record)) => {
            debug!(message_type = %kind, timestamp = ?timestamp, record = ?record, "decoded");
        }
        Some(Err(e)) => {
            warn!(error = %BridgeError::malformed(kind.as_str(), e), "dropping record");
        }
        None => {
            warn!(error = %BridgeError::malformed(kind.as_str(), format!("missing {field}")), "dropping record");
        }
    }
}
