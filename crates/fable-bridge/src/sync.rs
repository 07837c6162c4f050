//! Persona synchronization loop.
//!
//! Whenever a simulation is connected and the store holds no personas, the
//! loop asks the simulation for all of them (`request-personas` with an
//! empty guid list) and loads the response. Otherwise it idles.

use std::sync::Arc;
use std::time::Duration;

use fable_types::{Message, MessageKind, Persona, decode_embedded};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::BridgeError;
use crate::state::AppState;

/// What one [`SyncLoop::step`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// No simulation connected.
    Disconnected,
    /// A reload was attempted; carries the number of personas loaded.
    Reloaded(usize),
    /// Personas already loaded, nothing to do.
    Idle,
}

/// Periodically re-bootstraps persona state.
pub struct SyncLoop<B> {
    state: Arc<AppState<B>>,
}

impl<B> SyncLoop<B> {
    /// Create a loop over the shared state.
    pub const fn new(state: Arc<AppState<B>>) -> Self {
        Self { state }
    }

    /// Run forever.
    pub async fn run(self) {
        info!("persona sync loop started");
        loop {
            let outcome = self.step().await;
            tokio::time::sleep(self.delay_after(outcome)).await;
        }
    }

    /// Perform one iteration without sleeping.
    pub async fn step(&self) -> SyncOutcome {
        if self.state.connections.active_session().is_none() {
            return SyncOutcome::Disconnected;
        }
        if !self.state.store.read().await.is_empty() {
            return SyncOutcome::Idle;
        }

        debug!("persona store empty, requesting personas");
        let reply = self
            .state
            .rpc
            .request_reply(
                MessageKind::RequestPersonas.as_str(),
                &serde_json::json!({ "guids": [] }),
            )
            .await;

        let personas = personas_from_reply(&reply);
        let loaded = self.state.store.write().await.upsert_personas(personas);
        if loaded > 0 {
            info!(personas = loaded, "personas loaded");
        }
        SyncOutcome::Reloaded(loaded)
    }

    /// How long to wait before the next iteration.
    pub fn delay_after(&self, outcome: SyncOutcome) -> Duration {
        let sync = &self.state.config.sync;
        match outcome {
            SyncOutcome::Disconnected | SyncOutcome::Reloaded(_) => sync.reconnect_backoff(),
            SyncOutcome::Idle => sync.interval(),
        }
    }
}

/// Extract personas from a `request-personas-response`. Any other reply,
/// and any entry that does not decode, is logged and skipped.
fn personas_from_reply(reply: &Message) -> Vec<Persona> {
    if reply.kind() != MessageKind::RequestPersonasResponse {
        warn!(
            reply_type = %reply.message_type,
            data = %reply.data,
            "expected request-personas-response"
        );
        return Vec::new();
    }

    let Some(entries) = reply.data.get("personas").and_then(Value::as_array) else {
        warn!(
            error = %BridgeError::malformed(&reply.message_type, "missing personas list"),
            "ignoring reply"
        );
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| match decode_embedded::<Persona>(entry) {
            Ok(persona) => Some(persona),
            Err(e) => {
                warn!(error = %BridgeError::malformed(&reply.message_type, e), "skipping persona");
                None
            }
        })
        .collect()
}
