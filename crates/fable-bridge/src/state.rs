//! Shared application state for the bridge.
//!
//! [`AppState`] is built once in `main` and handed, behind an [`Arc`], to
//! the WebSocket sessions, the message router, the synchronization loop and
//! the status endpoint.

use std::sync::Arc;

use fable_core::{BridgeConfig, ObservationMemory, StateStore};
use fable_reasoning::Reasoning;
use tokio::sync::RwLock;

use crate::connection::ConnectionManager;
use crate::rpc::RpcLayer;

/// Shared state for the bridge, generic over the reasoning backend.
pub struct AppState<B> {
    /// Bridge configuration.
    pub config: BridgeConfig,
    /// Persona records and tick history.
    pub store: Arc<RwLock<StateStore>>,
    /// Observation sets last shown to each observer.
    pub memory: Arc<RwLock<ObservationMemory>>,
    /// The active simulation session.
    pub connections: Arc<ConnectionManager>,
    /// Request/response correlation over the active session.
    pub rpc: Arc<RpcLayer>,
    /// Prompting and LLM access.
    pub reasoning: Arc<Reasoning<B>>,
}

impl<B> AppState<B> {
    /// Create state with an empty store and no connected simulation.
    pub fn new(config: BridgeConfig, reasoning: Reasoning<B>) -> Self {
        let connections = Arc::new(ConnectionManager::new());
        Self {
            config,
            store: Arc::new(RwLock::new(StateStore::new())),
            memory: Arc::new(RwLock::new(ObservationMemory::new())),
            rpc: Arc::new(RpcLayer::new(Arc::clone(&connections))),
            connections,
            reasoning: Arc::new(reasoning),
        }
    }
}
