//! Router construction and server lifecycle.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use fable_reasoning::CompletionBackend;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::BridgeError;
use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the bridge router:
///
/// - `GET /ws` -- simulation WebSocket
/// - `GET /api/status` -- status counters
pub fn build_router<B>(state: Arc<AppState<B>>) -> Router
where
    B: CompletionBackend + 'static,
{
    Router::new()
        .route("/ws", get(ws::ws_session::<B>))
        .route("/api/status", get(handlers::status::<B>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind to `server.host:server.port` and serve until Ctrl-C.
///
/// # Errors
///
/// Returns [`BridgeError::Server`] if the listener cannot bind or the
/// server fails while serving.
pub async fn start_server<B>(state: Arc<AppState<B>>) -> Result<(), BridgeError>
where
    B: CompletionBackend + 'static,
{
    let addr = state.config.server.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| BridgeError::Server(format!("bind failed on {addr}: {e}")))?;

    info!(%addr, "bridge listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| BridgeError::Server(format!("serve error: {e}")))
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}
