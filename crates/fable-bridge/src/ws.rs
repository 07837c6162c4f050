//! WebSocket transport for the simulation connection.
//!
//! The simulation connects to `GET /ws`. Each socket opens a fresh
//! [`Session`], replacing any previous one. The loop below only moves
//! frames: queued outbound frames are written to the socket and inbound
//! text is handed to [`Session::on_text`].

use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use fable_reasoning::CompletionBackend;
use tracing::{debug, warn};

use crate::session::Session;
use crate::state::AppState;

/// Upgrade an HTTP request to the simulation WebSocket.
///
/// # Route
///
/// `GET /ws`
pub async fn ws_session<B>(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState<B>>>,
) -> impl IntoResponse
where
    B: CompletionBackend + 'static,
{
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

/// Run one simulation session until the socket closes.
async fn handle_ws<B>(mut socket: WebSocket, state: Arc<AppState<B>>)
where
    B: CompletionBackend + 'static,
{
    let (session, mut queue) = Session::open(state);
    let session_id = session.id();

    loop {
        tokio::select! {
            frame = queue.recv() => {
                let Some(frame) = frame else { break };
                let text = match frame.to_text() {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(session_id = %session_id, error = %e, "failed to serialize frame");
                        continue;
                    }
                };
                if socket.send(WsMessage::Text(text.into())).await.is_err() {
                    debug!(session_id = %session_id, "send failed, closing session");
                    break;
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        session.on_text(text.as_str());
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        if socket.send(WsMessage::Pong(data)).await.is_err() {
                            debug!(session_id = %session_id, "pong failed, closing session");
                            break;
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!(session_id = %session_id, error = %e, "WebSocket error");
                        break;
                    }
                    Some(Ok(_)) => {
                        debug!(session_id = %session_id, "ignoring non-text frame");
                    }
                }
            }
        }
    }

    if !session.close() {
        debug!(session_id = %session_id, "session was already replaced");
    }
}
