//! HTTP endpoint handlers.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/status` | Session, store and pending-request counters |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use fable_reasoning::CompletionBackend;

use crate::state::AppState;

/// Report the bridge's current state.
///
/// ```json
/// {"active_session": "0190...", "personas": 12, "ticks": 340, "pending_requests": 0}
/// ```
///
/// `active_session` is `null` while no simulation is connected.
pub async fn status<B>(State(state): State<Arc<AppState<B>>>) -> impl IntoResponse
where
    B: CompletionBackend + 'static,
{
    let (personas, ticks) = {
        let store = state.store.read().await;
        (store.persona_count(), store.tick_count())
    };

    Json(serde_json::json!({
        "active_session": state.connections.active_session(),
        "personas": personas,
        "ticks": ticks,
        "pending_requests": state.rpc.pending_requests(),
    }))
}
