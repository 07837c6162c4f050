//! The single active simulation connection.
//!
//! At most one simulation is connected at a time. A new connection
//! replaces the previous one outright; a disconnect only clears the slot
//! if it comes from the session that currently holds it, so a late
//! disconnect from a replaced socket cannot evict its successor.

use std::sync::{Mutex, MutexGuard, PoisonError};

use fable_types::SessionId;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::frame::Frame;

/// Sending half of a session's outbound frame queue. The WebSocket task
/// owns the receiving half and writes each frame to the socket.
pub type Outbound = mpsc::UnboundedSender<Frame>;

struct ActiveSession {
    id: SessionId,
    outbound: Outbound,
}

/// Tracks the active simulation session.
#[derive(Default)]
pub struct ConnectionManager {
    active: Mutex<Option<ActiveSession>>,
}

impl ConnectionManager {
    /// Create a manager with no active session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `session_id` the active session, discarding any previous one.
    ///
    /// Returns the replaced session, if there was one.
    pub fn on_connect(&self, session_id: SessionId, outbound: Outbound) -> Option<SessionId> {
        let replaced = self
            .lock()
            .replace(ActiveSession {
                id: session_id,
                outbound,
            })
            .map(|previous| previous.id);

        match replaced {
            Some(previous) => warn!(
                session_id = %session_id,
                replaced_session_id = %previous,
                "simulation connected, replacing previous session"
            ),
            None => info!(session_id = %session_id, "simulation connected"),
        }
        replaced
    }

    /// Clear the active session if it is `session_id`.
    ///
    /// Returns whether the active session was cleared.
    pub fn on_disconnect(&self, session_id: SessionId) -> bool {
        let mut active = self.lock();
        if active.as_ref().is_some_and(|s| s.id == session_id) {
            *active = None;
            info!(session_id = %session_id, "simulation disconnected");
            true
        } else {
            debug!(session_id = %session_id, "ignoring disconnect from inactive session");
            false
        }
    }

    /// The active session, if any.
    pub fn active_session(&self) -> Option<SessionId> {
        self.lock().as_ref().map(|s| s.id)
    }

    /// The active session together with its outbound queue.
    pub fn outbound(&self) -> Option<(SessionId, Outbound)> {
        self.lock()
            .as_ref()
            .map(|s| (s.id, s.outbound.clone()))
    }

    fn lock(&self) -> MutexGuard<'_, Option<ActiveSession>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
