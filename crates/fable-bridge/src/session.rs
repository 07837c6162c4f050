//! One connected simulation, independent of the socket carrying it.
//!
//! [`Session::open`] registers the session as active and starts its inbound
//! worker. The transport feeds every text frame to [`Session::on_text`] and
//! writes whatever arrives on the returned frame queue. Inbound frames are
//! routed by kind:
//!
//! - `ack` frames resolve bridge-initiated requests,
//! - `message` events go to the inbound worker, which applies them to the
//!   store in arrival order (see [`serve_inbound`]),
//! - `echo`, `ack` and `heartbeat` events are answered inline.

use std::sync::Arc;

use fable_reasoning::CompletionBackend;
use fable_types::SessionId;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::connection::Outbound;
use crate::dispatch::MessageRouter;
use crate::frame::{EVENT_ACK, EVENT_ECHO, EVENT_HEARTBEAT, EVENT_MESSAGE, Frame};
use crate::rpc::{Inbound, serve_inbound};
use crate::state::AppState;

/// What [`Session::on_text`] did with a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// An acknowledgment resolved a pending request.
    AckResolved,
    /// An acknowledgment matched no pending request.
    AckUnknown,
    /// A `message` event was queued for the inbound worker.
    Queued,
    /// An `echo` or `ack` event was answered.
    Replied,
    /// A heartbeat was logged.
    Heartbeat,
    /// The frame was malformed or of an unknown kind.
    Dropped,
}

/// The active simulation's side of the protocol.
pub struct Session<B> {
    id: SessionId,
    state: Arc<AppState<B>>,
    outbound: Outbound,
    inbound: mpsc::UnboundedSender<Inbound>,
}

impl<B> Session<B>
where
    B: CompletionBackend + 'static,
{
    /// Register a new session as the active one and start its inbound
    /// worker. Frames for the simulation arrive on the returned receiver.
    pub fn open(state: Arc<AppState<B>>) -> (Self, mpsc::UnboundedReceiver<Frame>) {
        let id = SessionId::new();
        let (outbound, frames) = mpsc::unbounded_channel();
        state.connections.on_connect(id, outbound.clone());

        let (inbound, queue) = mpsc::unbounded_channel();
        tokio::spawn(serve_inbound(
            MessageRouter::new(Arc::clone(&state)),
            queue,
            outbound.clone(),
        ));

        let session = Self {
            id,
            state,
            outbound,
            inbound,
        };
        (session, frames)
    }

    /// This session's id.
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Route one inbound text frame.
    pub fn on_text(&self, text: &str) -> FrameOutcome {
        let frame = match Frame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "dropping malformed frame");
                return FrameOutcome::Dropped;
            }
        };

        match frame {
            Frame::Ack { ack, args } => {
                if self.state.rpc.resolve_ack(ack, args) {
                    FrameOutcome::AckResolved
                } else {
                    FrameOutcome::AckUnknown
                }
            }
            Frame::Event { event, args, id } => match event.as_str() {
                EVENT_MESSAGE => self.enqueue(args, id),
                EVENT_ECHO => {
                    debug!(session_id = %self.id, "echo");
                    self.reply(Frame::event(EVENT_ECHO, args, None))
                }
                EVENT_ACK => {
                    let Some(id) = id else {
                        debug!(session_id = %self.id, "ack event without an id");
                        return FrameOutcome::Dropped;
                    };
                    self.reply(Frame::ack(id, args))
                }
                EVENT_HEARTBEAT => {
                    info!(session_id = %self.id, "heartbeat");
                    FrameOutcome::Heartbeat
                }
                other => {
                    warn!(session_id = %self.id, event = other, "no handler for event");
                    FrameOutcome::Dropped
                }
            },
        }
    }

    /// Unregister the session. Returns whether it was still the active one.
    pub fn close(self) -> bool {
        self.state.connections.on_disconnect(self.id)
    }

    fn enqueue(&self, args: Vec<Value>, ack_id: Option<u64>) -> FrameOutcome {
        let mut args = args.into_iter();
        let message_type = match args.next() {
            Some(Value::String(tag)) => tag,
            other => {
                warn!(session_id = %self.id, first_arg = ?other, "message event without a type");
                return FrameOutcome::Dropped;
            }
        };
        let inbound = Inbound {
            message_type,
            payload: args.next().unwrap_or(Value::Null),
            ack_id,
        };
        if self.inbound.send(inbound).is_err() {
            warn!(session_id = %self.id, "inbound worker gone, message dropped");
            return FrameOutcome::Dropped;
        }
        FrameOutcome::Queued
    }

    fn reply(&self, frame: Frame) -> FrameOutcome {
        if self.outbound.send(frame).is_err() {
            debug!(session_id = %self.id, "session queue closed, reply dropped");
            return FrameOutcome::Dropped;
        }
        FrameOutcome::Replied
    }
}
