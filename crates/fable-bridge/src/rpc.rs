//! Request/response correlation on top of the event stream.
//!
//! Two directions share the same socket:
//!
//! - **Bridge-initiated** ([`RpcLayer::request_reply`]): a `message-ack`
//!   event with a fresh `id` goes out, and the future resolves when the
//!   simulation sends back the matching `ack` frame.
//! - **Simulation-initiated** ([`serve_inbound`], [`handle_incoming`]): a
//!   `message` event is decoded and dispatched through a [`MessageHandler`].
//!   If the handler produces a reply and the sender attached an `id`, the
//!   reply goes back as the acknowledgment; otherwise nothing is sent.
//!
//! Inbound messages are accepted strictly in arrival order: each one's
//! effect on shared state lands before the next is read. Only the
//! completion step (reasoning calls) overlaps.
//!
//! Bridge-initiated requests have no timeout. An acknowledgment that never
//! arrives leaves the caller waiting, and a disconnect does not cancel the
//! request.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use fable_types::{Message, decode_payload};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::connection::{ConnectionManager, Outbound};
use crate::error::BridgeError;
use crate::frame::{EVENT_MESSAGE_ACK, Frame};

/// Something that handles decoded inbound [`Message`]s in two steps.
///
/// [`accept`](Self::accept) applies the message to shared state and runs in
/// arrival order. [`complete`](Self::complete) does the slow part and may
/// overlap with later messages.
pub trait MessageHandler: Send + Sync {
    /// Work carried from `accept` to `complete`.
    type Pending: Send + 'static;

    /// Apply `message` to shared state.
    fn accept(&self, message: Message) -> impl Future<Output = Self::Pending> + Send;

    /// Finish the work. `Some` is sent back when the sender asked for an
    /// acknowledgment.
    fn complete(&self, pending: Self::Pending) -> impl Future<Output = Option<Message>> + Send;

    /// Both steps back to back.
    fn handle(&self, message: Message) -> impl Future<Output = Option<Message>> + Send {
        async move {
            let pending = self.accept(message).await;
            self.complete(pending).await
        }
    }
}

/// One inbound `message` event waiting to be handled.
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    /// The message type tag (first event argument).
    pub message_type: String,
    /// The raw payload (second event argument).
    pub payload: Value,
    /// Acknowledgment id, when the sender wants a reply.
    pub ack_id: Option<u64>,
}

/// Correlates outbound requests with their acknowledgments.
pub struct RpcLayer {
    connections: Arc<ConnectionManager>,
    pending: Mutex<BTreeMap<u64, oneshot::Sender<Message>>>,
    next_id: AtomicU64,
}

impl RpcLayer {
    /// Create a correlation layer sending through `connections`.
    pub fn new(connections: Arc<ConnectionManager>) -> Self {
        Self {
            connections,
            pending: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Send `(message_type, data)` to the simulation and wait for its
    /// acknowledgment.
    ///
    /// With no active session this resolves immediately with an `error`
    /// message and sends nothing.
    pub async fn request_reply(&self, message_type: &str, data: &Value) -> Message {
        let Some((session_id, outbound)) = self.connections.outbound() else {
            debug!(message_type, "request not sent, no active session");
            return Message::error(&BridgeError::NoActiveSession.to_string());
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.lock_pending().insert(id, tx);

        let frame = Frame::event(
            EVENT_MESSAGE_ACK,
            Frame::envelope_args(message_type, data),
            Some(id),
        );
        if outbound.send(frame).is_err() {
            self.lock_pending().remove(&id);
            warn!(session_id = %session_id, message_type, "session closed before request was sent");
            return Message::error("session closed");
        }
        debug!(session_id = %session_id, request_id = id, message_type, "request sent");

        rx.await
            .unwrap_or_else(|_| Message::error("request abandoned"))
    }

    /// Resolve the request `id` with the acknowledgment `args`
    /// (`[response_type, response_data_string]`).
    ///
    /// Returns `false` if no request with that `id` is pending.
    pub fn resolve_ack(&self, id: u64, args: Vec<Value>) -> bool {
        let Some(waiter) = self.lock_pending().remove(&id) else {
            warn!(request_id = id, "acknowledgment for unknown request");
            return false;
        };

        let mut args = args.into_iter();
        let response_type = match args.next() {
            Some(Value::String(tag)) => tag,
            Some(other) => other.to_string(),
            None => "error".to_owned(),
        };
        let data = match args.next() {
            Some(Value::String(raw)) => decode_payload(&raw),
            Some(other) => other,
            None => Value::Null,
        };

        debug!(request_id = id, response_type = %response_type, "request acknowledged");
        if waiter.send(Message::new(response_type, data)).is_err() {
            debug!(request_id = id, "requester went away before acknowledgment");
        }
        true
    }

    /// Number of requests still waiting for an acknowledgment.
    pub fn pending_requests(&self) -> usize {
        self.lock_pending().len()
    }

    fn lock_pending(&self) -> MutexGuard<'_, BTreeMap<u64, oneshot::Sender<Message>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle one session's inbound messages until the queue closes.
///
/// Each message is accepted before the next one is read. Completion runs
/// in its own task and replies go out as they finish, so acknowledgments
/// may leave in a different order than requests arrived.
pub async fn serve_inbound<H>(
    handler: H,
    mut queue: mpsc::UnboundedReceiver<Inbound>,
    reply_to: Outbound,
) where
    H: MessageHandler + Clone + 'static,
{
    while let Some(Inbound {
        message_type,
        payload,
        ack_id,
    }) = queue.recv().await
    {
        let pending = handler
            .accept(decode_incoming(&message_type, payload))
            .await;
        let handler = handler.clone();
        let reply_to = reply_to.clone();
        tokio::spawn(async move {
            let reply = handler.complete(pending).await;
            send_reply(reply, &message_type, ack_id, &reply_to);
        });
    }
    debug!("inbound queue closed");
}

/// Decode an inbound `message` event, dispatch it, and acknowledge it with
/// the handler's reply when the sender asked for one.
///
/// Returns whether an acknowledgment was sent.
pub async fn handle_incoming<H: MessageHandler>(
    handler: &H,
    message_type: &str,
    payload: Value,
    ack_id: Option<u64>,
    reply_to: &Outbound,
) -> bool {
    let reply = handler
        .handle(decode_incoming(message_type, payload))
        .await;
    send_reply(reply, message_type, ack_id, reply_to)
}

/// A string payload is parsed as JSON, falling back to the raw string; any
/// other JSON value is used as-is.
fn decode_incoming(message_type: &str, payload: Value) -> Message {
    let data = match payload {
        Value::String(raw) => decode_payload(&raw),
        other => other,
    };
    Message::new(message_type, data)
}

fn send_reply(
    reply: Option<Message>,
    message_type: &str,
    ack_id: Option<u64>,
    reply_to: &Outbound,
) -> bool {
    match (reply, ack_id) {
        (Some(reply), Some(id)) => {
            let frame = Frame::ack(id, Frame::envelope_args(&reply.message_type, &reply.data));
            let sent = reply_to.send(frame).is_ok();
            if sent {
                debug!(request_id = id, reply_type = %reply.message_type, "reply sent");
            } else {
                warn!(request_id = id, "session closed before reply could be sent");
            }
            sent
        }
        (Some(reply), None) => {
            debug!(reply_type = %reply.message_type, "sender did not ask for a reply, dropping it");
            false
        }
        (None, Some(id)) => {
            debug!(request_id = id, message_type, "no reply produced, acknowledgment withheld");
            false
        }
        (None, None) => false,
    }
}
