//! Bridge between the fable simulation host and its reasoning backend.
//!
//! The simulation connects over a single WebSocket at `GET /ws` and streams
//! persona state; the bridge answers with decisions. This crate holds the
//! protocol core:
//!
//! - [`connection`] -- the one active simulation session
//! - [`rpc`] -- request/response correlation on top of the event stream,
//!   in both directions
//! - [`dispatch`] -- the message router feeding the state store and the
//!   reasoning adapter
//! - [`session`] -- per-connection frame routing and the in-order inbound
//!   worker
//! - [`sync`] -- the loop that reloads personas whenever the store is empty
//! - [`ws`] / [`server`] -- the axum transport and the status endpoint
//!
//! # Wire format
//!
//! Every WebSocket text frame is a JSON [`Frame`]:
//!
//! ```text
//! {"event": "message", "args": ["choose-sequence", "{...}"], "id": 3}
//! {"ack": 3, "args": ["choose-sequence-response", "{...}"]}
//! ```
//!
//! An event carrying an `id` expects exactly one `ack` frame with the same
//! number in return.

pub mod connection;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod handlers;
pub mod rpc;
pub mod server;
pub mod session;
pub mod state;
pub mod sync;
pub mod ws;

pub use connection::ConnectionManager;
pub use dispatch::MessageRouter;
pub use error::BridgeError;
pub use frame::Frame;
pub use rpc::{Inbound, MessageHandler, RpcLayer};
pub use server::{build_router, start_server};
pub use session::{FrameOutcome, Session};
pub use state::AppState;
pub use sync::SyncLoop;
