//! WebSocket layer: the update stream multiplexer.
//!
//! The endpoint at `/guiapi/ws` carries subscription frames from the
//! client and JSON-encoded updates from the active stream producer.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod sink;

pub use messages::SubscriptionMessage;
pub use sink::{Delivery, OUTBOUND_CAPACITY, UpdateSink};

/// Sub-protocol token the client must negotiate.
pub const SUBPROTOCOL: &str = "guiapi";

/// Path of the WebSocket endpoint.
pub const STREAM_PATH: &str = "/guiapi/ws";
