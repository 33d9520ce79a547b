//! Bridge to the local backend process.
//!
//! A single WebSocket carries requests (req/res, correlated by id) and
//! push events. Stream events are routed to per-session subscribers;
//! events for a session nobody listens to are dropped.

mod client;
mod protocol;

pub use client::{BridgeClient, BridgeError};
pub use protocol::{
    BridgeEventFrame, BridgeRequest, BridgeResponse, DetectParams, ModelParams, SendParams,
    SessionParams, StreamEvent, StreamKind,
};
