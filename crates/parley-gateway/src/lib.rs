//! Client for the agent gateway.
//!
//! The gateway speaks a small JSON protocol over a WebSocket: correlated
//! `req`/`res` pairs plus server-pushed `event` frames. This crate handles the
//! authentication handshake, request correlation with per-request deadlines,
//! and streaming of chat replies into a [`parley_core::ChatStreamSink`].
#![deny(unused_crate_dependencies)]

pub mod chat;
pub mod client;
pub mod config;
pub mod correlation;
pub mod protocol;
pub mod transport;

pub use chat::GatewayChat;
pub use client::{ConnectionState, GatewayClient};
pub use config::GatewayConfig;
pub use correlation::{CorrelationTable, PendingRequest};
pub use transport::{Connector, TransportChannel, TransportEvent, WebSocketConnector};

#[cfg(test)]
use tokio_test as _;
#[cfg(test)]
use parley_voice as _;
