//! Chat capability port and the gateway error taxonomy.
//!
//! The conversation engine and the background task runner both talk to the
//! remote agent through [`ChatPort`]. The gateway crate provides the real
//! implementation; tests substitute scripted ones.

use async_trait::async_trait;
use thiserror::Error;

/// Failures of the gateway connection or of a single call over it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The socket could not be opened or the handshake did not finish in time.
    #[error("Gateway connection failed: {0}")]
    Connection(String),

    /// The server declined the `connect` handshake.
    #[error("Gateway authentication failed: {0}")]
    Auth(String),

    /// No reply arrived within the request window.
    #[error("Gateway request timed out")]
    RequestTimeout,

    /// The server answered with `ok: false`.
    #[error("Gateway rejected the request: {0}")]
    RequestRejected(String),

    /// The socket closed or errored while the call was outstanding.
    #[error("Gateway connection lost")]
    ConnectionLost,

    /// The stream subscription was dropped before the reply completed.
    #[error("Chat turn abandoned")]
    Abandoned,

    /// A call was attempted without a ready connection.
    #[error("Gateway not connected")]
    NotConnected,

    /// An outbound frame could not be built.
    #[error("Gateway protocol error: {0}")]
    Protocol(String),
}

impl GatewayError {
    /// Errors caused by the connection itself rather than by one request.
    #[must_use]
    pub const fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Auth(_) | Self::ConnectionLost | Self::NotConnected
        )
    }
}

/// Receiver for incremental reply text while a chat turn is streaming.
///
/// The sentence segmenter is the canonical implementation.
pub trait ChatStreamSink: Send {
    /// A new fragment of reply text arrived.
    fn on_text(&mut self, fragment: &str);

    /// The stream ended (normally or by soft-success timeout); flush buffers.
    fn on_complete(&mut self);
}

/// The remote conversational agent, seen as a single capability.
#[async_trait]
pub trait ChatPort: Send + Sync {
    /// Send `message` and wait for the complete reply.
    ///
    /// When `sink` is given, streamed text is forwarded to it as it arrives.
    /// Calls from different callers are independent: one never fails or
    /// truncates another. Dropping the returned future abandons this call
    /// only; the remote agent is not told and may keep working.
    async fn chat(
        &self,
        message: &str,
        sink: Option<Box<dyn ChatStreamSink>>,
    ) -> Result<String, GatewayError>;
}
