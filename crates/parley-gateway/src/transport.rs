//! Socket transport behind the gateway client.
//!
//! The client never touches the WebSocket directly: a [`Connector`] opens a
//! connection and hands back a pair of channels. Two pump tasks bridge those
//! channels to the socket, so tests can swap in scripted transports.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

use parley_core::GatewayError;

/// Something that happened on the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Text(String),
    Closed,
    Error(String),
}

/// Both directions of an open connection.
///
/// Dropping `outgoing` closes the socket.
#[derive(Debug)]
pub struct TransportChannel {
    pub outgoing: mpsc::UnboundedSender<String>,
    pub incoming: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Opens connections to the gateway.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, url: &str) -> Result<TransportChannel, GatewayError>;
}

/// [`Connector`] backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn open(&self, url: &str) -> Result<TransportChannel, GatewayError> {
        let (ws_stream, _response) = connect_async(url)
            .await
            .map_err(|e| GatewayError::Connection(e.to_string()))?;
        tracing::debug!(url, "WebSocket connected");

        let (mut ws_sink, mut ws_source) = ws_stream.split();
        let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<String>();
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();

        // Writer: runs until the client drops its sender.
        tokio::spawn(async move {
            while let Some(text) = outgoing_rx.recv().await {
                if let Err(e) = ws_sink.send(Message::Text(text.into())).await {
                    tracing::warn!(error = %e, "WebSocket send failed");
                    break;
                }
            }
            let _ = ws_sink.send(Message::Close(None)).await;
        });

        // Reader: forwards text frames until the socket closes or errors.
        tokio::spawn(async move {
            while let Some(message) = ws_source.next().await {
                let event = match message {
                    Ok(Message::Text(text)) => TransportEvent::Text(text.to_string()),
                    Ok(Message::Close(frame)) => {
                        tracing::debug!(?frame, "WebSocket close frame received");
                        let _ = incoming_tx.send(TransportEvent::Closed);
                        return;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        let _ = incoming_tx.send(TransportEvent::Error(e.to_string()));
                        return;
                    }
                };
                if incoming_tx.send(event).is_err() {
                    return;
                }
            }
            let _ = incoming_tx.send(TransportEvent::Closed);
        });

        Ok(TransportChannel {
            outgoing: outgoing_tx,
            incoming: incoming_rx,
        })
    }
}
