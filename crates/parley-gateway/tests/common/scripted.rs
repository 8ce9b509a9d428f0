//! Scripted transport: the test plays the gateway server.
//!
//! Each call to [`Connector::open`] hands out the next prepared channel pair;
//! the test keeps the matching [`ServerEnd`] to read what the client sent
//! and push frames back.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use parley_core::GatewayError;
use parley_gateway::{
    Connector, GatewayClient, GatewayConfig, TransportChannel, TransportEvent,
};
use serde_json::{Value, json};
use tokio::sync::mpsc;

pub struct ScriptedConnector {
    sessions: Mutex<VecDeque<TransportChannel>>,
    opened: Mutex<usize>,
}

impl ScriptedConnector {
    /// Connector that accepts `count` connections, then refuses.
    pub fn with_sessions(count: usize) -> (Arc<Self>, Vec<ServerEnd>) {
        let mut sessions = VecDeque::new();
        let mut servers = Vec::new();
        for _ in 0..count {
            let (outgoing, sent) = mpsc::unbounded_channel();
            let (inbound, incoming) = mpsc::unbounded_channel();
            sessions.push_back(TransportChannel { outgoing, incoming });
            servers.push(ServerEnd { sent, inbound });
        }
        let connector = Arc::new(Self {
            sessions: Mutex::new(sessions),
            opened: Mutex::new(0),
        });
        (connector, servers)
    }

    #[allow(dead_code)]
    pub fn opened(&self) -> usize {
        *self.opened.lock()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn open(&self, _url: &str) -> Result<TransportChannel, GatewayError> {
        let next = self.sessions.lock().pop_front();
        match next {
            Some(channel) => {
                *self.opened.lock() += 1;
                Ok(channel)
            }
            None => Err(GatewayError::Connection("connection refused".to_string())),
        }
    }
}

/// The server's side of one scripted connection.
pub struct ServerEnd {
    sent: mpsc::UnboundedReceiver<String>,
    inbound: mpsc::UnboundedSender<TransportEvent>,
}

#[allow(dead_code)]
impl ServerEnd {
    pub fn push(&self, frame: &Value) {
        let _ = self.inbound.send(TransportEvent::Text(frame.to_string()));
    }

    pub fn push_raw(&self, text: &str) {
        let _ = self.inbound.send(TransportEvent::Text(text.to_string()));
    }

    pub fn challenge(&self) {
        self.push(&json!({"type": "event", "event": "connect.challenge", "payload": {"nonce": "n"}}));
    }

    pub fn respond(&self, id: &str, payload: &Value) {
        self.push(&json!({"type": "res", "id": id, "ok": true, "payload": payload}));
    }

    pub fn reject(&self, id: &str, message: &str) {
        self.push(&json!({"type": "res", "id": id, "ok": false, "error": {"message": message}}));
    }

    pub fn chat(&self, payload: &Value) {
        self.push(&json!({"type": "event", "event": "chat", "payload": payload}));
    }

    pub fn close(&self) {
        let _ = self.inbound.send(TransportEvent::Closed);
    }

    /// Next frame the client wrote, parsed.
    pub async fn next_frame(&mut self) -> Value {
        let text = tokio::time::timeout(Duration::from_secs(5), self.sent.recv())
            .await
            .expect("client sent nothing")
            .expect("client dropped the socket");
        serde_json::from_str(&text).expect("client sent invalid JSON")
    }

    /// A frame the client already wrote, without waiting.
    pub fn try_next_frame(&mut self) -> Option<Value> {
        self.sent
            .try_recv()
            .ok()
            .map(|text| serde_json::from_str(&text).expect("client sent invalid JSON"))
    }
}

/// Test configuration with short, distinct windows.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.connect.auth.token = "test-token".to_string();
    config
}

/// Client connected and authenticated against the first scripted session.
pub async fn ready_client(config: GatewayConfig) -> (GatewayClient, ServerEnd) {
    let (connector, mut servers) = ScriptedConnector::with_sessions(1);
    let mut server = servers.remove(0);
    let client = GatewayClient::new(config, connector);

    let connecting = {
        let client = client.clone();
        tokio::spawn(async move { client.connect().await })
    };
    server.challenge();
    let connect = server.next_frame().await;
    assert_eq!(connect["method"], "connect");
    server.respond("connect-1", &json!({}));
    connecting.await.unwrap().unwrap();

    (client, server)
}
