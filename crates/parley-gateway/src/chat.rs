//! [`ChatPort`] adapter over the gateway client.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use parley_core::{ChatPort, ChatStreamSink, GatewayError};

use crate::client::GatewayClient;

/// Chat capability bound to one agent session.
///
/// Connects lazily: every call first makes sure the connection is ready,
/// so a failed pre-connect is retried by the next turn.
///
/// The client streams one turn at a time, so calls are taken in arrival
/// order: a background task and a live turn wait for each other instead of
/// superseding one another. All clones share the same queue.
#[derive(Debug, Clone)]
pub struct GatewayChat {
    client: GatewayClient,
    session_key: String,
    turn_gate: Arc<Mutex<()>>,
}

impl GatewayChat {
    pub fn new(client: GatewayClient) -> Self {
        let session_key = client.config().session_key.clone();
        Self {
            client,
            session_key,
            turn_gate: Arc::new(Mutex::new(())),
        }
    }

    pub const fn client(&self) -> &GatewayClient {
        &self.client
    }
}

#[async_trait]
impl ChatPort for GatewayChat {
    async fn chat(
        &self,
        message: &str,
        sink: Option<Box<dyn ChatStreamSink>>,
    ) -> Result<String, GatewayError> {
        let _turn = self.turn_gate.lock().await;
        self.client.connect().await?;
        self.client
            .invoke_chat(&self.session_key, message, sink)
            .await
    }
}
