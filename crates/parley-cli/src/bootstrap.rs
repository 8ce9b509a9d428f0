//! CLI bootstrap - the composition root.
//!
//! This module is the ONLY place where infrastructure is wired together
//! for the CLI adapter:
//! - Gateway client over WebSocket (via parley-gateway)
//! - Chat port adapter over that client
//! - HTTP speech synthesizer (via parley-voice)
//!
//! Handlers receive the composed context and never build clients themselves.

use std::sync::Arc;

use parley_core::Settings;
use parley_gateway::{GatewayChat, GatewayClient, GatewayConfig};
use parley_voice::MiniMaxSynthesizer;

/// Fully composed application context for CLI commands.
pub struct CliContext {
    pub settings: Settings,
    /// Shared gateway connection.
    pub client: GatewayClient,
    /// Chat capability used by conversations and tasks.
    pub chat: Arc<GatewayChat>,
    pub synthesizer: Arc<MiniMaxSynthesizer>,
}

impl CliContext {
    /// Best-effort early connect. A failure is only logged: the first chat
    /// turn connects again on demand.
    pub async fn preconnect(&self) {
        match self.client.connect().await {
            Ok(()) => tracing::info!(url = %self.client.config().url, "Connected to gateway"),
            Err(error) => tracing::warn!(%error, "Gateway not reachable yet, will retry on first turn"),
        }
    }
}

/// Build the context from validated settings. Nothing connects yet.
pub fn bootstrap(settings: Settings) -> CliContext {
    let client = GatewayClient::websocket(GatewayConfig::from_settings(&settings.gateway));
    let chat = Arc::new(GatewayChat::new(client.clone()));
    let synthesizer = Arc::new(MiniMaxSynthesizer::new(settings.synthesis.clone()));

    if !settings.synthesis.is_configured() {
        tracing::warn!("Speech synthesis credentials missing, replies will not be voiced");
    }

    CliContext {
        settings,
        client,
        chat,
        synthesizer,
    }
}
