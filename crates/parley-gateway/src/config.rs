//! Gateway client configuration.

use std::time::Duration;

use parley_core::{ChatTimeoutPolicy, GatewaySettings};

use crate::protocol::{AuthParams, ClientDescriptor, ConnectParams};

/// Everything the client needs to connect and time its calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub url: String,
    pub connect: ConnectParams,
    pub session_key: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub chat_timeout: Duration,
    pub timeout_policy: ChatTimeoutPolicy,
}

impl GatewayConfig {
    pub fn from_settings(settings: &GatewaySettings) -> Self {
        Self {
            url: settings.url(),
            connect: ConnectParams {
                min_protocol: settings.min_protocol,
                max_protocol: settings.max_protocol,
                client: ClientDescriptor {
                    id: settings.client_id.clone(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    platform: settings.platform.clone(),
                    mode: settings.mode.clone(),
                },
                role: settings.role.clone(),
                scopes: settings.scopes.clone(),
                auth: AuthParams {
                    token: settings.token.clone(),
                },
            },
            session_key: settings.session_key.clone(),
            connect_timeout: settings.connect_timeout(),
            request_timeout: settings.request_timeout(),
            chat_timeout: settings.chat_timeout(),
            timeout_policy: settings.timeout_policy,
        }
    }

    /// Same connection, different identity. Used when probing which
    /// role/mode combinations a gateway accepts.
    #[must_use]
    pub fn with_identity(mut self, role: &str, client_id: &str, mode: &str, scopes: &[&str]) -> Self {
        self.connect.role = role.to_string();
        self.connect.client.id = client_id.to_string();
        self.connect.client.mode = mode.to_string();
        self.connect.scopes = scopes.iter().map(|s| (*s).to_string()).collect();
        self
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::from_settings(&GatewaySettings::default())
    }
}
