//! Settings domain types and validation.
//!
//! Pure data: loading from the environment or the command line happens in the
//! binary. Every struct deserializes with defaults so partial configuration
//! files work.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default port of the agent gateway.
pub const DEFAULT_GATEWAY_PORT: u16 = 18789;

/// Application settings structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub gateway: GatewaySettings,
    pub synthesis: SynthesisSettings,
    pub conversation: ConversationSettings,
}

// ── Gateway ────────────────────────────────────────────────────────

/// What a chat call does when its overall window elapses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatTimeoutPolicy {
    /// Resolve with the partial text if any was accumulated ("soft success").
    #[default]
    ReturnPartial,
    /// Always fail with a timeout.
    Fail,
}

/// Connection and protocol settings for the agent gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GatewaySettings {
    pub host: String,
    pub port: u16,
    /// Bearer credential sent in the `connect` handshake.
    pub token: String,
    pub client_id: String,
    pub platform: String,
    pub mode: String,
    pub role: String,
    pub scopes: Vec<String>,
    pub min_protocol: u32,
    pub max_protocol: u32,
    /// Agent session every chat turn is addressed to.
    pub session_key: String,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub chat_timeout_ms: u64,
    pub timeout_policy: ChatTimeoutPolicy,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_GATEWAY_PORT,
            token: String::new(),
            client_id: "gateway-client".to_string(),
            platform: std::env::consts::OS.to_string(),
            mode: "backend".to_string(),
            role: "operator".to_string(),
            scopes: vec!["operator.read".to_string(), "operator.write".to_string()],
            min_protocol: 3,
            max_protocol: 3,
            session_key: "agent:main:main".to_string(),
            connect_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
            chat_timeout_ms: 180_000,
            timeout_policy: ChatTimeoutPolicy::ReturnPartial,
        }
    }
}

impl GatewaySettings {
    /// WebSocket URL of the gateway.
    #[must_use]
    pub fn url(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }

    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    #[must_use]
    pub const fn chat_timeout(&self) -> Duration {
        Duration::from_millis(self.chat_timeout_ms)
    }
}

// ── Synthesis ──────────────────────────────────────────────────────

/// Settings for the HTTP speech-synthesis backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SynthesisSettings {
    pub endpoint: String,
    pub api_key: String,
    pub group_id: String,
    pub model: String,
    pub voice: String,
    pub speed: f32,
    pub sample_rate: u32,
    pub language_boost: String,
    /// Payloads smaller than this are treated as failures.
    pub min_audio_bytes: usize,
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.minimax.io/v1/t2a_v2".to_string(),
            api_key: String::new(),
            group_id: String::new(),
            model: "speech-02-turbo".to_string(),
            voice: "Lovely_Girl".to_string(),
            speed: 1.0,
            sample_rate: 32_000,
            language_boost: "auto".to_string(),
            min_audio_bytes: 100,
        }
    }
}

impl SynthesisSettings {
    /// Whether credentials are present.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.group_id.is_empty()
    }
}

// ── Conversation ───────────────────────────────────────────────────

/// Timers and vocabularies for the turn-taking state machine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConversationSettings {
    /// Silence after the last finalized fragment before the utterance is sent.
    pub pause_ms: u64,
    /// How long follow-up listening lasts without new speech.
    pub followup_timeout_ms: u64,
    /// How long the goodbye state is shown before returning to idle.
    pub goodbye_delay_ms: u64,
    pub farewell_phrases: Vec<String>,
    /// Phrases that turn an utterance into a background task.
    pub deferred_phrases: Vec<String>,
    /// Spoken when a background task is accepted (picked round-robin).
    pub acknowledgements: Vec<String>,
    /// Shown when the agent cannot be reached.
    pub unavailable_message: String,
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self {
            pause_ms: 3_000,
            followup_timeout_ms: 30_000,
            goodbye_delay_ms: 3_000,
            farewell_phrases: ["goodbye", "bye", "exit", "close", "see you"]
                .map(String::from)
                .to_vec(),
            deferred_phrases: [
                "later",
                "wait a while",
                "tell me later",
                "tell me when finished",
                "tell me when ready",
                "tell me when done",
            ]
            .map(String::from)
            .to_vec(),
            acknowledgements: [
                "Okay, I am on it. I will tell you later.",
                "Got it! I will check right away and let you know when it is done.",
                "Understood. I will tell you the result later.",
            ]
            .map(String::from)
            .to_vec(),
            unavailable_message:
                "The agent is temporarily unavailable. Please make sure the gateway is running."
                    .to_string(),
        }
    }
}

impl ConversationSettings {
    #[must_use]
    pub const fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }

    #[must_use]
    pub const fn followup_timeout(&self) -> Duration {
        Duration::from_millis(self.followup_timeout_ms)
    }

    #[must_use]
    pub const fn goodbye_delay(&self) -> Duration {
        Duration::from_millis(self.goodbye_delay_ms)
    }
}

// ── Validation ─────────────────────────────────────────────────────

/// Settings validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("Gateway host cannot be empty")]
    EmptyHost,

    #[error("Gateway port cannot be 0")]
    InvalidPort,

    #[error("Protocol range is inverted: min {min} > max {max}")]
    InvertedProtocolRange { min: u32, max: u32 },

    #[error("Timeout '{0}' must be greater than zero")]
    ZeroTimeout(&'static str),
}

/// Validate settings before they are used to build the engine.
pub fn validate_settings(settings: &Settings) -> Result<(), SettingsError> {
    let gateway = &settings.gateway;
    if gateway.host.trim().is_empty() {
        return Err(SettingsError::EmptyHost);
    }
    if gateway.port == 0 {
        return Err(SettingsError::InvalidPort);
    }
    if gateway.min_protocol > gateway.max_protocol {
        return Err(SettingsError::InvertedProtocolRange {
            min: gateway.min_protocol,
            max: gateway.max_protocol,
        });
    }

    let timeouts = [
        ("connect_timeout_ms", gateway.connect_timeout_ms),
        ("request_timeout_ms", gateway.request_timeout_ms),
        ("chat_timeout_ms", gateway.chat_timeout_ms),
        ("pause_ms", settings.conversation.pause_ms),
        ("followup_timeout_ms", settings.conversation.followup_timeout_ms),
        ("goodbye_delay_ms", settings.conversation.goodbye_delay_ms),
    ];
    if let Some((name, _)) = timeouts.iter().find(|(_, value)| *value == 0) {
        return Err(SettingsError::ZeroTimeout(name));
    }

    Ok(())
}
