//! Core domain types and port definitions for parley.
//!
//! Everything in this crate is transport-agnostic: the gateway client, the
//! voice orchestration engine and the CLI all speak in terms of these types.
#![deny(unused_crate_dependencies)]

pub mod domain;
pub mod events;
pub mod ports;
pub mod settings;

// Re-export commonly used types for convenience
pub use domain::{
    AudioSegment, Sentence, Task, TaskId, TaskStatus, TurnCounter, TurnToken, truncate_for_log,
};
pub use events::{AppEvent, ConversationState};
pub use ports::{
    AppEventEmitter, ChannelEmitter, ChatPort, ChatStreamSink, GatewayError, NoopEmitter,
    SpeechCapture, SpeechSynthesizer, SynthesisError, TranscriptionError,
};
pub use settings::{
    ChatTimeoutPolicy, ConversationSettings, DEFAULT_GATEWAY_PORT, GatewaySettings, Settings,
    SettingsError, SynthesisSettings, validate_settings,
};
