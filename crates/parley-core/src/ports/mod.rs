//! Port definitions (trait abstractions) for external collaborators.
//!
//! Ports define the interfaces the engine expects from infrastructure.
//! They contain no implementation details and use only domain types.

pub mod chat;
pub mod event_emitter;
pub mod speech;

pub use chat::{ChatPort, ChatStreamSink, GatewayError};
pub use event_emitter::{AppEventEmitter, ChannelEmitter, NoopEmitter};
pub use speech::{SpeechCapture, SpeechSynthesizer, SynthesisError, TranscriptionError};
