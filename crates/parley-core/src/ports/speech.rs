//! Speech capability ports — synthesis and capture.
//!
//! Neither backend is implemented in the core: synthesis is an opaque
//! text-to-bytes capability and capture is a start/stop switch whose
//! transcription results are fed back into the conversation engine.

use async_trait::async_trait;
use thiserror::Error;

/// Failure to synthesize one sentence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SynthesisError {
    /// The backend is missing credentials or configuration.
    #[error("Speech synthesis not configured: {0}")]
    NotConfigured(String),

    /// The backend returned an error or an unusable payload.
    #[error("Speech synthesis failed: {0}")]
    Backend(String),
}

/// Failure of the speech-recognition collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranscriptionError {
    /// Capture could not be started (device, permission, connection).
    #[error("Failed to start speech capture: {0}")]
    StartFailed(String),

    /// The recognizer reported an error mid-stream.
    #[error("Transcription failed: {0}")]
    Backend(String),
}

/// Backend-agnostic text-to-speech engine.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize one sentence into encoded audio bytes.
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SynthesisError>;

    /// Change the active voice.
    fn set_voice(&self, voice_id: &str);

    /// Current voice identifier.
    fn voice(&self) -> String;
}

/// Switch for the live speech-recognition stream.
///
/// Transcripts produced while capture runs are delivered to the
/// conversation engine by whoever owns the recognizer.
pub trait SpeechCapture: Send + Sync {
    fn start(&self) -> Result<(), TranscriptionError>;

    fn stop(&self);
}
