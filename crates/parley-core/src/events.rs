//! Canonical event union for everything the engine tells its presentation
//! collaborator.
//!
//! # Wire Format
//!
//! Events are serialized with a `type` tag:
//!
//! ```json
//! { "type": "audio_chunk", "sentenceId": 2, "audio": "<base64>", "text": "Hi.", "isLast": true }
//! ```

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize, Serializer};

use crate::domain::TaskId;

/// Conversational state, as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationState {
    /// First launch, before the introduction has finished.
    Welcome,
    /// Nothing happening; a tap starts listening.
    Idle,
    /// Capturing the user's utterance.
    Listening,
    /// Utterance sent; waiting for the first sentence of the reply.
    Thinking,
    /// Reply audio is being synthesized and played.
    Speaking,
    /// Reply finished; capture restarted so the user can continue.
    Followup,
    /// Farewell acknowledged; returns to idle after a short delay.
    Goodbye,
}

impl ConversationState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Welcome => "welcome",
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Thinking => "thinking",
            Self::Speaking => "speaking",
            Self::Followup => "followup",
            Self::Goodbye => "goodbye",
        }
    }

    /// States in which speech capture is running.
    #[must_use]
    pub const fn is_capturing(self) -> bool {
        matches!(self, Self::Listening | Self::Followup)
    }
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outward notifications emitted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    /// The conversation moved to a new state.
    StateChanged { state: ConversationState },

    /// The accumulated (or interim) user transcript changed.
    Transcript {
        text: String,
        #[serde(rename = "isFinal")]
        is_final: bool,
    },

    /// The first sentence of a reply is available.
    FirstSentence { text: String },

    /// One synthesized sentence, in playback order.
    AudioChunk {
        #[serde(rename = "sentenceId")]
        sentence_id: u64,
        #[serde(serialize_with = "as_base64")]
        audio: Vec<u8>,
        text: String,
        #[serde(rename = "isLast")]
        is_last: bool,
    },

    /// The complete, cleaned reply of the last turn.
    Response { text: String },

    /// A user-visible status message (degraded service, interruption, ...).
    Notice { message: String },

    /// A background task finished successfully.
    TaskCompleted {
        #[serde(rename = "taskId")]
        task_id: TaskId,
        result: String,
        /// Run time in milliseconds.
        duration: i64,
    },

    /// A background task failed.
    TaskFailed {
        #[serde(rename = "taskId")]
        task_id: TaskId,
        error: String,
    },
}

impl AppEvent {
    pub const fn state_changed(state: ConversationState) -> Self {
        Self::StateChanged { state }
    }

    pub fn notice(message: impl Into<String>) -> Self {
        Self::Notice {
            message: message.into(),
        }
    }
}

fn as_base64<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(bytes))
}
