//! Domain types shared by the gateway client and the voice engine.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Turn tokens ────────────────────────────────────────────────────

/// Opaque marker for one conversational turn.
///
/// A fresh token is minted every time the conversation starts thinking about
/// a new utterance. Asynchronous results (chat completion, synthesis output,
/// queue drain) carry the token they were started under and are applied only
/// if it still equals the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnToken(u64);

impl TurnToken {
    /// Raw numeric value, for logging.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TurnToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "turn-{}", self.0)
    }
}

/// Monotonic source of [`TurnToken`]s.
#[derive(Debug, Default)]
pub struct TurnCounter {
    last: u64,
}

impl TurnCounter {
    #[must_use]
    pub const fn new() -> Self {
        Self { last: 0 }
    }

    /// Mint the next token. Tokens are never reused within a counter.
    pub const fn mint(&mut self) -> TurnToken {
        self.last += 1;
        TurnToken(self.last)
    }
}

// ── Sentences and audio ────────────────────────────────────────────

/// One complete sentence produced by the segmenter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentence {
    /// 1-based position within the reply.
    pub sequence: u64,
    /// Trimmed, non-empty sentence text.
    pub text: String,
}

impl Sentence {
    pub fn new(sequence: u64, text: impl Into<String>) -> Self {
        Self {
            sequence,
            text: text.into(),
        }
    }
}

/// Synthesized audio for a single sentence, ready for playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSegment {
    /// Turn the segment belongs to.
    pub turn: TurnToken,
    /// The sentence that was spoken.
    pub sentence: Sentence,
    /// Encoded audio bytes as returned by the synthesis backend.
    pub audio: Vec<u8>,
    /// Whether the queue was empty when this segment was delivered.
    pub is_last: bool,
}

// ── Background tasks ───────────────────────────────────────────────

/// Identifier of a background task (`task-<uuid>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Terminal statuses never change again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// A deferred agent invocation tracked by the task runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub message: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Task {
    /// Create a task in the `Pending` state.
    pub fn pending(id: TaskId, message: impl Into<String>) -> Self {
        Self {
            id,
            message: message.into(),
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }

    /// Wall-clock run time in milliseconds, once the task has finished.
    #[must_use]
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Shorten text for log lines without splitting a UTF-8 character.
#[must_use]
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
