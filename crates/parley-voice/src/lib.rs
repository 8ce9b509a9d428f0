//! Voice orchestration for parley.
//!
//! Turns a streamed agent reply into ordered speech and drives the
//! listen/think/speak turn cycle:
//!
//! - [`SentenceSegmenter`] cuts streamed text into sentences
//! - [`SynthesisQueue`] synthesizes them strictly in order
//! - [`TaskRunner`] runs deferred requests in the background
//! - [`Conversation`] is the state machine tying it together
#![deny(unused_crate_dependencies)]

pub mod backend;
pub mod commands;
pub mod conversation;
pub mod countdown;
pub mod error;
pub mod segmenter;
pub mod synthesis;
pub mod tasks;
pub mod text_utils;

// Re-export key types for convenience
pub use backend::MiniMaxSynthesizer;
pub use commands::{CommandKind, classify};
pub use conversation::{Conversation, ConversationDeps, ConversationHandle, INTERRUPTED_NOTICE};
pub use countdown::Countdown;
pub use error::ConversationError;
pub use segmenter::{DEFAULT_ENDERS, SentenceSegmenter};
pub use synthesis::{QueueEvent, SynthesisQueue};
pub use tasks::TaskRunner;
pub use text_utils::{clean_markdown, speakable};

#[cfg(test)]
use tokio_test as _;
