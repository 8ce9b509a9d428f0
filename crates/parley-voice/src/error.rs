//! Voice engine error types.

/// Errors returned by [`ConversationHandle`](crate::ConversationHandle).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversationError {
    /// The engine task has exited; the handle can no longer drive it.
    #[error("Conversation engine has stopped")]
    Stopped,
}
