//! Classification of a finalized utterance.

use parley_core::ConversationSettings;

/// How the engine handles an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Regular turn: send to the agent and speak the reply.
    Chat,
    /// Regular turn that ends the conversation once the reply arrives.
    Farewell,
    /// Handed to the background task runner; acknowledged immediately.
    Deferred,
}

/// Case-insensitive phrase matching; deferred phrases win over farewells.
pub fn classify(command: &str, settings: &ConversationSettings) -> CommandKind {
    let lowered = command.to_lowercase();
    let contains_any =
        |phrases: &[String]| phrases.iter().any(|p| lowered.contains(&p.to_lowercase()));

    if contains_any(&settings.deferred_phrases) {
        CommandKind::Deferred
    } else if contains_any(&settings.farewell_phrases) {
        CommandKind::Farewell
    } else {
        CommandKind::Chat
    }
}
