//! Command handlers.
//!
//! Handlers follow one pattern:
//! - Signature: `pub async fn execute(ctx: &CliContext, ...) -> Result<()>`
//! - Thin wrappers that:
//!   1. Parse CLI-specific input
//!   2. Drive the gateway client or the voice engine
//!   3. Format output for the terminal

pub mod ask;
pub mod talk;
pub mod task;
pub mod verify;
