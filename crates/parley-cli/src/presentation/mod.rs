//! Terminal rendering of engine events and audio output.
//!
//! Format-only: nothing here drives the engine.

pub mod audio;
pub mod events;

pub use audio::AudioWriter;
pub use events::{format_event, format_task};
