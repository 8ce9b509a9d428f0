//! Event emitter trait for broadcasting [`AppEvent`]s to the presentation layer.
//!
//! Implementations handle transport details (channels, terminal output, IPC).

use tokio::sync::mpsc;

use crate::events::AppEvent;

/// Trait for emitting application events.
///
/// This abstraction keeps event plumbing consistent across components and
/// prevents channel types from becoming part of the public API surface.
///
/// # Implementations
///
/// - [`NoopEmitter`] - For tests and contexts that don't need events
/// - [`ChannelEmitter`] - Forwards into an unbounded tokio channel
pub trait AppEventEmitter: Send + Sync {
    /// Emit an application event.
    ///
    /// This method must not block.
    fn emit(&self, event: AppEvent);
}

/// A no-op event emitter.
#[derive(Debug, Clone, Default)]
pub struct NoopEmitter;

impl NoopEmitter {
    pub const fn new() -> Self {
        Self
    }
}

impl AppEventEmitter for NoopEmitter {
    fn emit(&self, _event: AppEvent) {}
}

/// Emitter backed by an unbounded channel.
///
/// Best-effort: if the receiver has been dropped the event is logged and
/// discarded.
#[derive(Debug, Clone)]
pub struct ChannelEmitter {
    tx: mpsc::UnboundedSender<AppEvent>,
}

impl ChannelEmitter {
    /// Create an emitter and the receiver that observes its events.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl AppEventEmitter for ChannelEmitter {
    fn emit(&self, event: AppEvent) {
        if self.tx.send(event).is_err() {
            tracing::warn!("App event receiver dropped");
        }
    }
}
