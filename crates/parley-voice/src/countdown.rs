//! Cancellable one-shot timers owned by the conversation engine.

use std::time::Duration;

use tokio::task::JoinHandle;

/// A restartable countdown.
///
/// Each start gets a new generation number which is passed to the callback.
/// The owner accepts an expiry only through [`Countdown::fire`], so an expiry
/// that raced with a cancel or restart is recognized as stale.
#[derive(Debug, Default)]
pub struct Countdown {
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl Countdown {
    pub const fn new() -> Self {
        Self {
            generation: 0,
            handle: None,
        }
    }

    /// (Re)start the countdown; any previous run is cancelled.
    pub fn start<F>(&mut self, delay: Duration, on_elapsed: F)
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.cancel();
        self.generation += 1;
        let generation = self.generation;
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_elapsed(generation);
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub const fn is_armed(&self) -> bool {
        self.handle.is_some()
    }

    /// Accept an expiry for `generation`. Returns `false` if it is stale.
    pub fn fire(&mut self, generation: u64) -> bool {
        if self.handle.is_some() && generation == self.generation {
            self.handle = None;
            true
        } else {
            false
        }
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.cancel();
    }
}
