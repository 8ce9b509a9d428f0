//! Speech capture stand-in for the terminal.
//!
//! Typed lines play the role of recognized speech, so "capturing" is only a
//! flag the prompt reflects.

use std::sync::atomic::{AtomicBool, Ordering};

use parley_core::{SpeechCapture, TranscriptionError};

#[derive(Debug, Default)]
pub struct ConsoleCapture {
    running: AtomicBool,
}

impl ConsoleCapture {
    pub const fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl SpeechCapture for ConsoleCapture {
    fn start(&self) -> Result<(), TranscriptionError> {
        self.running.store(true, Ordering::SeqCst);
        tracing::debug!("Console capture started");
        Ok(())
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        tracing::debug!("Console capture stopped");
    }
}
