//! Ordered speech-synthesis queue.
//!
//! Sentences are synthesized one at a time in enqueue order. A single worker
//! task drains the queue; the next sentence is dispatched only after the
//! previous result has been consumed, so delivery order always equals enqueue
//! order. [`SynthesisQueue::stop`] empties the queue and invalidates the
//! worker: a synthesis call already in flight is never delivered.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use parley_core::{AudioSegment, Sentence, SpeechSynthesizer, TurnToken, truncate_for_log};

use crate::text_utils::speakable;

/// Output of the queue, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    /// One sentence is ready for playback.
    Audio(AudioSegment),
    /// The worker found the queue empty and went idle.
    Drained { turn: TurnToken },
}

#[derive(Debug, Default)]
struct QueueState {
    session: Option<TurnToken>,
    /// Bumped by `start_session` and `stop`; a worker exits once it is stale.
    epoch: u64,
    items: VecDeque<Sentence>,
    next_sequence: u64,
    draining: bool,
}

impl QueueState {
    const fn is_active(&self) -> bool {
        self.session.is_some()
    }
}

struct QueueInner {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    events: mpsc::UnboundedSender<QueueEvent>,
    state: Mutex<QueueState>,
}

/// FIFO queue in front of a [`SpeechSynthesizer`].
#[derive(Clone)]
pub struct SynthesisQueue {
    inner: Arc<QueueInner>,
}

impl SynthesisQueue {
    /// Create a queue delivering into `events`.
    ///
    /// The queue starts stopped; call [`start_session`](Self::start_session)
    /// before enqueuing.
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        events: mpsc::UnboundedSender<QueueEvent>,
    ) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                synthesizer,
                events,
                state: Mutex::new(QueueState::default()),
            }),
        }
    }

    /// Clear the queue and accept sentences for `turn`.
    pub fn start_session(&self, turn: TurnToken) {
        let mut state = self.inner.state.lock();
        state.items.clear();
        state.next_sequence = 0;
        state.draining = false;
        state.epoch += 1;
        state.session = Some(turn);
        tracing::debug!(%turn, "Synthesis session started");
    }

    /// Append a sentence for `turn`. Returns `false` if the queue is stopped
    /// or serving a different turn.
    pub fn enqueue(&self, turn: TurnToken, text: &str) -> bool {
        let text = speakable(text);
        if text.is_empty() {
            return false;
        }

        let mut state = self.inner.state.lock();
        if state.session != Some(turn) {
            tracing::debug!(%turn, "Ignoring sentence for inactive synthesis session");
            return false;
        }

        state.next_sequence += 1;
        let sentence = Sentence::new(state.next_sequence, text);
        tracing::debug!(
            sequence = sentence.sequence,
            text = %truncate_for_log(&sentence.text, 30),
            "Enqueued sentence"
        );
        state.items.push_back(sentence);

        if !state.draining {
            state.draining = true;
            let epoch = state.epoch;
            drop(state);
            tokio::spawn(Arc::clone(&self.inner).drain(turn, epoch));
        }
        true
    }

    /// Empty the queue and refuse further sentences until the next session.
    pub fn stop(&self) {
        let mut state = self.inner.state.lock();
        let discarded = state.items.len();
        state.items.clear();
        state.session = None;
        state.draining = false;
        state.epoch += 1;
        tracing::debug!(discarded, "Synthesis queue stopped");
    }

    /// No sentence waiting and no synthesis in flight.
    pub fn is_idle(&self) -> bool {
        let state = self.inner.state.lock();
        state.items.is_empty() && !state.draining
    }

    pub fn is_active(&self) -> bool {
        self.inner.state.lock().is_active()
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Change the synthesis voice for subsequent sentences.
    pub fn set_voice(&self, voice_id: &str) {
        tracing::info!(from = %self.inner.synthesizer.voice(), to = voice_id, "Voice switched");
        self.inner.synthesizer.set_voice(voice_id);
    }

    pub fn voice(&self) -> String {
        self.inner.synthesizer.voice()
    }
}

impl QueueInner {
    async fn drain(self: Arc<Self>, turn: TurnToken, epoch: u64) {
        loop {
            let sentence = {
                let mut state = self.state.lock();
                if state.epoch != epoch {
                    return;
                }
                let next = state.items.pop_front();
                match next {
                    Some(sentence) => sentence,
                    None => {
                        state.draining = false;
                        drop(state);
                        let _ = self.events.send(QueueEvent::Drained { turn });
                        return;
                    }
                }
            };

            let result = self.synthesizer.synthesize(&sentence.text).await;

            let is_last = {
                let state = self.state.lock();
                if state.epoch != epoch {
                    tracing::debug!(sequence = sentence.sequence, "Discarding audio for stopped session");
                    return;
                }
                state.items.is_empty()
            };

            match result {
                Ok(audio) => {
                    tracing::debug!(
                        sequence = sentence.sequence,
                        bytes = audio.len(),
                        is_last,
                        "Sentence synthesized"
                    );
                    let segment = AudioSegment {
                        turn,
                        sentence,
                        audio,
                        is_last,
                    };
                    if self.events.send(QueueEvent::Audio(segment)).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        sequence = sentence.sequence,
                        error = %e,
                        "Sentence synthesis failed, skipping"
                    );
                }
            }
        }
    }
}
