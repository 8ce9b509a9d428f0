//! Conversation state machine: the top-level turn-taking coordinator.
//!
//! ```text
//!   Welcome → Idle ⇄ Listening → Thinking → Speaking → Followup → Idle
//!                        ▲            │          │          │
//!                        │            └──────────┴→ Goodbye → Idle
//!                        └─────────── (tap while Speaking) ──┘
//! ```
//!
//! The engine runs as a single task that owns all session state. Every input
//! (user taps, transcripts, chat completions, queue output, timer expiries)
//! arrives as a message on one channel and is handled to completion before the
//! next, so no state is shared with the asynchronous work it starts. Results
//! of that work carry the [`TurnToken`] they were started under and are
//! dropped if the turn has since been replaced or interrupted. The one
//! exception is a reply interrupted while it was being spoken: it is still
//! collected, silently, so it can be read back later.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use parley_core::{
    AppEvent, AppEventEmitter, ChatPort, ConversationSettings, ConversationState, GatewayError,
    Sentence, SpeechCapture, SpeechSynthesizer, TranscriptionError, TurnCounter, TurnToken,
    truncate_for_log,
};

use crate::commands::{CommandKind, classify};
use crate::countdown::Countdown;
use crate::error::ConversationError;
use crate::segmenter::SentenceSegmenter;
use crate::synthesis::{QueueEvent, SynthesisQueue};
use crate::tasks::TaskRunner;
use crate::text_utils::clean_markdown;

/// Notice shown when a reply is abandoned while the agent is still thinking.
pub const INTERRUPTED_NOTICE: &str = "Interrupted.";

/// External collaborators of the engine.
pub struct ConversationDeps {
    pub chat: Arc<dyn ChatPort>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub capture: Arc<dyn SpeechCapture>,
    pub emitter: Arc<dyn AppEventEmitter>,
}

enum Input {
    Tap,
    Transcript { text: String, is_final: bool },
    UtteranceEnd,
    TranscriptionFailed(TranscriptionError),
    WelcomeFinished,
    Sentence { turn: TurnToken, sentence: Sentence },
    ChatFinished {
        turn: TurnToken,
        result: Result<String, GatewayError>,
    },
    PauseElapsed(u64),
    FollowupElapsed(u64),
    GoodbyeElapsed(u64),
    Shutdown,
}

/// Handle for driving a running conversation engine.
///
/// Cheap to clone. Inputs are queued and handled in order.
#[derive(Clone)]
pub struct ConversationHandle {
    inputs: mpsc::UnboundedSender<Input>,
    state: watch::Receiver<ConversationState>,
    last_response: Arc<Mutex<Option<String>>>,
    tasks: TaskRunner,
    queue: SynthesisQueue,
}

impl ConversationHandle {
    /// The user tapped: start listening, stop listening, or barge in,
    /// depending on the current state.
    pub fn tap(&self) -> Result<(), ConversationError> {
        self.send(Input::Tap)
    }

    /// A transcription result from the speech recognizer.
    pub fn transcript(&self, text: &str, is_final: bool) -> Result<(), ConversationError> {
        self.send(Input::Transcript {
            text: text.to_string(),
            is_final,
        })
    }

    /// The recognizer detected the end of the utterance.
    pub fn utterance_end(&self) -> Result<(), ConversationError> {
        self.send(Input::UtteranceEnd)
    }

    pub fn transcription_failed(&self, error: TranscriptionError) -> Result<(), ConversationError> {
        self.send(Input::TranscriptionFailed(error))
    }

    /// The welcome introduction has finished playing.
    pub fn welcome_finished(&self) -> Result<(), ConversationError> {
        self.send(Input::WelcomeFinished)
    }

    pub fn state(&self) -> ConversationState {
        *self.state.borrow()
    }

    /// Watch state changes.
    pub fn subscribe(&self) -> watch::Receiver<ConversationState> {
        self.state.clone()
    }

    /// Most recent completed reply, kept across interruptions.
    pub fn last_response(&self) -> Option<String> {
        self.last_response.lock().clone()
    }

    pub const fn tasks(&self) -> &TaskRunner {
        &self.tasks
    }

    pub fn set_voice(&self, voice_id: &str) {
        self.queue.set_voice(voice_id);
    }

    pub fn voice(&self) -> String {
        self.queue.voice()
    }

    /// Stop the engine. Pending inputs before this one are still handled.
    pub fn shutdown(&self) -> Result<(), ConversationError> {
        self.send(Input::Shutdown)
    }

    fn send(&self, input: Input) -> Result<(), ConversationError> {
        self.inputs
            .send(input)
            .map_err(|_| ConversationError::Stopped)
    }
}

/// The turn-taking engine.
pub struct Conversation {
    settings: ConversationSettings,
    chat: Arc<dyn ChatPort>,
    capture: Arc<dyn SpeechCapture>,
    emitter: Arc<dyn AppEventEmitter>,
    queue: SynthesisQueue,
    tasks: TaskRunner,
    inputs: mpsc::UnboundedSender<Input>,
    state_tx: watch::Sender<ConversationState>,
    state: ConversationState,

    turns: TurnCounter,
    current_turn: Option<TurnToken>,
    /// Chat call of the current turn; aborting it abandons that call only.
    live_chat: Option<JoinHandle<()>>,
    /// Turn interrupted while speaking whose reply is still arriving.
    detached_turn: Option<TurnToken>,
    transcript: String,
    farewell_turn: bool,
    reply_complete: bool,
    spoke_this_turn: bool,
    acknowledgements_used: usize,
    last_response: Arc<Mutex<Option<String>>>,

    pause: Countdown,
    followup: Countdown,
    goodbye: Countdown,
}

impl Conversation {
    /// Start the engine in the `Welcome` state.
    pub fn spawn(
        settings: ConversationSettings,
        deps: ConversationDeps,
    ) -> (ConversationHandle, JoinHandle<()>) {
        let (inputs, input_rx) = mpsc::unbounded_channel();
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConversationState::Welcome);

        let queue = SynthesisQueue::new(deps.synthesizer, queue_tx);
        let tasks = TaskRunner::new(Arc::clone(&deps.chat), Arc::clone(&deps.emitter));
        let last_response = Arc::new(Mutex::new(None));

        let handle = ConversationHandle {
            inputs: inputs.clone(),
            state: state_rx,
            last_response: Arc::clone(&last_response),
            tasks: tasks.clone(),
            queue: queue.clone(),
        };

        let engine = Self {
            settings,
            chat: deps.chat,
            capture: deps.capture,
            emitter: deps.emitter,
            queue,
            tasks,
            inputs,
            state_tx,
            state: ConversationState::Welcome,
            turns: TurnCounter::new(),
            current_turn: None,
            live_chat: None,
            detached_turn: None,
            transcript: String::new(),
            farewell_turn: false,
            reply_complete: false,
            spoke_this_turn: false,
            acknowledgements_used: 0,
            last_response,
            pause: Countdown::new(),
            followup: Countdown::new(),
            goodbye: Countdown::new(),
        };

        let task = tokio::spawn(engine.run(input_rx, queue_rx));
        (handle, task)
    }

    async fn run(
        mut self,
        mut inputs: mpsc::UnboundedReceiver<Input>,
        mut queue_events: mpsc::UnboundedReceiver<QueueEvent>,
    ) {
        tracing::info!("Conversation engine started");
        self.emit(AppEvent::state_changed(self.state));

        loop {
            tokio::select! {
                input = inputs.recv() => match input {
                    Some(Input::Shutdown) | None => break,
                    Some(input) => self.handle(input),
                },
                Some(event) = queue_events.recv() => self.handle_queue_event(event),
            }
        }

        self.queue.stop();
        if let Some(chat) = self.live_chat.take() {
            chat.abort();
        }
        if self.state.is_capturing() {
            self.capture.stop();
        }
        tracing::info!("Conversation engine stopped");
    }

    fn handle(&mut self, input: Input) {
        match input {
            Input::Tap => self.on_tap(),
            Input::Transcript { text, is_final } => self.on_transcript(&text, is_final),
            Input::UtteranceEnd => {
                if self.state == ConversationState::Listening && !self.transcript.is_empty() {
                    tracing::debug!("Utterance end detected, sending now");
                    self.send_utterance();
                }
            }
            Input::TranscriptionFailed(error) => self.on_transcription_failed(&error),
            Input::WelcomeFinished => {
                if self.state == ConversationState::Welcome {
                    self.set_state(ConversationState::Idle);
                }
            }
            Input::Sentence { turn, sentence } => self.on_sentence(turn, &sentence),
            Input::ChatFinished { turn, result } => self.on_chat_finished(turn, result),
            Input::PauseElapsed(generation) => {
                if self.pause.fire(generation)
                    && self.state == ConversationState::Listening
                    && !self.transcript.is_empty()
                {
                    tracing::debug!("Pause elapsed, sending utterance");
                    self.send_utterance();
                }
            }
            Input::FollowupElapsed(generation) => {
                if self.followup.fire(generation) && self.state == ConversationState::Followup {
                    tracing::info!("Follow-up timed out, returning to idle");
                    self.capture.stop();
                    self.set_state(ConversationState::Idle);
                }
            }
            Input::GoodbyeElapsed(generation) => {
                if self.goodbye.fire(generation) && self.state == ConversationState::Goodbye {
                    self.queue.stop();
                    self.current_turn = None;
                    self.set_state(ConversationState::Idle);
                }
            }
            // Handled by the run loop.
            Input::Shutdown => {}
        }
    }

    // ── User input ─────────────────────────────────────────────────

    fn on_tap(&mut self) {
        match self.state {
            ConversationState::Welcome | ConversationState::Idle | ConversationState::Goodbye => {
                self.start_listening();
            }
            ConversationState::Listening | ConversationState::Followup => {
                tracing::info!("Listening cancelled by tap");
                self.pause.cancel();
                self.followup.cancel();
                self.transcript.clear();
                self.capture.stop();
                self.set_state(ConversationState::Idle);
            }
            ConversationState::Thinking => {
                tracing::info!(turn = ?self.current_turn, "Barge-in while thinking");
                self.abandon_turn();
                self.emit(AppEvent::notice(INTERRUPTED_NOTICE));
                self.set_state(ConversationState::Idle);
            }
            ConversationState::Speaking => {
                tracing::info!(turn = ?self.current_turn, "Barge-in while speaking");
                self.detach_turn();
                self.start_listening();
            }
        }
    }

    fn on_transcript(&mut self, text: &str, is_final: bool) {
        if !self.state.is_capturing() {
            tracing::debug!(state = %self.state, "Ignoring transcript outside capture");
            return;
        }
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        if !is_final {
            self.emit(AppEvent::Transcript {
                text: text.to_string(),
                is_final: false,
            });
            // Still speaking: hold off sending.
            if self.pause.is_armed() {
                self.start_pause();
            }
            return;
        }

        if !self.transcript.is_empty() {
            self.transcript.push(' ');
        }
        self.transcript.push_str(text);
        tracing::debug!(transcript = %truncate_for_log(&self.transcript, 60), "Transcript grew");
        self.emit(AppEvent::Transcript {
            text: self.transcript.clone(),
            is_final: true,
        });

        if self.state == ConversationState::Followup {
            self.followup.cancel();
            self.set_state(ConversationState::Listening);
        }
        self.start_pause();
    }

    fn on_transcription_failed(&mut self, error: &TranscriptionError) {
        tracing::error!(%error, state = %self.state, "Transcription failed");
        if !self.state.is_capturing() {
            return;
        }
        self.pause.cancel();
        self.followup.cancel();
        self.transcript.clear();
        self.capture.stop();
        self.emit(AppEvent::notice(error.to_string()));
        self.set_state(ConversationState::Idle);
    }

    fn start_listening(&mut self) {
        self.goodbye.cancel();
        self.followup.cancel();
        self.pause.cancel();
        self.queue.stop();
        self.current_turn = None;
        self.transcript.clear();

        if let Err(error) = self.capture.start() {
            tracing::error!(%error, "Failed to start speech capture");
            self.emit(AppEvent::notice(error.to_string()));
            self.set_state(ConversationState::Idle);
            return;
        }
        self.set_state(ConversationState::Listening);
    }

    // ── Turns ──────────────────────────────────────────────────────

    fn send_utterance(&mut self) {
        let command = std::mem::take(&mut self.transcript);
        self.pause.cancel();
        self.capture.stop();

        let turn = self.turns.mint();
        self.current_turn = Some(turn);
        self.reply_complete = false;
        self.spoke_this_turn = false;
        self.queue.start_session(turn);

        let kind = classify(&command, &self.settings);
        tracing::info!(%turn, ?kind, command = %truncate_for_log(&command, 60), "Utterance complete");

        if kind == CommandKind::Deferred {
            let task_id = self.tasks.create_task(&command);
            let acknowledgement = self.next_acknowledgement();
            tracing::info!(%task_id, "Deferred to background task");
            self.emit(AppEvent::Response {
                text: acknowledgement.clone(),
            });
            self.queue.enqueue(turn, &acknowledgement);
            self.set_state(ConversationState::Idle);
            return;
        }

        self.farewell_turn = kind == CommandKind::Farewell;
        self.set_state(ConversationState::Thinking);

        let inputs = self.inputs.clone();
        let segmenter = SentenceSegmenter::new(move |sentence| {
            let _ = inputs.send(Input::Sentence { turn, sentence });
        });
        let chat = Arc::clone(&self.chat);
        let inputs = self.inputs.clone();
        self.live_chat = Some(tokio::spawn(async move {
            let result = chat.chat(&command, Some(Box::new(segmenter))).await;
            let _ = inputs.send(Input::ChatFinished { turn, result });
        }));
    }

    fn on_sentence(&mut self, turn: TurnToken, sentence: &Sentence) {
        if self.current_turn != Some(turn) {
            tracing::debug!(%turn, "Dropping sentence from stale turn");
            return;
        }
        if self.state == ConversationState::Thinking {
            self.emit(AppEvent::FirstSentence {
                text: clean_markdown(&sentence.text),
            });
            self.set_state(ConversationState::Speaking);
        }
        if matches!(
            self.state,
            ConversationState::Speaking | ConversationState::Goodbye
        ) && self.queue.enqueue(turn, &sentence.text)
        {
            self.spoke_this_turn = true;
        }
    }

    fn on_chat_finished(&mut self, turn: TurnToken, result: Result<String, GatewayError>) {
        if self.detached_turn == Some(turn) {
            self.detached_turn = None;
            self.keep_interrupted_reply(turn, result);
            return;
        }
        if self.current_turn != Some(turn) {
            tracing::debug!(%turn, "Dropping result of stale turn");
            return;
        }
        self.live_chat = None;

        let reply = match result {
            Ok(reply) => reply,
            Err(error) => {
                tracing::error!(%turn, %error, "Chat turn failed");
                self.abandon_turn();
                self.emit(AppEvent::notice(self.settings.unavailable_message.clone()));
                self.set_state(ConversationState::Idle);
                return;
            }
        };

        let cleaned = clean_markdown(&reply);
        *self.last_response.lock() = Some(cleaned.clone());
        self.emit(AppEvent::Response {
            text: cleaned.clone(),
        });
        self.reply_complete = true;

        // Nothing was segmented: speak the reply whole.
        if !self.spoke_this_turn && !cleaned.trim().is_empty() {
            if self.state == ConversationState::Thinking {
                self.emit(AppEvent::FirstSentence {
                    text: cleaned.clone(),
                });
                self.set_state(ConversationState::Speaking);
            }
            self.spoke_this_turn = self.queue.enqueue(turn, &cleaned);
        }

        if self.farewell_turn {
            self.enter_goodbye();
        } else if self.state == ConversationState::Thinking {
            self.current_turn = None;
            self.set_state(ConversationState::Idle);
        } else {
            self.maybe_finish_speaking();
        }
    }

    fn handle_queue_event(&mut self, event: QueueEvent) {
        match event {
            QueueEvent::Audio(segment) => {
                if self.current_turn != Some(segment.turn) {
                    return;
                }
                self.emit(AppEvent::AudioChunk {
                    sentence_id: segment.sentence.sequence,
                    audio: segment.audio,
                    text: segment.sentence.text,
                    is_last: segment.is_last,
                });
            }
            QueueEvent::Drained { turn } => {
                if self.current_turn == Some(turn) {
                    self.maybe_finish_speaking();
                }
            }
        }
    }

    /// Record the reply of a turn interrupted while speaking. Nothing is spoken.
    fn keep_interrupted_reply(&self, turn: TurnToken, result: Result<String, GatewayError>) {
        match result {
            Ok(reply) => {
                let cleaned = clean_markdown(&reply);
                if cleaned.trim().is_empty() {
                    return;
                }
                tracing::debug!(%turn, chars = cleaned.len(), "Kept reply of interrupted turn");
                *self.last_response.lock() = Some(cleaned.clone());
                self.emit(AppEvent::Response { text: cleaned });
            }
            Err(error) => {
                tracing::debug!(%turn, %error, "Interrupted turn ended without a reply");
            }
        }
    }

    /// Speaking → Followup once the reply is complete and fully synthesized.
    fn maybe_finish_speaking(&mut self) {
        if self.state != ConversationState::Speaking
            || !self.reply_complete
            || !self.queue.is_idle()
        {
            return;
        }

        self.current_turn = None;
        self.transcript.clear();
        if let Err(error) = self.capture.start() {
            tracing::error!(%error, "Failed to restart speech capture");
            self.emit(AppEvent::notice(error.to_string()));
            self.set_state(ConversationState::Idle);
            return;
        }
        self.set_state(ConversationState::Followup);

        let inputs = self.inputs.clone();
        self.followup
            .start(self.settings.followup_timeout(), move |generation| {
                let _ = inputs.send(Input::FollowupElapsed(generation));
            });
    }

    fn enter_goodbye(&mut self) {
        self.set_state(ConversationState::Goodbye);
        let inputs = self.inputs.clone();
        self.goodbye
            .start(self.settings.goodbye_delay(), move |generation| {
                let _ = inputs.send(Input::GoodbyeElapsed(generation));
            });
    }

    /// Drop the current turn: stop synthesis and stop waiting for the reply.
    fn abandon_turn(&mut self) {
        self.queue.stop();
        if let Some(chat) = self.live_chat.take() {
            chat.abort();
        }
        self.current_turn = None;
    }

    /// Silence the current turn but let its reply arrive, so it can still be
    /// read back after the interruption.
    fn detach_turn(&mut self) {
        self.queue.stop();
        if !self.reply_complete {
            self.detached_turn = self.current_turn;
        }
        // Dropping the handle leaves the call running.
        self.live_chat = None;
        self.current_turn = None;
    }

    fn start_pause(&mut self) {
        let inputs = self.inputs.clone();
        self.pause.start(self.settings.pause(), move |generation| {
            let _ = inputs.send(Input::PauseElapsed(generation));
        });
    }

    fn next_acknowledgement(&mut self) -> String {
        let phrases = &self.settings.acknowledgements;
        if phrases.is_empty() {
            return String::new();
        }
        let phrase = phrases[self.acknowledgements_used % phrases.len()].clone();
        self.acknowledgements_used += 1;
        phrase
    }

    // ── Output ─────────────────────────────────────────────────────

    fn set_state(&mut self, new_state: ConversationState) {
        if self.state != new_state {
            tracing::debug!(old = %self.state, new = %new_state, "Conversation state transition");
            self.state = new_state;
            self.state_tx.send_replace(new_state);
            self.emit(AppEvent::state_changed(new_state));
        }
    }

    fn emit(&self, event: AppEvent) {
        self.emitter.emit(event);
    }
}
