//! Hand-written collaborators for driving the voice engine.
//!
//! Nothing here touches audio hardware or the network. The chat mock hands
//! each call to the test, which decides what streams back and when the call
//! resolves.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use parley_core::{
    AppEvent, ChatPort, ChatStreamSink, ConversationState, GatewayError, SpeechCapture,
    SpeechSynthesizer, SynthesisError, TranscriptionError,
};
use tokio::sync::{mpsc, oneshot};

// ── Chat ───────────────────────────────────────────────────────────

/// One in-flight `chat` call, owned by the test.
pub struct ChatCall {
    pub message: String,
    sink: Option<Box<dyn ChatStreamSink>>,
    reply: oneshot::Sender<Result<String, GatewayError>>,
}

impl ChatCall {
    pub const fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    /// Push a streamed fragment into the caller's sink.
    pub fn stream(&mut self, fragment: &str) {
        if let Some(sink) = self.sink.as_mut() {
            sink.on_text(fragment);
        }
    }

    /// Complete the stream and resolve the call.
    pub fn finish(mut self, result: Result<String, GatewayError>) {
        if result.is_ok() {
            if let Some(sink) = self.sink.as_mut() {
                sink.on_complete();
            }
        }
        let _ = self.reply.send(result);
    }

    /// Resolve without touching the sink, as when the text came from history.
    pub fn reply(self, result: Result<String, GatewayError>) {
        let _ = self.reply.send(result);
    }
}

pub struct ScriptedChat {
    calls: mpsc::UnboundedSender<ChatCall>,
    abandoned: AtomicUsize,
}

impl ScriptedChat {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ChatCall>) {
        let (calls, rx) = mpsc::unbounded_channel();
        let chat = Arc::new(Self {
            calls,
            abandoned: AtomicUsize::new(0),
        });
        (chat, rx)
    }

    /// Calls dropped by their caller while still waiting for a reply.
    pub fn abandoned(&self) -> usize {
        self.abandoned.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatPort for ScriptedChat {
    async fn chat(
        &self,
        message: &str,
        sink: Option<Box<dyn ChatStreamSink>>,
    ) -> Result<String, GatewayError> {
        let (reply, rx) = oneshot::channel();
        let call = ChatCall {
            message: message.to_string(),
            sink,
            reply,
        };
        if self.calls.send(call).is_err() {
            return Err(GatewayError::NotConnected);
        }
        let mut watch = DropWatch {
            abandoned: &self.abandoned,
            resolved: false,
        };
        let result = rx.await.unwrap_or(Err(GatewayError::Abandoned));
        watch.resolved = true;
        result
    }
}

/// Counts calls whose caller stopped waiting before the reply arrived.
struct DropWatch<'a> {
    abandoned: &'a AtomicUsize,
    resolved: bool,
}

impl Drop for DropWatch<'_> {
    fn drop(&mut self) {
        if !self.resolved {
            self.abandoned.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Wait for the next chat call, failing the test if none arrives.
pub async fn next_call(calls: &mut mpsc::UnboundedReceiver<ChatCall>) -> ChatCall {
    tokio::time::timeout(Duration::from_secs(600), calls.recv())
        .await
        .expect("no chat call arrived")
        .expect("chat mock dropped")
}

// ── Synthesis ──────────────────────────────────────────────────────

/// Synthesizer returning the sentence bytes after a per-sentence delay.
#[derive(Default)]
pub struct MockSynth {
    delays: Mutex<HashMap<String, Duration>>,
    failures: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    voice: Mutex<String>,
}

impl MockSynth {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            voice: Mutex::new("mock_voice".to_string()),
            ..Self::default()
        })
    }

    pub fn delay(&self, text: &str, delay: Duration) {
        self.delays.lock().insert(text.to_string(), delay);
    }

    pub fn fail_on(&self, text: &str) {
        self.failures.lock().insert(text.to_string());
    }

    /// Sentences passed to `synthesize`, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSynth {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SynthesisError> {
        self.calls.lock().push(text.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self.delays.lock().get(text).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failures.lock().contains(text) {
            return Err(SynthesisError::Backend(format!("cannot say {text}")));
        }
        Ok(text.as_bytes().to_vec())
    }

    fn set_voice(&self, voice_id: &str) {
        *self.voice.lock() = voice_id.to_string();
    }

    fn voice(&self) -> String {
        self.voice.lock().clone()
    }
}

// ── Capture ────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockCapture {
    starts: AtomicUsize,
    stops: AtomicUsize,
    refuse: AtomicBool,
    running: AtomicBool,
}

impl MockCapture {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every subsequent `start` fail.
    pub fn refuse_start(&self) {
        self.refuse.store(true, Ordering::SeqCst);
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl SpeechCapture for MockCapture {
    fn start(&self) -> Result<(), TranscriptionError> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(TranscriptionError::StartFailed("microphone unavailable".to_string()));
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
    }
}

// ── Events ─────────────────────────────────────────────────────────

/// Drain all pending events from the event receiver and return them.
pub fn drain_events(rx: &mut mpsc::UnboundedReceiver<AppEvent>) -> Vec<AppEvent> {
    let mut events = Vec::new();
    while let Ok(e) = rx.try_recv() {
        events.push(e);
    }
    events
}

/// Collect only the states from `StateChanged` events.
pub fn states_from(events: &[AppEvent]) -> Vec<ConversationState> {
    events
        .iter()
        .filter_map(|e| match e {
            AppEvent::StateChanged { state } => Some(*state),
            _ => None,
        })
        .collect()
}

/// Wait for an event matching `predicate`, returning it.
pub async fn wait_for_event(
    rx: &mut mpsc::UnboundedReceiver<AppEvent>,
    predicate: impl Fn(&AppEvent) -> bool,
) -> AppEvent {
    tokio::time::timeout(Duration::from_secs(600), async {
        loop {
            let event = rx.recv().await.expect("event channel closed");
            if predicate(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event never arrived")
}
