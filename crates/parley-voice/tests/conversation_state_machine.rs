//! Integration tests for the conversation state machine.
//!
//! The engine is driven through its transitions with scripted chat, synthesis
//! and capture collaborators. Time is paused, so the pause, follow-up and
//! goodbye countdowns elapse instantly once everything else is idle.
//!
//! # What is tested
//!
//! - Welcome, listening and the full listen/think/speak/follow-up cycle
//! - Pause detection and utterance-end handling
//! - Barge-in while speaking (the reply is still kept) and while thinking
//! - Stale turn results are dropped
//! - Farewell, deferred and failed turns
//! - Transcription and capture failures

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::mocks::{
    ChatCall, MockCapture, MockSynth, ScriptedChat, drain_events, next_call, states_from,
    wait_for_event,
};
use parley_core::{
    AppEvent, ChannelEmitter, ConversationSettings, ConversationState, GatewayError, TaskStatus,
    TranscriptionError,
};
use parley_voice::{
    Conversation, ConversationDeps, ConversationError, ConversationHandle, INTERRUPTED_NOTICE,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_test::assert_ok;

use ConversationState::{Followup, Goodbye, Idle, Listening, Speaking, Thinking, Welcome};

// ── Harness ────────────────────────────────────────────────────────

struct Harness {
    handle: ConversationHandle,
    engine: JoinHandle<()>,
    chat: Arc<ScriptedChat>,
    calls: mpsc::UnboundedReceiver<ChatCall>,
    synth: Arc<MockSynth>,
    capture: Arc<MockCapture>,
    events: mpsc::UnboundedReceiver<AppEvent>,
}

fn harness() -> Harness {
    let (chat, calls) = ScriptedChat::new();
    let synth = MockSynth::new();
    let capture = MockCapture::new();
    let (emitter, events) = ChannelEmitter::new();

    let (handle, engine) = Conversation::spawn(
        ConversationSettings::default(),
        ConversationDeps {
            chat: chat.clone(),
            synthesizer: synth.clone(),
            capture: capture.clone(),
            emitter: Arc::new(emitter),
        },
    );

    Harness {
        handle,
        engine,
        chat,
        calls,
        synth,
        capture,
        events,
    }
}

impl Harness {
    async fn wait_state(&self, state: ConversationState) {
        let mut rx = self.handle.subscribe();
        tokio::time::timeout(Duration::from_secs(600), rx.wait_for(|s| *s == state))
            .await
            .unwrap_or_else(|_| panic!("never reached {state}"))
            .expect("engine stopped");
    }

    /// Tap, say `text` and wait for the resulting chat call.
    async fn say(&mut self, text: &str) -> ChatCall {
        assert_ok!(self.handle.tap());
        self.wait_state(Listening).await;
        assert_ok!(self.handle.transcript(text, true));
        next_call(&mut self.calls).await
    }

    async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn audio_chunks(events: &[AppEvent]) -> Vec<(u64, String, bool)> {
    events
        .iter()
        .filter_map(|e| match e {
            AppEvent::AudioChunk {
                sentence_id,
                text,
                is_last,
                ..
            } => Some((*sentence_id, text.clone(), *is_last)),
            _ => None,
        })
        .collect()
}

fn responses(events: &[AppEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            AppEvent::Response { text } => Some(text.clone()),
            _ => None,
        })
        .collect()
}

// ── Welcome and listening ──────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn starts_in_welcome_and_settles_idle() {
    let mut h = harness();
    assert_eq!(h.handle.state(), Welcome);

    assert_ok!(h.handle.welcome_finished());
    h.wait_state(Idle).await;

    assert_eq!(states_from(&drain_events(&mut h.events)), vec![Welcome, Idle]);
    assert_eq!(h.capture.starts(), 0);
}

#[tokio::test(start_paused = true)]
async fn tap_while_listening_returns_to_idle_without_sending() {
    let mut h = harness();
    assert_ok!(h.handle.tap());
    h.wait_state(Listening).await;
    assert!(h.capture.is_running());

    assert_ok!(h.handle.transcript("never mind", true));
    assert_ok!(h.handle.tap());
    h.wait_state(Idle).await;
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert!(h.calls.try_recv().is_err());
    assert!(!h.capture.is_running());
    assert_eq!(h.handle.state(), Idle);
}

#[tokio::test(start_paused = true)]
async fn each_final_transcript_restarts_the_pause() {
    let mut h = harness();
    assert_ok!(h.handle.tap());
    h.wait_state(Listening).await;

    assert_ok!(h.handle.transcript("first part", true));
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_ok!(h.handle.transcript("second part", true));
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert!(h.calls.try_recv().is_err(), "pause restarted by the second final");
    assert_eq!(h.handle.state(), Listening);

    let call = next_call(&mut h.calls).await;
    assert_eq!(call.message, "first part second part");
    assert_eq!(h.handle.state(), Thinking);
    assert!(!h.capture.is_running(), "capture stops once the utterance is sent");

    let transcripts: Vec<_> = drain_events(&mut h.events)
        .into_iter()
        .filter_map(|e| match e {
            AppEvent::Transcript { text, is_final } => Some((text, is_final)),
            _ => None,
        })
        .collect();
    assert_eq!(
        transcripts,
        vec![
            ("first part".to_string(), true),
            ("first part second part".to_string(), true),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn interim_transcripts_are_shown_but_not_sent() {
    let mut h = harness();
    assert_ok!(h.handle.tap());
    h.wait_state(Listening).await;

    assert_ok!(h.handle.transcript("hel", false));
    assert_ok!(h.handle.utterance_end());
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert!(h.calls.try_recv().is_err());
    assert_eq!(h.handle.state(), Listening);
    assert!(drain_events(&mut h.events).contains(&AppEvent::Transcript {
        text: "hel".to_string(),
        is_final: false,
    }));
}

#[tokio::test(start_paused = true)]
async fn utterance_end_sends_without_waiting_for_the_pause() {
    let mut h = harness();
    assert_ok!(h.handle.tap());
    h.wait_state(Listening).await;

    assert_ok!(h.handle.transcript("hi there", true));
    assert_ok!(h.handle.utterance_end());
    h.settle().await;

    let call = h.calls.try_recv().expect("sent immediately");
    assert_eq!(call.message, "hi there");
}

// ── Full turn ──────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn streamed_reply_is_spoken_in_order_then_follows_up() {
    let mut h = harness();
    let mut call = h.say("what time is it").await;
    assert!(call.has_sink());

    call.stream("It is **noon**. Have");
    h.wait_state(Speaking).await;
    call.stream(" a nice day.");
    call.finish(Ok("It is **noon**. Have a nice day.".to_string()));
    h.wait_state(Followup).await;

    let events = drain_events(&mut h.events);
    assert_eq!(
        states_from(&events),
        vec![Welcome, Listening, Thinking, Speaking, Followup]
    );
    assert!(events.contains(&AppEvent::FirstSentence {
        text: "It is noon.".to_string()
    }));
    assert_eq!(responses(&events), vec!["It is noon. Have a nice day."]);

    let chunks = audio_chunks(&events);
    assert_eq!(
        chunks.iter().map(|c| (c.0, c.1.as_str())).collect::<Vec<_>>(),
        vec![(1, "It is noon."), (2, "Have a nice day.")]
    );
    assert!(chunks.last().unwrap().2);

    assert_eq!(h.capture.starts(), 2, "capture restarts for the follow-up");
    assert_eq!(
        h.handle.last_response().as_deref(),
        Some("It is noon. Have a nice day.")
    );
}

#[tokio::test(start_paused = true)]
async fn followup_times_out_to_idle() {
    let mut h = harness();
    let call = h.say("hello").await;
    call.finish(Ok("Hi.".to_string()));
    h.wait_state(Followup).await;
    let entered = tokio::time::Instant::now();

    h.wait_state(Idle).await;

    assert!(entered.elapsed() >= Duration::from_secs(30));
    assert!(!h.capture.is_running());
}

#[tokio::test(start_paused = true)]
async fn speech_during_followup_starts_the_next_turn() {
    let mut h = harness();
    h.say("hello").await.finish(Ok("Hi.".to_string()));
    h.wait_state(Followup).await;

    assert_ok!(h.handle.transcript("and tomorrow?", true));
    h.wait_state(Listening).await;

    let call = next_call(&mut h.calls).await;
    assert_eq!(call.message, "and tomorrow?");
}

#[tokio::test(start_paused = true)]
async fn unstreamed_reply_is_spoken_whole() {
    let mut h = harness();
    let call = h.say("anything new").await;

    call.reply(Ok("From **history**.".to_string()));
    h.wait_state(Followup).await;

    let events = drain_events(&mut h.events);
    assert!(events.contains(&AppEvent::FirstSentence {
        text: "From history.".to_string()
    }));
    assert_eq!(
        audio_chunks(&events),
        vec![(1, "From history.".to_string(), true)]
    );
}

#[tokio::test(start_paused = true)]
async fn empty_reply_returns_to_idle() {
    let mut h = harness();
    h.say("hmm").await.reply(Ok(String::new()));
    h.wait_state(Idle).await;

    assert!(audio_chunks(&drain_events(&mut h.events)).is_empty());
    assert!(h.synth.calls().is_empty());
}

// ── Barge-in ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn tap_while_speaking_interrupts_and_listens() {
    let mut h = harness();
    h.synth.delay("First sentence.", Duration::from_secs(5));
    let mut call = h.say("tell me a story").await;

    call.stream("First sentence. ");
    h.wait_state(Speaking).await;
    assert_ok!(h.handle.tap());
    h.wait_state(Listening).await;

    // The old stream keeps going after the interruption, silently.
    call.stream("Second one. ");
    call.finish(Ok("First **sentence**. Second one.".to_string()));
    tokio::time::sleep(Duration::from_secs(10)).await;

    let events = drain_events(&mut h.events);
    assert!(audio_chunks(&events).is_empty(), "interrupted audio never delivered");
    assert_eq!(h.synth.calls(), vec!["First sentence."]);
    assert_eq!(h.chat.abandoned(), 0);
    assert_eq!(h.handle.state(), Listening);
    assert!(h.capture.is_running());

    assert_eq!(responses(&events), vec!["First sentence. Second one."]);
    assert_eq!(
        h.handle.last_response().as_deref(),
        Some("First sentence. Second one.")
    );
}

#[tokio::test(start_paused = true)]
async fn interrupted_reply_does_not_disturb_the_next_turn() {
    let mut h = harness();
    let mut old = h.say("tell me a story").await;
    old.stream("Once upon a time. ");
    h.wait_state(Speaking).await;
    assert_ok!(h.handle.tap());
    h.wait_state(Listening).await;

    assert_ok!(h.handle.transcript("what time is it", true));
    let new = next_call(&mut h.calls).await;
    old.finish(Ok("Once upon a time. The end.".to_string()));
    h.settle().await;
    assert_eq!(h.handle.state(), Thinking);

    new.finish(Ok("It is noon.".to_string()));
    h.wait_state(Followup).await;

    let events = drain_events(&mut h.events);
    assert_eq!(
        responses(&events),
        vec!["Once upon a time. The end.", "It is noon."]
    );
    assert_eq!(h.handle.last_response().as_deref(), Some("It is noon."));
}

#[tokio::test(start_paused = true)]
async fn tap_while_thinking_interrupts_to_idle() {
    let mut h = harness();
    let call = h.say("long question").await;

    assert_ok!(h.handle.tap());
    h.wait_state(Idle).await;
    call.finish(Ok("Too late.".to_string()));
    h.settle().await;

    let events = drain_events(&mut h.events);
    assert!(events.contains(&AppEvent::notice(INTERRUPTED_NOTICE)));
    assert!(responses(&events).is_empty());
    assert_eq!(h.chat.abandoned(), 1, "the reply is no longer awaited");
    assert_eq!(h.handle.state(), Idle);
    assert!(h.handle.last_response().is_none());
}

#[tokio::test(start_paused = true)]
async fn stale_turn_results_are_dropped() {
    let mut h = harness();
    let mut old = h.say("first question").await;
    assert_ok!(h.handle.tap());
    h.wait_state(Idle).await;

    let new = h.say("second question").await;
    old.stream("Old answer. ");
    old.finish(Ok("Old answer.".to_string()));
    h.settle().await;
    assert_eq!(h.handle.state(), Thinking);

    new.finish(Ok("New answer.".to_string()));
    h.wait_state(Followup).await;

    let events = drain_events(&mut h.events);
    assert_eq!(responses(&events), vec!["New answer."]);
    assert_eq!(
        audio_chunks(&events),
        vec![(1, "New answer.".to_string(), true)]
    );
}

// ── Special turns ──────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn farewell_says_goodbye_then_idles() {
    let mut h = harness();
    let call = h.say("okay goodbye").await;
    assert_eq!(call.message, "okay goodbye", "farewells still reach the agent");

    call.finish(Ok("Bye for now!".to_string()));
    h.wait_state(Goodbye).await;
    let entered = tokio::time::Instant::now();
    h.wait_state(Idle).await;

    assert!(entered.elapsed() >= Duration::from_secs(3));
    let events = drain_events(&mut h.events);
    assert_eq!(
        states_from(&events),
        vec![Welcome, Listening, Thinking, Speaking, Goodbye, Idle]
    );
    assert_eq!(audio_chunks(&events).len(), 1);
    assert_eq!(h.capture.starts(), 1, "no follow-up after a farewell");
}

#[tokio::test(start_paused = true)]
async fn long_farewell_stops_synthesis_when_goodbye_ends() {
    let mut h = harness();
    h.synth.delay("Bye for now!", Duration::from_secs(5));
    let mut call = h.say("goodbye").await;

    call.stream("Bye for now! Take care. ");
    call.finish(Ok("Bye for now! Take care.".to_string()));
    h.wait_state(Goodbye).await;
    h.wait_state(Idle).await;
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(h.synth.calls(), vec!["Bye for now!"]);
    assert!(audio_chunks(&drain_events(&mut h.events)).is_empty());
}

#[tokio::test(start_paused = true)]
async fn deferred_request_is_acknowledged_and_runs_in_background() {
    let mut h = harness();
    let ack = ConversationSettings::default().acknowledgements[0].clone();

    assert_ok!(h.handle.tap());
    h.wait_state(Listening).await;
    assert_ok!(h.handle.transcript("check the build and tell me when done", true));
    h.wait_state(Idle).await;

    let call = next_call(&mut h.calls).await;
    assert_eq!(call.message, "check the build and tell me when done");
    assert!(!call.has_sink());
    let tasks = h.handle.tasks().get_all_tasks();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].status, TaskStatus::Running);

    call.finish(Ok("The build is green.".to_string()));
    let done = wait_for_event(&mut h.events, |e| {
        matches!(e, AppEvent::TaskCompleted { .. })
    })
    .await;
    assert!(matches!(done, AppEvent::TaskCompleted { ref result, .. } if result == "The build is green."));

    let events = drain_events(&mut h.events);
    assert_eq!(h.handle.state(), Idle);
    assert!(!states_from(&events).contains(&Thinking));
    assert_eq!(h.synth.calls(), vec![ack]);
}

#[tokio::test(start_paused = true)]
async fn interrupting_a_live_turn_leaves_the_background_task_running() {
    let mut h = harness();
    assert_ok!(h.handle.tap());
    h.wait_state(Listening).await;
    assert_ok!(h.handle.transcript("check the build and tell me later", true));
    h.wait_state(Idle).await;
    let task_call = next_call(&mut h.calls).await;
    assert!(!task_call.has_sink());

    let live = h.say("what time is it").await;
    assert!(live.has_sink());
    assert_ok!(h.handle.tap());
    h.wait_state(Idle).await;
    h.settle().await;
    assert_eq!(h.chat.abandoned(), 1, "only the live turn is abandoned");

    task_call.finish(Ok("The build is green.".to_string()));
    let done = wait_for_event(&mut h.events, |e| {
        matches!(e, AppEvent::TaskCompleted { .. } | AppEvent::TaskFailed { .. })
    })
    .await;
    assert!(matches!(done, AppEvent::TaskCompleted { ref result, .. } if result == "The build is green."));
    assert_eq!(h.handle.tasks().get_all_tasks()[0].status, TaskStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn chat_failure_announces_degraded_service() {
    let mut h = harness();
    h.say("are you there").await.finish(Err(GatewayError::ConnectionLost));
    h.wait_state(Idle).await;

    let events = drain_events(&mut h.events);
    assert!(events.contains(&AppEvent::notice(
        ConversationSettings::default().unavailable_message
    )));
    assert!(h.synth.calls().is_empty());
}

// ── Capture failures ───────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn transcription_failure_stops_listening() {
    let mut h = harness();
    assert_ok!(h.handle.tap());
    h.wait_state(Listening).await;

    let error = TranscriptionError::Backend("microphone unplugged".to_string());
    assert_ok!(h.handle.transcription_failed(error.clone()));
    h.wait_state(Idle).await;

    assert!(drain_events(&mut h.events).contains(&AppEvent::notice(error.to_string())));
    assert!(!h.capture.is_running());
}

#[tokio::test(start_paused = true)]
async fn capture_that_will_not_start_leaves_engine_idle() {
    let mut h = harness();
    h.capture.refuse_start();

    assert_ok!(h.handle.tap());
    h.wait_state(Idle).await;

    let events = drain_events(&mut h.events);
    assert!(!states_from(&events).contains(&Listening));
    assert!(events.iter().any(|e| matches!(e, AppEvent::Notice { .. })));
    assert_eq!(h.capture.starts(), 0);
}

// ── Lifecycle ──────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn voice_switch_passes_through() {
    let h = harness();
    h.handle.set_voice("Calm_Woman");
    assert_eq!(h.handle.voice(), "Calm_Woman");
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_the_engine() {
    let h = harness();
    assert_ok!(h.handle.shutdown());
    h.engine.await.unwrap();

    assert_eq!(h.handle.tap(), Err(ConversationError::Stopped));
}
