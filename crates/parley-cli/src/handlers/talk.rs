//! Talk command handler: drive a conversation from stdin.
//!
//! Typed lines stand in for finalized transcripts. Control lines:
//!
//! | Input           | Meaning                           |
//! |-----------------|-----------------------------------|
//! | empty line      | tap                               |
//! | `/end`          | end of utterance (send now)       |
//! | `/tasks`        | list background tasks             |
//! | `/cancel <id>`  | cancel a queued background task   |
//! | `/voice <id>`   | switch the synthesis voice        |
//! | `/quit`         | leave                             |

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use parley_core::{AppEvent, ChannelEmitter, TaskId};
use parley_voice::{Conversation, ConversationDeps, ConversationHandle};

use crate::bootstrap::CliContext;
use crate::capture::ConsoleCapture;
use crate::presentation::{AudioWriter, format_event, format_task};

/// One parsed line of terminal input.
#[derive(Debug, PartialEq, Eq)]
pub enum TalkInput<'a> {
    Tap,
    End,
    Tasks,
    Cancel(&'a str),
    Voice(&'a str),
    Quit,
    Speech(&'a str),
}

pub fn parse_line(line: &str) -> TalkInput<'_> {
    let line = line.trim();
    if line.is_empty() {
        return TalkInput::Tap;
    }
    let (command, argument) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(c, a)| (c, a.trim()));
    match command {
        "/end" => TalkInput::End,
        "/tasks" => TalkInput::Tasks,
        "/quit" | "/exit" => TalkInput::Quit,
        "/cancel" if !argument.is_empty() => TalkInput::Cancel(argument),
        "/voice" if !argument.is_empty() => TalkInput::Voice(argument),
        _ => TalkInput::Speech(line),
    }
}

pub async fn execute(ctx: &CliContext, audio_dir: Option<PathBuf>) -> Result<()> {
    let writer = match audio_dir {
        Some(dir) => Some(
            AudioWriter::create(&dir)
                .await
                .with_context(|| format!("Failed to create {}", dir.display()))?,
        ),
        None => None,
    };

    let (emitter, events) = ChannelEmitter::new();
    let (handle, engine) = Conversation::spawn(
        ctx.settings.conversation.clone(),
        ConversationDeps {
            chat: ctx.chat.clone(),
            synthesizer: ctx.synthesizer.clone(),
            capture: Arc::new(ConsoleCapture::new()),
            emitter: Arc::new(emitter),
        },
    );
    let printer = tokio::spawn(print_events(events, writer));

    println!("Empty line = tap, /end = send now, /quit = leave.");
    handle.welcome_finished()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines
        .next_line()
        .await
        .context("Failed to read from stdin")?
    {
        if !dispatch(&handle, parse_line(&line))? {
            break;
        }
    }

    handle.shutdown()?;
    engine.await.context("Conversation engine panicked")?;
    printer.abort();
    ctx.client.close();
    Ok(())
}

/// Apply one input. Returns `false` when the user asked to leave.
fn dispatch(handle: &ConversationHandle, input: TalkInput<'_>) -> Result<bool> {
    match input {
        TalkInput::Tap => handle.tap()?,
        TalkInput::End => handle.utterance_end()?,
        TalkInput::Speech(text) => handle.transcript(text, true)?,
        TalkInput::Tasks => {
            let tasks = handle.tasks().get_all_tasks();
            if tasks.is_empty() {
                println!("  no tasks");
            }
            for task in &tasks {
                println!("  {}", format_task(task));
            }
        }
        TalkInput::Cancel(id) => {
            if handle.tasks().cancel_task(&TaskId::new(id)) {
                println!("  cancelled {id}");
            } else {
                println!("  {id} is not waiting to run");
            }
        }
        TalkInput::Voice(voice) => {
            handle.set_voice(voice);
            println!("  voice: {}", handle.voice());
        }
        TalkInput::Quit => return Ok(false),
    }
    Ok(true)
}

async fn print_events(mut events: mpsc::UnboundedReceiver<AppEvent>, mut writer: Option<AudioWriter>) {
    while let Some(event) = events.recv().await {
        if let Some(line) = format_event(&event) {
            println!("{line}");
        }
        if let (
            Some(writer),
            AppEvent::AudioChunk {
                sentence_id, audio, ..
            },
        ) = (writer.as_mut(), &event)
        {
            if let Err(error) = writer.write(*sentence_id, audio).await {
                tracing::warn!(%error, "Failed to write audio segment");
            }
        }
    }
}
