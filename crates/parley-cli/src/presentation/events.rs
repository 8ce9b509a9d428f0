//! One-line renderings of [`AppEvent`]s and tasks.

use parley_core::{AppEvent, Task, truncate_for_log};

/// Render an event for the terminal, or `None` for events not worth a line.
pub fn format_event(event: &AppEvent) -> Option<String> {
    let line = match event {
        AppEvent::StateChanged { state } => format!("[{state}]"),
        AppEvent::Transcript { text, is_final } => {
            if *is_final {
                format!("  you: {text}")
            } else {
                format!("  you: {text}...")
            }
        }
        AppEvent::FirstSentence { .. } => return None,
        AppEvent::AudioChunk {
            sentence_id,
            text,
            audio,
            is_last,
        } => {
            let marker = if *is_last { " (last)" } else { "" };
            format!(
                "  agent #{sentence_id}: {text} [{} bytes]{marker}",
                audio.len()
            )
        }
        AppEvent::Response { text } => format!("  reply: {text}"),
        AppEvent::Notice { message } => format!("  ! {message}"),
        AppEvent::TaskCompleted {
            task_id,
            result,
            duration,
        } => format!(
            "  task {task_id} done in {:.1}s: {}",
            millis_to_secs(*duration),
            truncate_for_log(result, 120)
        ),
        AppEvent::TaskFailed { task_id, error } => format!("  task {task_id} failed: {error}"),
    };
    Some(line)
}

/// Render a task listing row.
pub fn format_task(task: &Task) -> String {
    let elapsed = task
        .duration_ms()
        .map(|ms| format!(" {:.1}s", millis_to_secs(ms)))
        .unwrap_or_default();
    let status = format!("{:?}", task.status).to_lowercase();
    format!(
        "{:<40} {status:<10}{elapsed}  {}",
        task.id.as_str(),
        truncate_for_log(&task.message, 50)
    )
}

#[allow(clippy::cast_precision_loss)]
fn millis_to_secs(ms: i64) -> f64 {
    ms as f64 / 1000.0
}
