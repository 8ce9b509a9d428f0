//! Task command handler: run one background task and wait for its outcome.

use std::sync::Arc;

use anyhow::{Result, bail};

use parley_core::{AppEvent, ChannelEmitter};
use parley_voice::TaskRunner;

use crate::bootstrap::CliContext;
use crate::presentation::format_event;

pub async fn execute(ctx: &CliContext, text: &str) -> Result<()> {
    let (emitter, mut events) = ChannelEmitter::new();
    let runner = TaskRunner::new(ctx.chat.clone(), Arc::new(emitter));

    let id = runner.create_task(text);
    println!("Queued {id}");

    while let Some(event) = events.recv().await {
        if let Some(line) = format_event(&event) {
            println!("{line}");
        }
        match event {
            AppEvent::TaskCompleted { task_id, result, .. } if task_id == id => {
                println!();
                println!("{result}");
                break;
            }
            AppEvent::TaskFailed { task_id, error } if task_id == id => {
                ctx.client.close();
                bail!("Task {task_id} failed: {error}");
            }
            _ => {}
        }
    }

    ctx.client.close();
    Ok(())
}
