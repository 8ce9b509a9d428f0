//! Ask command handler: one chat turn, printed as it streams.

use anyhow::Result;

use parley_core::{ChatPort, Sentence};
use parley_voice::{SentenceSegmenter, clean_markdown};

use crate::bootstrap::CliContext;
use crate::error::CliError;

pub async fn execute(ctx: &CliContext, text: &str) -> Result<()> {
    let segmenter = SentenceSegmenter::new(|sentence: Sentence| {
        println!("  {}. {}", sentence.sequence, sentence.text);
    });

    let outcome = ctx.chat.chat(text, Some(Box::new(segmenter))).await;
    ctx.client.close();
    let reply = outcome.map_err(CliError::from)?;

    println!();
    println!("{}", clean_markdown(&reply));
    Ok(())
}
