//! Text cleanup for display and speech.

/// Inline markers removed by [`clean_markdown`], outermost first.
const PAIRED_MARKERS: &[&str] = &["**", "*", "~~", "`"];

/// Remove paired inline markdown (bold, italic, strikethrough, inline code).
///
/// Only balanced pairs on a single line are unwrapped; a stray `*` is kept.
#[must_use]
pub fn clean_markdown(text: &str) -> String {
    text.split('\n')
        .map(|line| {
            PAIRED_MARKERS
                .iter()
                .fold(line.to_string(), |acc, marker| unwrap_pairs(&acc, marker))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Plain text for the synthesizer: every emphasis marker dropped and
/// whitespace collapsed.
///
/// Sentences are cut from the raw stream, so a pair may straddle two of them;
/// stripping lone markers keeps them from being read aloud.
#[must_use]
pub fn speakable(text: &str) -> String {
    let stripped = text.replace("**", "").replace("~~", "").replace(['*', '`'], "");
    collapse_whitespace(&stripped)
}

fn unwrap_pairs(text: &str, marker: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find(marker) {
        let inner_start = open + marker.len();
        // Non-greedy: the closing marker is the next one with content between.
        let close = rest[inner_start..]
            .char_indices()
            .skip(1)
            .find(|(i, _)| rest[inner_start + i..].starts_with(marker))
            .map(|(i, _)| inner_start + i);

        if let Some(close) = close {
            result.push_str(&rest[..open]);
            result.push_str(&rest[inner_start..close]);
            rest = &rest[close + marker.len()..];
        } else {
            result.push_str(&rest[..inner_start]);
            rest = &rest[inner_start..];
        }
    }

    result.push_str(rest);
    result
}

fn collapse_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut prev_space = false;

    for c in text.chars() {
        if c.is_whitespace() {
            if !prev_space {
                result.push(' ');
                prev_space = true;
            }
        } else {
            result.push(c);
            prev_space = false;
        }
    }

    result.trim().to_string()
}
