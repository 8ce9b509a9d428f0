//! Incremental sentence segmentation of streamed reply text.
//!
//! Text arrives in arbitrary fragments. Complete sentences are emitted as soon
//! as their terminal punctuation is seen, so synthesis of the first sentence
//! can start while the rest of the reply is still streaming.

use parley_core::{ChatStreamSink, Sentence};

/// Sentence enders recognized by default: CJK full-width and Latin.
pub const DEFAULT_ENDERS: &[char] = &['。', '！', '？', '.', '!', '?'];

/// Splits a text stream into sentences and hands each one to a callback.
///
/// Fragments are appended exactly as received, with no separator added. A
/// boundary is one ender followed by any whitespace; both are consumed and
/// the trimmed sentence (including its punctuation) is emitted if non-empty.
pub struct SentenceSegmenter<F> {
    buffer: String,
    enders: Vec<char>,
    emitted: u64,
    on_sentence: F,
}

impl<F: FnMut(Sentence)> SentenceSegmenter<F> {
    pub fn new(on_sentence: F) -> Self {
        Self::with_enders(DEFAULT_ENDERS, on_sentence)
    }

    pub fn with_enders(enders: &[char], on_sentence: F) -> Self {
        Self {
            buffer: String::new(),
            enders: enders.to_vec(),
            emitted: 0,
            on_sentence,
        }
    }

    /// Append a fragment and emit every sentence it completes.
    pub fn add_text(&mut self, fragment: &str) {
        self.buffer.push_str(fragment);
        while let Some(end) = self.next_boundary() {
            let sentence: String = self.buffer.drain(..end).collect();
            self.emit(&sentence);
        }
    }

    /// Emit whatever is left, punctuated or not.
    pub fn finish(&mut self) {
        let rest = std::mem::take(&mut self.buffer);
        self.emit(&rest);
    }

    /// Drop buffered text and restart numbering.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.emitted = 0;
    }

    /// Number of sentences emitted since creation or the last reset.
    pub const fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Text received but not yet emitted.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Byte offset just past the first boundary and its trailing whitespace.
    fn next_boundary(&self) -> Option<usize> {
        let (index, ender) = self
            .buffer
            .char_indices()
            .find(|(_, c)| self.enders.contains(c))?;
        let after = index + ender.len_utf8();
        let rest = &self.buffer[after..];
        Some(after + (rest.len() - rest.trim_start().len()))
    }

    fn emit(&mut self, raw: &str) {
        let text = raw.trim();
        if text.is_empty() {
            return;
        }
        self.emitted += 1;
        (self.on_sentence)(Sentence::new(self.emitted, text));
    }
}

impl<F: FnMut(Sentence) + Send> ChatStreamSink for SentenceSegmenter<F> {
    fn on_text(&mut self, fragment: &str) {
        self.add_text(fragment);
    }

    fn on_complete(&mut self) {
        self.finish();
    }
}
