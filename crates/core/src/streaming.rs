use anyhow::Result;
use tokenizers::Tokenizer;

use crate::tokenizer::decode;

/// Outcome of feeding one token to a [`TextStreamer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamStep {
    /// Keep decoding; carries text that is now safe to emit.
    Continue(Option<String>),
    /// A stop string was produced; carries the text preceding it.
    Stopped(Option<String>),
}

/// Turns a growing token sequence into text deltas.
///
/// Each token is decoded together with the previous one so that leading
/// spaces and multi-token characters come out intact; text before that
/// window is fixed. Any tail that could still grow into a stop string is
/// held back until it is disambiguated.
pub struct TextStreamer<'a> {
    tokenizer: &'a Tokenizer,
    stop: &'a [String],
    tokens: Vec<u32>,
    /// Start of the context token decoded ahead of new tokens.
    prefix_offset: usize,
    /// First token whose text is not yet fixed.
    read_offset: usize,
    text: String,
    /// Length of `text` produced by `tokens[..read_offset]`.
    fixed_len: usize,
    emitted: usize,
}

impl<'a> TextStreamer<'a> {
    pub fn new(tokenizer: &'a Tokenizer, stop: &'a [String]) -> Self {
        Self {
            tokenizer,
            stop,
            tokens: Vec::new(),
            prefix_offset: 0,
            read_offset: 0,
            text: String::new(),
            fixed_len: 0,
            emitted: 0,
        }
    }

    pub fn push(&mut self, token: u32) -> Result<StreamStep> {
        self.tokens.push(token);
        let prefix = self.decode_range(self.prefix_offset, self.read_offset)?;
        let window = self.decode_range(self.prefix_offset, self.tokens.len())?;
        self.text.truncate(self.fixed_len);
        self.text.push_str(window.get(prefix.len()..).unwrap_or_default());

        if let Some(pos) = self.find_stop() {
            let delta = self.text.get(self.emitted..pos).map(str::to_string);
            self.emitted = self.emitted.max(pos);
            self.text.truncate(pos);
            return Ok(StreamStep::Stopped(delta.filter(|d| !d.is_empty())));
        }

        // Incomplete UTF-8 sequence: wait for the next token.
        if self.text.ends_with('\u{FFFD}') {
            return Ok(StreamStep::Continue(None));
        }
        self.fixed_len = self.text.len();
        self.prefix_offset = self.read_offset;
        self.read_offset = self.tokens.len();

        let safe_end = self.text.len() - self.partial_stop_suffix(&self.text);
        Ok(StreamStep::Continue(self.take_until(safe_end)))
    }

    /// Tokens that the next `push` decodes again alongside the new one.
    pub fn pending_tokens(&self) -> usize {
        self.tokens.len() - self.prefix_offset
    }

    /// Flush whatever is still held back.
    pub fn finish(&mut self) -> Option<String> {
        self.take_until(self.text.len())
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    fn take_until(&mut self, end: usize) -> Option<String> {
        if end <= self.emitted {
            return None;
        }
        let delta = self.text.get(self.emitted..end)?.to_string();
        self.emitted = end;
        Some(delta)
    }

    fn decode_range(&self, start: usize, end: usize) -> Result<String> {
        if start >= end {
            return Ok(String::new());
        }
        decode(self.tokenizer, &self.tokens[start..end])
    }

    /// Earliest stop string in the text not yet emitted. Emitted text never
    /// ends in a stop prefix, so no match can start before it.
    fn find_stop(&self) -> Option<usize> {
        let unsent = self.text.get(self.emitted..)?;
        self.stop
            .iter()
            .filter(|stop| !stop.is_empty())
            .filter_map(|stop| unsent.find(stop.as_str()))
            .min()
            .map(|pos| pos + self.emitted)
    }

    /// Length of the longest suffix of `text` that is a proper prefix of a stop string.
    fn partial_stop_suffix(&self, text: &str) -> usize {
        self.stop
            .iter()
            .filter_map(|stop| {
                (1..stop.len())
                    .rev()
                    .filter(|&len| stop.is_char_boundary(len))
                    .find(|&len| text.ends_with(&stop[..len]))
            })
            .max()
            .unwrap_or(0)
    }
}
