//! Incremental decoding of raw subprocess bytes into display lines

use encoding_rs::{CoderResult, Decoder, UTF_8};

use super::delimiter::next_delimiter;

/// Turns a stream of byte chunks into complete lines
///
/// Multi-byte sequences split across chunk boundaries are carried inside the
/// decoder until the rest arrives. After a batch containing a carriage-return
/// redraw, the undelimited remainder is also emitted (once per distinct value) so
/// a progress line that is rewritten in place is shown before its terminator
/// arrives.
pub struct LineAssembler {
    decoder: Decoder,
    buffer: String,
    last_partial: String,
    finished: bool,
}

impl Default for LineAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl LineAssembler {
    /// Create an assembler for UTF-8 output
    pub fn new() -> Self {
        Self {
            decoder: UTF_8.new_decoder_without_bom_handling(),
            buffer: String::new(),
            last_partial: String::new(),
            finished: false,
        }
    }

    /// Feed one chunk of bytes, returning the lines it completes
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        if self.finished || bytes.is_empty() {
            return Vec::new();
        }
        if !self.decode(bytes, false) {
            return Vec::new();
        }

        let mut lines = Vec::new();
        let saw_redraw = self.split_lines(&mut lines);
        if saw_redraw && !self.buffer.is_empty() && self.buffer != self.last_partial {
            lines.push(self.buffer.clone());
            self.last_partial = self.buffer.clone();
        }
        lines
    }

    /// Flush the decoder after the last chunk and return every remaining line
    ///
    /// Any undelimited remainder is returned as a final line. Calling this more
    /// than once returns nothing the second time.
    pub fn finish(&mut self) -> Vec<String> {
        if self.finished {
            return Vec::new();
        }
        self.decode(&[], true);
        self.finished = true;

        let mut lines = Vec::new();
        self.split_lines(&mut lines);
        if !self.buffer.is_empty() {
            lines.push(std::mem::take(&mut self.buffer));
        }
        self.last_partial.clear();
        lines
    }

    /// Text received but not yet terminated by a delimiter
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    // Returns whether any text was appended
    fn decode(&mut self, bytes: &[u8], last: bool) -> bool {
        let before = self.buffer.len();
        let mut remaining = bytes;
        loop {
            let needed = self
                .decoder
                .max_utf8_buffer_length(remaining.len())
                .unwrap_or(remaining.len());
            self.buffer.reserve(needed.max(4));
            let (result, read, _) = self.decoder.decode_to_string(remaining, &mut self.buffer, last);
            remaining = &remaining[read..];
            match result {
                CoderResult::InputEmpty => break,
                CoderResult::OutputFull => continue,
            }
        }
        self.buffer.len() > before
    }

    // Returns whether a carriage-return redraw was seen
    fn split_lines(&mut self, lines: &mut Vec<String>) -> bool {
        let mut saw_redraw = false;
        while let Some((index, delimiter)) = next_delimiter(&self.buffer) {
            let line = self.buffer[..index].to_string();
            self.buffer.drain(..index + delimiter.width());
            lines.push(line);
            self.last_partial.clear();
            if delimiter.is_redraw() {
                saw_redraw = true;
            }
        }
        saw_redraw
    }
}
