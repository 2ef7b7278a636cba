/*
 * Copyright Stalwart Labs Ltd. See the COPYING
 * file at the top-level directory of this distribution.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

pub mod encoded_word;
pub mod fields;

use thiserror::Error;

/// Receives committed header lines.
pub trait HeaderSink {
    fn deliver_data(&mut self, data: &str);
    fn deliver_eof(&mut self) {}
}

impl HeaderSink for String {
    fn deliver_data(&mut self, data: &str) {
        self.push_str(data);
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EmitterError {
    #[error("text does not fit within the hard line margin")]
    Overflow,

    #[error("date is invalid or outside the emittable range")]
    InvalidDate,

    #[error("value shape does not match the header's encoder")]
    ValueMismatch,

    #[error("no encoder for header {0:?} and the value is not text")]
    UnknownHeader(String),
}

/// Margins are in characters; `soft_margin` is clamped to [30, 900] and
/// `hard_margin` to [soft, 998].
#[derive(Debug, Clone, Copy)]
pub struct EmitterOptions {
    pub soft_margin: usize,
    pub hard_margin: usize,
    pub use_ascii: bool,
}

impl Default for EmitterOptions {
    fn default() -> Self {
        EmitterOptions {
            soft_margin: 78,
            hard_margin: 332,
            use_ascii: true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct BreakPoint {
    bytes: usize,
    chars: usize,
}

/// Builds folded header lines one logical header at a time.
///
/// The current line may be broken at a *preferred* break point (recorded by
/// writers through `may_break_after`) or, when none fits, at the *emergency*
/// boundary between any two committed tokens. A token that cannot be placed
/// within the hard margin fails the write.
pub struct HeaderEmitter<'a> {
    sink: &'a mut dyn HeaderSink,
    soft_margin: usize,
    hard_margin: usize,
    pub(crate) use_ascii: bool,
    line: String,
    line_chars: usize,
    break_point: Option<BreakPoint>,
}

impl<'a> HeaderEmitter<'a> {
    pub fn new(sink: &'a mut dyn HeaderSink, options: EmitterOptions) -> Self {
        let soft_margin = options.soft_margin.clamp(30, 900);
        HeaderEmitter {
            sink,
            soft_margin,
            hard_margin: options.hard_margin.clamp(soft_margin, 998),
            use_ascii: options.use_ascii,
            line: String::new(),
            line_chars: 0,
            break_point: None,
        }
    }

    pub(crate) fn soft_margin(&self) -> usize {
        self.soft_margin
    }

    pub(crate) fn line_chars(&self) -> usize {
        self.line_chars
    }

    /// Appends `text` to the current line, folding first if it does not fit.
    /// With `may_break_after`, the end of `text` becomes the preferred break
    /// point and a trailing space is guaranteed.
    pub fn add_text(&mut self, text: &str, may_break_after: bool) -> Result<(), EmitterError> {
        let chars = text.chars().count();
        self.reserve_space(chars)?;

        self.line.push_str(text);
        self.line_chars += chars;

        if may_break_after {
            self.break_point = Some(BreakPoint {
                bytes: self.line.len(),
                chars: self.line_chars,
            });
            if !self.line.ends_with(' ') {
                self.line.push(' ');
                self.line_chars += 1;
            }
        }
        Ok(())
    }

    /// Makes room for `chars` more characters on the current line.
    pub(crate) fn reserve_space(&mut self, chars: usize) -> Result<(), EmitterError> {
        if self.line_chars + chars <= self.soft_margin {
            return Ok(());
        }

        if let Some(break_point) = self.break_point.take() {
            self.fold_at(break_point);
            if self.line_chars + chars <= self.soft_margin {
                return Ok(());
            }
        }

        if self.line_chars + chars <= self.hard_margin {
            return Ok(());
        }

        if !self.line.trim_end().is_empty() {
            self.fold_whole_line();
        }
        if self.line_chars + chars <= self.hard_margin {
            Ok(())
        } else {
            Err(EmitterError::Overflow)
        }
    }

    fn fold_at(&mut self, break_point: BreakPoint) {
        self.sink
            .deliver_data(self.line[..break_point.bytes].trim_end());
        self.sink.deliver_data("\r\n");

        let rest = self.line[break_point.bytes..].trim_start();
        let mut line = String::with_capacity(rest.len() + 1);
        line.push(' ');
        line.push_str(rest);
        self.line_chars = 1 + rest.chars().count();
        self.line = line;
        self.break_point = None;
    }

    /// Commits the whole current line; the next write continues on a folded
    /// continuation line. A line with nothing but whitespace on it stays put,
    /// an empty committed line would end the header block.
    pub(crate) fn fold_whole_line(&mut self) {
        if self.line.trim_end().is_empty() {
            return;
        }
        self.fold_at(BreakPoint {
            bytes: self.line.len(),
            chars: self.line_chars,
        });
    }

    /// Commits the current line as the end of the logical header.
    pub fn end_header(&mut self) {
        if !self.line.is_empty() {
            let line = std::mem::take(&mut self.line);
            self.sink.deliver_data(line.trim_end());
            self.sink.deliver_data("\r\n");
        }
        self.line_chars = 0;
        self.break_point = None;
    }

    /// Commits any pending line and signals the end of the header block.
    pub fn finish(&mut self) {
        self.end_header();
        self.sink.deliver_eof();
    }

    /// Adds `text`, wrapped in quotes when it contains any character of
    /// `qchars` and is not already quoted.
    pub fn add_quotable(
        &mut self,
        text: &str,
        qchars: &str,
        may_break_after: bool,
    ) -> Result<(), EmitterError> {
        if text.is_empty() {
            return Ok(());
        }
        match quote_if_needed(text, qchars) {
            Some(quoted) => self.add_text(&quoted, may_break_after),
            None => self.add_text(text, may_break_after),
        }
    }

    /// Adds a phrase: whitespace runs collapse to a single space, non-ASCII
    /// text is routed to the RFC2047 encoder, and a phrase that does not fit
    /// as a whole is re-added word by word with break points between words.
    pub fn add_phrase(
        &mut self,
        text: &str,
        qchars: &str,
        may_break_after: bool,
    ) -> Result<(), EmitterError> {
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.is_empty() {
            return Ok(());
        }

        if self.use_ascii
            && text
                .chars()
                .any(|ch| !(' '..='\u{7e}').contains(&ch))
        {
            return self.encode_rfc2047_phrase(&text, may_break_after);
        }

        let quoted = quote_if_needed(&text, qchars);
        let result = self.add_text(quoted.as_deref().unwrap_or(&text), may_break_after);
        match result {
            Ok(()) => {
                if self.break_point.is_none() && quoted.is_none() {
                    if let Some(space) = text.rfind(' ') {
                        // The last interior space of the phrase is a usable fold
                        let tail = &text[space..];
                        self.break_point = Some(BreakPoint {
                            bytes: self.line.len() - tail.len(),
                            chars: self.line_chars - tail.chars().count(),
                        });
                    }
                }
                Ok(())
            }
            Err(EmitterError::Overflow) => {
                let words = text.split(' ').collect::<Vec<_>>();
                for (pos, word) in words.iter().enumerate() {
                    let break_after = if pos + 1 == words.len() {
                        may_break_after
                    } else {
                        true
                    };
                    self.add_quotable(word, qchars, break_after)?;
                }
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Adds unstructured text: never quoted, RFC2047-encoded when non-ASCII.
    pub fn add_unstructured(&mut self, text: &str) -> Result<(), EmitterError> {
        self.add_phrase(text, "", false)
    }
}

/// Wraps `text` in quotes, escaping `\` and `"`, when it contains a
/// character of `qchars` and is not already quoted.
pub(crate) fn quote_if_needed(text: &str, qchars: &str) -> Option<String> {
    let already_quoted = text.len() >= 2 && text.starts_with('"') && text.ends_with('"');
    if !already_quoted && !qchars.is_empty() && text.contains(|ch| qchars.contains(ch)) {
        Some(format!(
            "\"{}\"",
            text.replace('\\', "\\\\").replace('"', "\\\"")
        ))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::{EmitterError, EmitterOptions, HeaderEmitter};

    fn emitter_options(soft: usize, hard: usize) -> EmitterOptions {
        EmitterOptions {
            soft_margin: soft,
            hard_margin: hard,
            ..Default::default()
        }
    }

    #[test]
    fn no_fold_under_soft_margin() {
        let mut out = String::new();
        let mut emitter = HeaderEmitter::new(&mut out, EmitterOptions::default());
        emitter.add_text("Subject:", true).unwrap();
        emitter.add_text("Hello world", false).unwrap();
        emitter.end_header();
        assert_eq!(out, "Subject: Hello world\r\n");
    }

    #[test]
    fn fold_at_preferred_break() {
        let mut out = String::new();
        let mut emitter = HeaderEmitter::new(&mut out, emitter_options(30, 998));
        emitter.add_text("Subject:", true).unwrap();
        emitter.add_text("aaaaaaaaaaaaaaa", true).unwrap();
        emitter.add_text("bbbbbbbbbbbbbbb", false).unwrap();
        emitter.end_header();
        assert_eq!(out, "Subject: aaaaaaaaaaaaaaa\r\n bbbbbbbbbbbbbbb\r\n");
    }

    #[test]
    fn soft_overflow_within_hard_margin() {
        // No break point: the line may run past the soft margin
        let mut out = String::new();
        let mut emitter = HeaderEmitter::new(&mut out, emitter_options(30, 60));
        emitter
            .add_text("X-Long:AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA", false)
            .unwrap();
        emitter.end_header();
        assert_eq!(
            out,
            "X-Long:AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA\r\n"
        );
    }

    #[test]
    fn overflow_past_hard_margin() {
        let mut out = String::new();
        let mut emitter = HeaderEmitter::new(&mut out, emitter_options(30, 40));
        let result = emitter.add_text(&"A".repeat(41), false);
        assert_eq!(result, Err(EmitterError::Overflow));
    }

    #[test]
    fn quotable_text() {
        let mut out = String::new();
        let mut emitter = HeaderEmitter::new(&mut out, EmitterOptions::default());
        emitter.add_quotable("plain", ",;", false).unwrap();
        emitter.add_text(" ", false).unwrap();
        emitter.add_quotable("a;b", ",;", false).unwrap();
        emitter.add_text(" ", false).unwrap();
        emitter.add_quotable("say \"hi\"", "\"", false).unwrap();
        emitter.end_header();
        assert_eq!(out, "plain \"a;b\" \"say \\\"hi\\\"\"\r\n");
    }

    #[test]
    fn phrase_collapses_whitespace() {
        let mut out = String::new();
        let mut emitter = HeaderEmitter::new(&mut out, EmitterOptions::default());
        emitter.add_phrase("two\t words", "", false).unwrap();
        emitter.end_header();
        assert_eq!(out, "two words\r\n");
    }

    #[test]
    fn phrase_falls_back_to_words() {
        let mut out = String::new();
        let mut emitter = HeaderEmitter::new(&mut out, emitter_options(30, 30));
        emitter.add_text("Subject:", true).unwrap();
        emitter
            .add_phrase(
                "one two three four five six seven eight nine ten",
                "",
                false,
            )
            .unwrap();
        emitter.end_header();
        for line in out.split("\r\n") {
            assert!(line.chars().count() <= 30, "line too long: {line:?}");
        }
        let unfolded = out.replace("\r\n ", " ");
        assert_eq!(
            unfolded,
            "Subject: one two three four five six seven eight nine ten\r\n"
        );
    }

    #[test]
    fn margins_are_clamped() {
        let mut out = String::new();
        let emitter = HeaderEmitter::new(&mut out, emitter_options(10, 5));
        assert_eq!(emitter.soft_margin, 30);
        assert_eq!(emitter.hard_margin, 30);
    }
}
