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

use crate::decoders::base64::decode_b_word;
use crate::decoders::charsets::{charset_encoding, TextDecoder};
use crate::decoders::quoted_printable::decode_q_word;

/// One `=?charset?enc?payload?=` construct located in a header value.
#[derive(Debug)]
pub(crate) struct EncodedWord<'x> {
    charset: &'x str,
    encoding: char,
    payload: &'x str,
    start: usize,
    end: usize,
}

/// Matches an encoded-word at `pos`, which has to point at `=?`.
pub(crate) fn parse_word(text: &str, pos: usize) -> Option<EncodedWord<'_>> {
    let rest = text.get(pos..)?.strip_prefix("=?")?;

    let charset_end = rest.find('?')?;
    let charset = &rest[..charset_end];
    let rest = &rest[charset_end + 1..];

    let encoding = rest.chars().next()?;
    if !matches!(encoding, 'B' | 'b' | 'Q' | 'q') {
        return None;
    }
    let rest = rest[1..].strip_prefix('?')?;

    let payload_end = rest.find('?')?;
    if !rest[payload_end + 1..].starts_with('=') {
        return None;
    }
    let payload = &rest[..payload_end];

    let end = pos + 2 + charset_end + 3 + payload_end + 2;
    Some(EncodedWord {
        charset,
        encoding,
        payload,
        start: pos,
        end,
    })
}

impl EncodedWord<'_> {
    /// The charset label with any `*language` suffix removed.
    fn charset_label(&self) -> &str {
        self.charset.split('*').next().unwrap_or("")
    }

    fn decode_bytes(&self) -> Option<Vec<u8>> {
        match self.encoding {
            'B' | 'b' => decode_b_word(self.payload),
            _ => Some(decode_q_word(self.payload)),
        }
    }
}

/// Accumulates decoded words, carrying one streaming charset decoder across
/// successive words of the same charset so that a multi-byte character split
/// between two encoded-words still decodes correctly. Plain text and any
/// charset change flush the decoder.
#[derive(Default)]
struct WordAccumulator {
    out: String,
    decoder: Option<TextDecoder>,
}

impl WordAccumulator {
    fn flush(&mut self) {
        if let Some(mut decoder) = self.decoder.take() {
            self.out.push_str(&decoder.finish());
        }
    }

    fn text(&mut self, text: &str) {
        self.flush();
        self.out.push_str(text);
    }

    fn word(&mut self, word: &EncodedWord<'_>, raw: &str) {
        let encoding = match charset_encoding(word.charset_label()) {
            Some(encoding) => encoding,
            None => {
                log::debug!("unknown charset in encoded-word: {:?}", word.charset);
                self.text(raw);
                return;
            }
        };
        let bytes = match word.decode_bytes() {
            Some(bytes) => bytes,
            None => {
                log::debug!("malformed encoded-word payload: {raw:?}");
                self.text(raw);
                return;
            }
        };

        match &mut self.decoder {
            Some(decoder) if decoder.charset() == encoding.name() => {
                let decoded = decoder.push(&bytes, false);
                self.out.push_str(&decoded);
            }
            _ => {
                self.flush();
                let mut decoder = TextDecoder::new(encoding);
                self.out.push_str(&decoder.push(&bytes, false));
                self.decoder = Some(decoder);
            }
        }
    }

    fn finish(mut self) -> String {
        self.flush();
        self.out
    }
}

/// Decodes a run of one or more encoded-words separated only by whitespace,
/// starting at `pos`. Returns the folded Unicode text and the position one
/// past the run, or `None` when `pos` does not start an encoded-word.
pub(crate) fn decode_word_run(text: &str, pos: usize) -> Option<(String, usize)> {
    let mut word = parse_word(text, pos)?;
    let mut acc = WordAccumulator::default();

    loop {
        acc.word(&word, &text[word.start..word.end]);
        let run_end = word.end;

        let trimmed = text[run_end..].trim_start_matches([' ', '\t', '\r', '\n']);
        let next_pos = text.len() - trimmed.len();
        match parse_word(text, next_pos) {
            Some(next) => word = next,
            None => return Some((acc.finish(), run_end)),
        }
    }
}

/// Replaces every RFC2047 encoded-word in `text` with its decoded form.
///
/// Whitespace between adjacent encoded-words is elided; anything that does
/// not match the encoded-word shape, uses an unknown charset or fails to
/// decode is left in place unchanged.
pub fn decode_rfc2047(text: &str) -> String {
    let mut acc = WordAccumulator::default();
    let mut seg_start = 0;
    let mut after_word = false;
    let mut pos = 0;

    while pos < text.len() {
        if text[pos..].starts_with("=?") {
            if let Some(word) = parse_word(text, pos) {
                let between = &text[seg_start..pos];
                let ws_only = between
                    .chars()
                    .all(|ch| matches!(ch, ' ' | '\t' | '\r' | '\n'));
                if !between.is_empty() && !(after_word && ws_only) {
                    acc.text(between);
                }
                acc.word(&word, &text[word.start..word.end]);
                pos = word.end;
                seg_start = pos;
                after_word = true;
                continue;
            }
        }
        pos += text[pos..].chars().next().map_or(1, char::len_utf8);
    }

    if seg_start < text.len() {
        acc.text(&text[seg_start..]);
    }
    acc.finish()
}
