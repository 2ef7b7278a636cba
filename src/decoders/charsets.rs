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

use encoding_rs::Encoding;

/// Looks up a character set by its MIME label.
pub fn charset_encoding(label: &str) -> Option<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
}

/// One-shot decode of `bytes` in the given character set, or `None` when
/// the label is unknown.
pub fn decode_charset(label: &str, bytes: &[u8]) -> Option<String> {
    let encoding = charset_encoding(label)?;
    let (text, _, _) = encoding.decode(bytes);
    Some(text.into_owned())
}

/// Incremental text decoder over a character set.
///
/// Feeding may stop at any byte offset, including inside a multi-byte
/// sequence; undecoded trail bytes are buffered until the next call.
/// `push(_, true)` flushes, replacing an incomplete final sequence with
/// U+FFFD.
pub struct TextDecoder {
    decoder: encoding_rs::Decoder,
}

impl TextDecoder {
    pub fn new(encoding: &'static Encoding) -> Self {
        TextDecoder {
            decoder: encoding.new_decoder(),
        }
    }

    pub fn for_label(label: &str) -> Option<Self> {
        charset_encoding(label).map(TextDecoder::new)
    }

    pub fn charset(&self) -> &'static str {
        self.decoder.encoding().name()
    }

    pub fn push(&mut self, bytes: &[u8], last: bool) -> String {
        let mut out = String::with_capacity(
            self.decoder
                .max_utf8_buffer_length(bytes.len())
                .unwrap_or(bytes.len() + 16),
        );
        let mut pos = 0;

        loop {
            let (result, read, _) = self.decoder.decode_to_string(&bytes[pos..], &mut out, last);
            pos += read;
            match result {
                encoding_rs::CoderResult::InputEmpty => break,
                encoding_rs::CoderResult::OutputFull => {
                    out.reserve(self.decoder.max_utf8_buffer_length(bytes.len() - pos).unwrap_or(64))
                }
            }
        }

        out
    }

    /// Flushes any buffered trail bytes.
    pub fn finish(&mut self) -> String {
        self.push(&[], true)
    }
}

#[cfg(test)]
mod tests {
    use super::{decode_charset, TextDecoder};

    #[test]
    fn decode_charsets() {
        let inputs: &[(&str, &[u8], &str)] = &[
            ("utf-8", b"caf\xc3\xa9", "café"),
            ("iso-8859-1", b"\xe1\xe9\xed\xf3\xfa", "áéíóú"),
            ("ISO-8859-6", b"\xe5\xd1\xcd\xc8\xc7", "مرحبا"),
            ("koi8-r", b"\xf0\xd2\xc9\xd7\xc5\xd4", "Привет"),
            ("windows-1252", b"\x93quoted\x94", "“quoted”"),
            ("utf-16be", b"\x30\xcf\x30\xed", "ハロ"),
            ("shift_jis", b"\x83n\x83\x8d", "ハロ"),
        ];

        for (label, bytes, expected) in inputs {
            assert_eq!(
                decode_charset(label, bytes).as_deref(),
                Some(*expected),
                "failed for {label}"
            );
        }

        assert_eq!(decode_charset("not-a-charset", b"abc"), None);
    }

    #[test]
    fn decode_streaming() {
        // A multi-byte sequence split across three pushes
        let mut decoder = TextDecoder::for_label("utf-8").unwrap();
        let mut text = String::new();
        text.push_str(&decoder.push(b"caf\xc3", false));
        text.push_str(&decoder.push(b"\xa9 \xe2\x82", false));
        text.push_str(&decoder.push(b"\xac", false));
        text.push_str(&decoder.finish());
        assert_eq!(text, "café €");
    }
}
