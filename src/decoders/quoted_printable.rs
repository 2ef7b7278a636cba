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

use crate::decoders::hex::hex_digit;

#[derive(Debug, Default, PartialEq, Clone, Copy)]
enum QuotedPrintableState {
    #[default]
    None,
    Eq,
    EqCr,
    Hex1(u8),
}

/// Streaming RFC2045 quoted-printable decoder.
///
/// Input may be split anywhere, including between `=` and its hex digits;
/// the pending escape and trailing whitespace run are carried across calls.
/// Invalid escape sequences are emitted literally.
#[derive(Debug, Default)]
pub struct QuotedPrintableDecoder {
    state: QuotedPrintableState,
    ws: Vec<u8>,
}

impl QuotedPrintableDecoder {
    pub fn decode(&mut self, input: &[u8], out: &mut Vec<u8>, last: bool) {
        for &ch in input {
            match self.state {
                QuotedPrintableState::Eq => match ch {
                    b'\r' => {
                        self.state = QuotedPrintableState::EqCr;
                    }
                    b'\n' => {
                        self.state = QuotedPrintableState::None;
                    }
                    _ => {
                        if let Some(hex1) = hex_digit(ch) {
                            self.state = QuotedPrintableState::Hex1(hex1);
                        } else {
                            out.push(b'=');
                            self.state = QuotedPrintableState::None;
                            self.push_plain(ch, out);
                        }
                    }
                },
                QuotedPrintableState::EqCr => {
                    self.state = QuotedPrintableState::None;
                    if ch != b'\n' {
                        out.extend_from_slice(b"=\r");
                        self.push_plain(ch, out);
                    }
                }
                QuotedPrintableState::Hex1(hex1) => {
                    self.state = QuotedPrintableState::None;
                    if let Some(hex2) = hex_digit(ch) {
                        out.push((hex1 << 4) | hex2);
                    } else {
                        out.push(b'=');
                        out.push(hex_char(hex1));
                        self.push_plain(ch, out);
                    }
                }
                QuotedPrintableState::None => self.push_plain(ch, out),
            }
        }

        if last {
            match self.state {
                QuotedPrintableState::Eq => out.push(b'='),
                QuotedPrintableState::EqCr => out.extend_from_slice(b"=\r"),
                QuotedPrintableState::Hex1(hex1) => {
                    out.push(b'=');
                    out.push(hex_char(hex1));
                }
                QuotedPrintableState::None => (),
            }
            self.state = QuotedPrintableState::None;
            out.append(&mut self.ws);
        }
    }

    fn push_plain(&mut self, ch: u8, out: &mut Vec<u8>) {
        match ch {
            b'=' => {
                out.append(&mut self.ws);
                self.state = QuotedPrintableState::Eq;
            }
            // Trailing whitespace before a hard line break is transport padding
            b'\r' | b'\n' => {
                self.ws.clear();
                out.push(ch);
            }
            b' ' | b'\t' => self.ws.push(ch),
            _ => {
                out.append(&mut self.ws);
                out.push(ch);
            }
        }
    }
}

#[inline(always)]
fn hex_char(digit: u8) -> u8 {
    if digit < 10 {
        digit + b'0'
    } else {
        digit - 10 + b'A'
    }
}

/// Decodes the Q encoding of an RFC2047 encoded-word, where `_` stands
/// for space.
pub fn decode_q_word(text: &str) -> Vec<u8> {
    let mut decoder = QuotedPrintableDecoder::default();
    let mut out = Vec::with_capacity(text.len());
    let input = text
        .bytes()
        .map(|ch| if ch == b'_' { b' ' } else { ch })
        .collect::<Vec<_>>();
    decoder.decode(&input, &mut out, true);
    out
}

#[cfg(test)]
mod tests {
    use super::{decode_q_word, QuotedPrintableDecoder};

    fn decode_all(chunks: &[&[u8]]) -> Vec<u8> {
        let mut decoder = QuotedPrintableDecoder::default();
        let mut out = Vec::new();
        for (pos, chunk) in chunks.iter().enumerate() {
            decoder.decode(chunk, &mut out, pos == chunks.len() - 1);
        }
        out
    }

    #[test]
    fn decode_quoted_printable() {
        let inputs: &[(&[&[u8]], &[u8])] = &[
            (&[b"J'interdis =C3=A0"], b"J'interdis \xc3\xa0".as_ref()),
            (&[b"soft =\r\nbreak"], b"soft break"),
            (&[b"soft =\nbreak"], b"soft break"),
            (&[b"hard break  \r\nkept"], b"hard break\r\nkept"),
            (&[b"literal = sign"], b"literal = sign"),
            (&[b"bad =Zx escape"], b"bad =Zx escape"),
            (&[b"trailing ="], b"trailing ="),
            (&[b"=46=6F=6F"], b"Foo"),
        ];

        for (chunks, expected) in inputs {
            assert_eq!(&decode_all(chunks), expected, "failed for {chunks:?}");
        }
    }

    #[test]
    fn decode_across_chunks() {
        // The same octets split in the middle of an escape sequence
        let whole = decode_all(&[b"caf=C3=A9 time"]);
        for split in [b"caf=".as_ref(), b"caf=C", b"caf=C3=", b"caf=C3=A"] {
            let rest = &b"caf=C3=A9 time"[split.len()..];
            assert_eq!(
                decode_all(&[split, rest]),
                whole,
                "failed when split after {split:?}"
            );
        }
    }

    #[test]
    fn decode_q_encoding() {
        let inputs: &[(&str, &[u8])] = &[
            ("this=20is=20some=20text", b"this is some text"),
            ("Keith_Moore", b"Keith Moore"),
            ("Keld_J=F8rn_Simonsen", b"Keld J\xf8rn Simonsen"),
        ];

        for (input, expected) in inputs {
            assert_eq!(&decode_q_word(input), expected, "failed for {input:?}");
        }
    }
}
