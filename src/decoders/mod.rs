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

pub mod base64;
pub mod charsets;
pub mod hex;
pub mod quoted_printable;

use crate::decoders::base64::Base64Decoder;
use crate::decoders::quoted_printable::QuotedPrintableDecoder;

/// A stateful content converter applied to body octets before delivery.
///
/// Converters carry partial state (an unfinished base64 quantum, a pending
/// `=` escape, a withheld line break) across arbitrarily split input chunks;
/// `last = true` flushes whatever remains.
#[derive(Debug, Default)]
pub enum ContentDecoder {
    #[default]
    None,
    QuotedPrintable(QuotedPrintableDecoder),
    Base64(Base64Decoder),
    WithholdCrlf(CrlfWithholder),
}

impl ContentDecoder {
    pub fn quoted_printable() -> Self {
        ContentDecoder::QuotedPrintable(QuotedPrintableDecoder::default())
    }

    pub fn base64() -> Self {
        ContentDecoder::Base64(Base64Decoder::default())
    }

    pub fn withhold_crlf() -> Self {
        ContentDecoder::WithholdCrlf(CrlfWithholder::default())
    }

    pub fn decode(&mut self, input: &[u8], out: &mut Vec<u8>, last: bool) {
        match self {
            ContentDecoder::None => out.extend_from_slice(input),
            ContentDecoder::QuotedPrintable(decoder) => decoder.decode(input, out, last),
            ContentDecoder::Base64(decoder) => decoder.decode(input, out, last),
            ContentDecoder::WithholdCrlf(withholder) => withholder.push(input, out, last),
        }
    }

    /// Discards a withheld trailing line break, if the converter holds one.
    pub fn drop_pending_crlf(&mut self) {
        if let ContentDecoder::WithholdCrlf(withholder) = self {
            withholder.held.clear();
        }
    }
}

/// Withholds a trailing bare CR/LF from each chunk so that the line break
/// preceding a MIME boundary is never delivered as part body data.
#[derive(Debug, Default)]
pub struct CrlfWithholder {
    held: Vec<u8>,
}

impl CrlfWithholder {
    pub fn push(&mut self, input: &[u8], out: &mut Vec<u8>, last: bool) {
        out.append(&mut self.held);

        let keep = if input.ends_with(b"\r\n") {
            2
        } else if input.ends_with(b"\n") || input.ends_with(b"\r") {
            1
        } else {
            0
        };
        out.extend_from_slice(&input[..input.len() - keep]);
        self.held.extend_from_slice(&input[input.len() - keep..]);

        if last {
            out.append(&mut self.held);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ContentDecoder;

    #[test]
    fn withhold_trailing_crlf() {
        let inputs: &[(&[&[u8]], &[u8], &[u8])] = &[
            (&[b"body\r\n"], b"body", b"\r\n"),
            (&[b"body\r\n", b"more\n"], b"body\r\nmore", b"\n"),
            (&[b"line1\r\n\r\n"], b"line1\r\n", b"\r\n"),
            (&[b"no break"], b"no break", b""),
        ];

        for (chunks, expected, held) in inputs {
            let mut decoder = ContentDecoder::withhold_crlf();
            let mut out = Vec::new();
            for chunk in chunks.iter() {
                decoder.decode(chunk, &mut out, false);
            }
            assert_eq!(&out, expected);

            let mut flushed = Vec::new();
            decoder.decode(b"", &mut flushed, true);
            assert_eq!(&flushed, held);
        }
    }

    #[test]
    fn drop_pending_crlf() {
        let mut decoder = ContentDecoder::withhold_crlf();
        let mut out = Vec::new();
        decoder.decode(b"body\r\n", &mut out, false);
        decoder.drop_pending_crlf();
        decoder.decode(b"", &mut out, true);
        assert_eq!(out, b"body");
    }
}
