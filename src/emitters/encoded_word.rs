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

use std::fmt::Write;

use base64::engine::general_purpose::STANDARD as base64;
use base64::Engine;

use crate::emitters::{EmitterError, HeaderEmitter};

const B64_PRELUDE: &str = "=?UTF-8?B?";
const QP_PRELUDE: &str = "=?UTF-8?Q?";
const POSTLUDE: &str = "?=";

// Bytes that have to be escaped in the Q encoding
const QP_FORBIDDEN: &[u8] = b"=?_()\"";

#[inline(always)]
fn qp_cost(byte: u8) -> usize {
    if byte < 0x20 || byte >= 0x7F || QP_FORBIDDEN.contains(&byte) {
        3
    } else {
        1
    }
}

fn encode_word(bytes: &[u8]) -> String {
    let b64_len = (bytes.len() + 2) / 3 * 4;
    let qp_len = bytes.iter().map(|&byte| qp_cost(byte)).sum::<usize>();

    let mut word = String::with_capacity(B64_PRELUDE.len() + b64_len.max(qp_len) + POSTLUDE.len());
    if qp_len <= b64_len {
        word.push_str(QP_PRELUDE);
        for &byte in bytes {
            if byte == b' ' {
                word.push('_');
            } else if qp_cost(byte) == 3 {
                let _ = write!(word, "={byte:02X}");
            } else {
                word.push(byte as char);
            }
        }
    } else {
        word.push_str(B64_PRELUDE);
        word.push_str(&base64.encode(bytes));
    }
    word.push_str(POSTLUDE);
    word
}

impl HeaderEmitter<'_> {
    /// Emits `text` as one or more RFC2047 encoded-words, using whichever of
    /// base64 and quoted-printable is shorter for each word.
    ///
    /// The text is encoded as UTF-8 and cut to fit the remaining line budget,
    /// backing up to a UTF-8 start byte so that no multi-byte sequence is
    /// split between two encoded-words.
    pub(crate) fn encode_rfc2047_phrase(
        &mut self,
        text: &str,
        may_break_after: bool,
    ) -> Result<(), EmitterError> {
        let bytes = text.as_bytes();

        // Keep a useful amount of room on the current line
        if self.line_chars() + B64_PRELUDE.len() + 10 > self.soft_margin() {
            self.fold_whole_line();
        }

        let mut start = 0;
        while start < bytes.len() {
            let budget = self
                .soft_margin()
                .saturating_sub(self.line_chars() + B64_PRELUDE.len() + POSTLUDE.len());

            let mut b64_len = 0;
            let mut qp_len = 0;
            let mut end = bytes.len();
            for pos in start..bytes.len() {
                b64_len = (pos - start + 3) / 3 * 4;
                qp_len += qp_cost(bytes[pos]);
                if b64_len > budget && qp_len > budget {
                    // Back up to a UTF-8 start byte
                    let mut cut = pos;
                    while cut > start && bytes[cut] & 0xC0 == 0x80 {
                        cut -= 1;
                    }
                    if cut == start {
                        // Too narrow for even one character; take it whole
                        cut = pos + 1;
                        while cut < bytes.len() && bytes[cut] & 0xC0 == 0x80 {
                            cut += 1;
                        }
                    }
                    end = cut;
                    break;
                }
            }

            let word = encode_word(&bytes[start..end]);
            if end < bytes.len() {
                self.add_text(&word, false)?;
                // Adjacent encoded-words are rejoined by the folding space
                self.fold_whole_line();
            } else {
                self.add_text(&word, may_break_after)?;
            }
            start = end;
        }

        Ok(())
    }
}
