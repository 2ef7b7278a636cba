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

use crate::parsers::encoded_word::decode_rfc2047;

/// Decodes an unstructured header body: RFC2047 encoded-words are replaced
/// by their Unicode text, everything else is kept as-is.
pub fn parse_unstructured(value: &str) -> String {
    decode_rfc2047(value.trim())
}
