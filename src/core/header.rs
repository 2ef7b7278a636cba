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

use std::cell::RefCell;
use std::collections::HashMap;

use crate::core::registry;
use crate::decoders::charsets::decode_charset;
use crate::{ContentType, HeaderValue};

/// A lazy, map-like view over the raw header block of one body part.
///
/// Raw values are kept as the octets found on the wire; structured values
/// are decoded on first access and cached. Changing the fallback charset
/// clears the cache, since it feeds the raw-octet to text conversion.
#[derive(Debug, Clone, Default)]
pub struct StructuredHeaders {
    raw: Vec<u8>,
    names: Vec<String>,
    values: HashMap<String, Vec<Vec<u8>>>,
    cache: RefCell<HashMap<String, HeaderValue>>,
    charset: String,
    default_content_type: ContentType,
}

impl StructuredHeaders {
    /// Parses a raw header block. Folded lines are merged, an mbox `From `
    /// envelope line is removed, and duplicate header names keep every
    /// occurrence in insertion order.
    pub fn parse(
        raw: &[u8],
        strip_continuations: bool,
        charset: &str,
        default_content_type: ContentType,
    ) -> Self {
        let raw = strip_mbox_envelope(raw);

        let mut names = Vec::new();
        let mut values: HashMap<String, Vec<Vec<u8>>> = HashMap::new();

        for line in logical_lines(raw) {
            let (name, value) = match line.iter().position(|&ch| ch == b':') {
                Some(colon) => (&line[..colon], trim_bytes(&line[colon + 1..])),
                None => (line, &[][..]),
            };
            let name = String::from_utf8_lossy(trim_bytes(name)).to_ascii_lowercase();
            if name.is_empty() {
                continue;
            }

            let value = if strip_continuations {
                value
                    .iter()
                    .copied()
                    .filter(|&ch| ch != b'\r' && ch != b'\n')
                    .collect::<Vec<_>>()
            } else {
                value.to_vec()
            };

            if !values.contains_key(&name) {
                names.push(name.clone());
            }
            values.entry(name).or_default().push(value);
        }

        StructuredHeaders {
            raw: raw.to_vec(),
            names,
            values,
            cache: RefCell::new(HashMap::new()),
            charset: charset.to_string(),
            default_content_type,
        }
    }

    /// The raw header block, mbox envelope removed.
    pub fn raw_header_text(&self) -> &[u8] {
        &self.raw
    }

    /// The raw on-wire values of a header, one entry per occurrence.
    pub fn raw_header(&self, name: &str) -> Option<&[Vec<u8>]> {
        self.values
            .get(&name.to_ascii_lowercase())
            .map(|values| values.as_slice())
    }

    pub fn has(&self, name: &str) -> bool {
        self.values.contains_key(&name.to_ascii_lowercase())
    }

    /// The number of distinct header names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// The decoded structured value of a header, cached after the first
    /// access. Names without a registered decoder yield their text verbatim.
    pub fn get(&self, name: &str) -> Option<HeaderValue> {
        let lower = name.to_ascii_lowercase();
        if let Some(value) = self.cache.borrow().get(&lower) {
            return Some(value.clone());
        }

        let raw_values = self.values.get(&lower)?;
        let texts = raw_values
            .iter()
            .map(|raw| self.raw_to_text(raw))
            .collect::<Vec<_>>();
        let value = registry::decode_value(&lower, &texts);
        self.cache.borrow_mut().insert(lower, value.clone());
        Some(value)
    }

    /// The decoded Content-Type, or this part's default when the header is
    /// missing.
    pub fn content_type(&self) -> ContentType {
        match self.get("content-type") {
            Some(HeaderValue::ContentType(content_type)) => content_type,
            _ => self.default_content_type.clone(),
        }
    }

    /// The fallback charset used to read raw header octets.
    pub fn charset(&self) -> &str {
        &self.charset
    }

    /// Replaces the fallback charset and drops all cached decoded values.
    pub fn set_charset(&mut self, charset: &str) {
        self.charset = charset.to_string();
        self.cache.borrow_mut().clear();
    }

    /// Iterates `(preferred spelling, decoded value)` pairs in insertion
    /// order of the header names.
    pub fn iter(&self) -> impl Iterator<Item = (String, HeaderValue)> + '_ {
        self.names.iter().map(|name| {
            (
                registry::preferred_spelling(name),
                self.get(name).unwrap_or_default(),
            )
        })
    }

    fn raw_to_text(&self, raw: &[u8]) -> String {
        if !self.charset.is_empty() {
            if let Some(text) = decode_charset(&self.charset, raw) {
                return text;
            }
        }
        String::from_utf8_lossy(raw).into_owned()
    }
}

fn strip_mbox_envelope(raw: &[u8]) -> &[u8] {
    if raw.starts_with(b"From ") {
        let end = raw
            .iter()
            .position(|&ch| ch == b'\r' || ch == b'\n')
            .map_or(raw.len(), |brk| {
                if raw[brk] == b'\r' && raw.get(brk + 1) == Some(&b'\n') {
                    brk + 2
                } else {
                    brk + 1
                }
            });
        &raw[end..]
    } else {
        raw
    }
}

/// Splits a header block into logical lines: a line break followed by a
/// space or tab continues the previous line.
fn logical_lines(raw: &[u8]) -> Vec<&[u8]> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut pos = 0;

    while pos < raw.len() {
        match raw[pos] {
            b'\r' | b'\n' => {
                let brk = if raw[pos] == b'\r' && raw.get(pos + 1) == Some(&b'\n') {
                    2
                } else {
                    1
                };
                let next = pos + brk;
                if matches!(raw.get(next), Some(b' ') | Some(b'\t')) {
                    pos = next + 1;
                } else {
                    if pos > start {
                        lines.push(&raw[start..pos]);
                    }
                    start = next;
                    pos = next;
                }
            }
            _ => pos += 1,
        }
    }
    if start < raw.len() {
        lines.push(&raw[start..]);
    }
    lines
}

fn trim_bytes(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|ch| !ch.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|ch| !ch.is_ascii_whitespace())
        .map_or(start, |pos| pos + 1);
    &bytes[start..end]
}

#[cfg(test)]
mod tests {
    use super::StructuredHeaders;
    use crate::{Addr, Address, ContentType, HeaderValue};

    fn parse(raw: &[u8]) -> StructuredHeaders {
        StructuredHeaders::parse(raw, true, "", ContentType::new("text", "plain"))
    }

    #[test]
    fn split_header_block() {
        let headers = parse(
            b"Subject: Hello\r\n world\r\nTo: a@x\r\nX-Line: one\r\nX-Line: two\r\n",
        );
        assert_eq!(headers.len(), 3);
        assert!(headers.has("SUBJECT"));
        assert_eq!(
            headers.raw_header("x-line").unwrap(),
            &[b"one".to_vec(), b"two".to_vec()]
        );
        // Folded lines merge and inner breaks are stripped
        assert_eq!(
            headers.get("subject"),
            Some(HeaderValue::TextList(vec!["Hello world".to_string()]))
        );
    }

    #[test]
    fn mbox_envelope_removed() {
        let headers = parse(b"From joe@example.com Fri Nov 21 09:55:06 1997\r\nTo: a@x\r\n");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.raw_header_text(), b"To: a@x\r\n");
    }

    #[test]
    fn missing_colon_is_a_bare_name() {
        let headers = parse(b"BrokenLine\r\nTo: a@x\r\n");
        assert_eq!(headers.raw_header("brokenline").unwrap(), &[Vec::new()]);
    }

    #[test]
    fn decoded_values_are_cached() {
        let headers = parse(b"To: a@x\r\n");
        let first = headers.get("to").unwrap();
        let second = headers.get("to").unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first,
            HeaderValue::AddressList(vec![Address::Addr(Addr::new(None, "a@x"))])
        );
    }

    #[test]
    fn charset_applies_to_raw_octets() {
        let mut headers = StructuredHeaders::parse(
            b"Subject: caf\xe9\r\n",
            true,
            "",
            ContentType::new("text", "plain"),
        );
        assert_eq!(
            headers.get("subject"),
            Some(HeaderValue::TextList(vec!["caf\u{fffd}".to_string()]))
        );

        // Changing the charset clears the cache and re-decodes
        headers.set_charset("iso-8859-1");
        assert_eq!(
            headers.get("subject"),
            Some(HeaderValue::TextList(vec!["café".to_string()]))
        );
    }

    #[test]
    fn content_type_defaults() {
        let headers = StructuredHeaders::parse(
            b"To: a@x\r\n",
            true,
            "",
            ContentType::new("message", "rfc822"),
        );
        assert_eq!(headers.content_type().full_type(), "message/rfc822");

        let headers = parse(b"Content-Type: multipart/mixed; boundary=b\r\n");
        assert_eq!(headers.content_type().attribute("boundary"), Some("b"));
    }

    #[test]
    fn iteration_order_and_spelling() {
        let headers = parse(b"subject: s\r\nx-custom-thing: v\r\nto: a@x\r\n");
        let names = headers.iter().map(|(name, _)| name).collect::<Vec<_>>();
        assert_eq!(names, ["Subject", "X-Custom-Thing", "To"]);
    }
}
