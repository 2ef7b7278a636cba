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

use std::collections::HashMap;

use crate::decoders::charsets::decode_charset;
use crate::decoders::hex::decode_hex;
use crate::parsers::tokenizer::{tokenize, Token, TokenizerOpts};
use crate::ContentType;

/// How a parameter name was spelled.
enum ParamName {
    // foo
    Plain(String),
    // foo*  (value is charset'language'percent-bytes)
    Extended(String),
    // foo*N or foo*N*
    Continuation(String, u32, bool),
    // foo*junk: continuation-shaped, but the section index does not parse
    BadContinuation(String),
}

fn classify(name: &str) -> Option<ParamName> {
    let name = name.to_ascii_lowercase();
    match name.split_once('*') {
        None => Some(ParamName::Plain(name)),
        Some((base, "")) if !base.is_empty() => Some(ParamName::Extended(base.to_string())),
        Some((base, rest)) if !base.is_empty() => {
            let (digits, encoded) = match rest.strip_suffix('*') {
                Some(digits) => (digits, true),
                None => (rest, false),
            };
            // No leading zeros, except for section zero itself
            if digits.is_empty()
                || (digits.len() > 1 && digits.starts_with('0'))
                || !digits.bytes().all(|ch| ch.is_ascii_digit())
            {
                return Some(ParamName::BadContinuation(base.to_string()));
            }
            match digits.parse::<u32>() {
                Ok(index) => Some(ParamName::Continuation(base.to_string(), index, encoded)),
                Err(_) => Some(ParamName::BadContinuation(base.to_string())),
            }
        }
        _ => None,
    }
}

/// Splits a `charset'language'value` triple, discarding the language.
fn split_charset_value(value: &str) -> Option<(&str, &str)> {
    let (charset, rest) = value.split_once('\'')?;
    let (_language, value) = rest.split_once('\'')?;
    Some((charset, value))
}

#[derive(Default)]
struct Continuation {
    // index -> (encoded, value); None marks a poisoned entry
    segments: Option<HashMap<u32, (bool, String)>>,
}

impl Continuation {
    fn insert(&mut self, index: u32, encoded: bool, value: String) {
        if let Some(segments) = &mut self.segments {
            if segments.insert(index, (encoded, value)).is_some() {
                // A repeated section index invalidates the whole entry
                self.poison();
            }
        }
    }

    // A bad section index invalidates the whole entry as well
    fn poison(&mut self) {
        self.segments = None;
    }

    fn assemble(self) -> Option<String> {
        let mut segments = self.segments?;
        if !segments.contains_key(&0) {
            return None;
        }

        let mut charset = None;
        let mut bytes = Vec::new();
        for index in 0..segments.len() as u32 {
            // Sections numbered 0..k have to be contiguous
            let (encoded, value) = segments.remove(&index)?;
            if encoded {
                let value = if index == 0 && charset.is_none() {
                    match split_charset_value(&value) {
                        Some((label, rest)) => {
                            charset = Some(label.to_string());
                            rest.to_string()
                        }
                        None => value,
                    }
                } else {
                    value
                };
                bytes.extend(decode_hex(value.as_bytes()));
            } else {
                bytes.extend_from_slice(value.as_bytes());
            }
        }

        match charset {
            Some(label) => decode_charset(&label, &bytes),
            None => Some(String::from_utf8_lossy(&bytes).into_owned()),
        }
    }
}

fn continuation_entry(
    continuations: &mut Vec<(String, Continuation)>,
    name: String,
) -> &mut Continuation {
    if let Some(pos) = continuations.iter().position(|(key, _)| *key == name) {
        &mut continuations[pos].1
    } else {
        continuations.push((
            name,
            Continuation {
                segments: Some(HashMap::new()),
            },
        ));
        &mut continuations.last_mut().unwrap().1
    }
}

fn upsert(params: &mut Vec<(String, String)>, name: String, value: String) {
    if let Some((_, old)) = params.iter_mut().find(|(key, _)| *key == name) {
        *old = value;
    } else {
        params.push((name, value));
    }
}

/// Decodes a parameterized header value into the token preceding the first
/// `;` and an ordered, case-insensitive parameter map.
///
/// RFC2231 continuations are reassembled and charset-extended values are
/// decoded when `rfc2231` is set; parameters in an unknown charset are
/// dropped, as are fragments that do not form a `name=value` pair.
pub fn parse_parameters(value: &str, rfc2231: bool, rfc2047: bool) -> (String, Vec<(String, String)>) {
    let (pre, rest) = match value.find(';') {
        Some(semi) => (&value[..semi], &value[semi..]),
        None => (value, ""),
    };
    let pre_semi = pre.trim().split_whitespace().next().unwrap_or("").to_string();

    let opts = TokenizerOpts {
        qstring: true,
        rfc2047,
        ..Default::default()
    };

    // name = value fragments between semicolons
    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut fragment: Vec<Token<'_>> = Vec::new();
    let mut tokens = tokenize(rest, ";=", opts);
    tokens.push(Token::Delimiter(';'));

    for token in tokens {
        if token.is_delimiter(';') {
            match fragment.as_slice() {
                [Token::Atom(name), eq, values @ ..]
                    if eq.is_delimiter('=') && !values.is_empty() =>
                {
                    let value = values
                        .iter()
                        .map(|token| token.to_string())
                        .collect::<Vec<_>>()
                        .join(" ");
                    pairs.push((name.to_string(), value));
                }
                [] => (),
                _ => log::debug!("dropping malformed parameter fragment"),
            }
            fragment.clear();
        } else {
            fragment.push(token);
        }
    }

    // Lowest priority first: plain values, then assembled continuations,
    // then single-section charset-extended values.
    let mut plain = Vec::new();
    let mut extended = Vec::new();
    let mut continuations: Vec<(String, Continuation)> = Vec::new();

    for (name, value) in pairs {
        if !rfc2231 {
            if let Some(ParamName::Plain(name)) = classify(&name) {
                plain.push((name, value));
            }
            continue;
        }
        match classify(&name) {
            Some(ParamName::Plain(name)) => plain.push((name, value)),
            Some(ParamName::Extended(name)) => extended.push((name, value)),
            Some(ParamName::Continuation(name, index, encoded)) => {
                continuation_entry(&mut continuations, name).insert(index, encoded, value);
            }
            Some(ParamName::BadContinuation(name)) => {
                log::debug!("bad section index invalidates parameter {name:?}");
                continuation_entry(&mut continuations, name).poison();
            }
            None => log::debug!("dropping parameter with malformed name"),
        }
    }

    let mut params = Vec::new();
    for (name, value) in plain {
        upsert(&mut params, name, value);
    }
    for (name, entry) in continuations {
        match entry.assemble() {
            Some(value) => upsert(&mut params, name, value),
            None => log::debug!("dropping invalid parameter continuation {name:?}"),
        }
    }
    for (name, value) in extended {
        match split_charset_value(&value)
            .and_then(|(label, rest)| decode_charset(label, &decode_hex(rest.as_bytes())))
        {
            Some(value) => upsert(&mut params, name, value),
            None => log::debug!("dropping extended parameter {name:?} with unknown charset"),
        }
    }

    (pre_semi, params)
}

/// Decodes a Content-Type value. Anything that does not split into exactly
/// `type/subtype` collapses to `text/plain` with no parameters.
pub fn parse_content_type(value: &str) -> ContentType {
    let (pre_semi, params) = parse_parameters(value, true, false);

    let mut parts = pre_semi.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(c_type), Some(c_subtype), None) if !c_type.is_empty() => ContentType {
            c_type: c_type.to_ascii_lowercase(),
            c_subtype: c_subtype.to_ascii_lowercase(),
            attributes: params,
        },
        _ => {
            log::debug!("malformed content type {pre_semi:?}");
            ContentType {
                c_type: "text".to_string(),
                c_subtype: "plain".to_string(),
                attributes: Vec::new(),
            }
        }
    }
}
