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

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use thiserror::Error;

use crate::emitters::{fields as writers, EmitterError, HeaderEmitter};
use crate::parsers::encoded_word::decode_rfc2047;
use crate::parsers::fields::address::parse_address_list;
use crate::parsers::fields::date::parse_date;
use crate::parsers::fields::params::{parse_content_type, parse_parameters};
use crate::parsers::fields::unstructured::parse_unstructured;
use crate::{ContentType, HeaderValue};

/// Decodes the raw occurrences of one header into a structured value.
pub type HeaderDecoderFnc = fn(&[String]) -> HeaderValue;

/// Writes a structured value through the emitter.
pub type HeaderEncoderFnc = fn(&mut HeaderEmitter<'_>, &HeaderValue) -> Result<(), EmitterError>;

/// Decoder, encoder and preferred spelling of one structured header.
#[derive(Clone)]
pub struct HeaderSpec {
    pub preferred: Cow<'static, str>,
    pub decoder: HeaderDecoderFnc,
    pub encoder: Option<HeaderEncoderFnc>,
    builtin: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("cannot replace built-in structured header {0:?}")]
    BuiltIn(String),
}

fn registry() -> &'static RwLock<HashMap<String, HeaderSpec>> {
    static REGISTRY: OnceLock<RwLock<HashMap<String, HeaderSpec>>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(builtin_headers()))
}

/// Registers a structured header. Built-in entries are permanent; trying to
/// replace one fails. Registration should happen before concurrent use.
pub fn register_header(
    name: &str,
    preferred: &str,
    decoder: HeaderDecoderFnc,
    encoder: Option<HeaderEncoderFnc>,
) -> Result<(), RegistryError> {
    let lower = name.to_ascii_lowercase();
    let mut map = registry().write().unwrap();
    if map.get(&lower).is_some_and(|spec| spec.builtin) {
        return Err(RegistryError::BuiltIn(lower));
    }
    map.insert(
        lower,
        HeaderSpec {
            preferred: Cow::Owned(preferred.to_string()),
            decoder,
            encoder,
            builtin: false,
        },
    );
    Ok(())
}

pub(crate) fn lookup(name: &str) -> Option<HeaderSpec> {
    registry()
        .read()
        .unwrap()
        .get(&name.to_ascii_lowercase())
        .cloned()
}

/// Decodes raw header occurrences, falling back to the verbatim text for
/// names without a registered decoder.
pub(crate) fn decode_value(name: &str, values: &[String]) -> HeaderValue {
    match lookup(name) {
        Some(spec) => (spec.decoder)(values),
        None => HeaderValue::TextList(values.to_vec()),
    }
}

/// The output spelling for a header name: the registered preferred form, or
/// the name with the first letter of every word capitalized.
pub(crate) fn preferred_spelling(name: &str) -> String {
    match lookup(name) {
        Some(spec) => spec.preferred.into_owned(),
        None => capitalize_name(name),
    }
}

pub(crate) fn capitalize_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut at_word_start = true;
    for ch in name.chars() {
        if at_word_start {
            result.extend(ch.to_uppercase());
        } else {
            result.push(ch);
        }
        at_word_start = !ch.is_ascii_alphanumeric();
    }
    result
}

fn decode_addresses(values: &[String]) -> HeaderValue {
    let addresses = values
        .iter()
        .flat_map(|value| parse_address_list(value, true))
        .collect::<Vec<_>>();
    if addresses.is_empty() {
        HeaderValue::Empty
    } else {
        HeaderValue::AddressList(addresses)
    }
}

fn decode_content_type(values: &[String]) -> HeaderValue {
    match values.first() {
        Some(value) => HeaderValue::ContentType(parse_content_type(value)),
        None => HeaderValue::Empty,
    }
}

fn decode_disposition(values: &[String]) -> HeaderValue {
    match values.first() {
        Some(value) => {
            let (pre_semi, attributes) = parse_parameters(value, true, false);
            HeaderValue::ContentType(ContentType {
                c_type: pre_semi.to_ascii_lowercase(),
                c_subtype: String::new(),
                attributes,
            })
        }
        None => HeaderValue::Empty,
    }
}

fn decode_date(values: &[String]) -> HeaderValue {
    match values.first() {
        Some(value) => HeaderValue::DateTime(parse_date(value)),
        None => HeaderValue::Empty,
    }
}

fn decode_unstructured(values: &[String]) -> HeaderValue {
    HeaderValue::TextList(
        values
            .iter()
            .map(|value| parse_unstructured(value))
            .collect(),
    )
}

fn decode_id(values: &[String]) -> HeaderValue {
    match values.first() {
        Some(value) => HeaderValue::Text(decode_rfc2047(value.trim())),
        None => HeaderValue::Empty,
    }
}

fn decode_transfer_encoding(values: &[String]) -> HeaderValue {
    match values.first() {
        Some(value) => HeaderValue::Text(value.trim().to_ascii_lowercase()),
        None => HeaderValue::Empty,
    }
}

static ADDRESS_HEADERS: &[(&str, &str)] = &[
    ("approved", "Approved"),
    ("bcc", "Bcc"),
    ("cc", "Cc"),
    ("delivered-to", "Delivered-To"),
    ("disposition-notification-to", "Disposition-Notification-To"),
    ("from", "From"),
    ("mail-followup-to", "Mail-Followup-To"),
    ("mail-reply-to", "Mail-Reply-To"),
    ("reply-to", "Reply-To"),
    ("resent-bcc", "Resent-Bcc"),
    ("resent-cc", "Resent-Cc"),
    ("resent-from", "Resent-From"),
    ("resent-reply-to", "Resent-Reply-To"),
    ("resent-sender", "Resent-Sender"),
    ("resent-to", "Resent-To"),
    ("return-receipt-to", "Return-Receipt-To"),
    ("sender", "Sender"),
    ("to", "To"),
];

static UNSTRUCTURED_HEADERS: &[(&str, &str)] = &[
    ("comments", "Comments"),
    ("content-description", "Content-Description"),
    ("keywords", "Keywords"),
    ("mime-version", "MIME-Version"),
    ("subject", "Subject"),
    ("user-agent", "User-Agent"),
];

static DATE_HEADERS: &[(&str, &str)] = &[
    ("date", "Date"),
    ("expires", "Expires"),
    ("injection-date", "Injection-Date"),
    ("nntp-posting-date", "NNTP-Posting-Date"),
    ("resent-date", "Resent-Date"),
];

fn builtin_headers() -> HashMap<String, HeaderSpec> {
    let mut map = HashMap::new();
    let mut add = |name: &str, preferred: &'static str, decoder: HeaderDecoderFnc, encoder| {
        map.insert(
            name.to_string(),
            HeaderSpec {
                preferred: Cow::Borrowed(preferred),
                decoder,
                encoder,
                builtin: true,
            },
        );
    };

    for &(name, preferred) in ADDRESS_HEADERS {
        add(
            name,
            preferred,
            decode_addresses,
            Some(writers::encode_address_list as HeaderEncoderFnc),
        );
    }
    for &(name, preferred) in UNSTRUCTURED_HEADERS {
        add(
            name,
            preferred,
            decode_unstructured,
            Some(writers::encode_unstructured as HeaderEncoderFnc),
        );
    }
    for &(name, preferred) in DATE_HEADERS {
        add(
            name,
            preferred,
            decode_date,
            Some(writers::encode_date as HeaderEncoderFnc),
        );
    }

    add(
        "content-type",
        "Content-Type",
        decode_content_type,
        Some(writers::encode_parameterized as HeaderEncoderFnc),
    );
    add(
        "content-disposition",
        "Content-Disposition",
        decode_disposition,
        Some(writers::encode_parameterized as HeaderEncoderFnc),
    );
    add(
        "message-id",
        "Message-ID",
        decode_id,
        Some(writers::encode_unstructured as HeaderEncoderFnc),
    );
    add(
        "resent-message-id",
        "Resent-Message-ID",
        decode_id,
        Some(writers::encode_unstructured as HeaderEncoderFnc),
    );
    add(
        "content-transfer-encoding",
        "Content-Transfer-Encoding",
        decode_transfer_encoding,
        Some(writers::encode_unstructured as HeaderEncoderFnc),
    );

    map
}

#[cfg(test)]
mod tests {
    use super::{capitalize_name, decode_value, lookup, register_header, RegistryError};
    use crate::{Addr, Address, HeaderValue};

    fn decode_custom(values: &[String]) -> HeaderValue {
        HeaderValue::Text(values.join("|"))
    }

    #[test]
    fn builtin_headers_locked() {
        assert_eq!(
            register_header("Subject", "SUBJECT", decode_custom, None),
            Err(RegistryError::BuiltIn("subject".to_string()))
        );
        assert_eq!(
            register_header("content-type", "CT", decode_custom, None),
            Err(RegistryError::BuiltIn("content-type".to_string()))
        );
    }

    #[test]
    fn register_custom_header() {
        register_header("X-Spam-Score", "X-Spam-Score", decode_custom, None).unwrap();
        assert_eq!(
            decode_value("x-spam-score", &["a".to_string(), "b".to_string()]),
            HeaderValue::Text("a|b".to_string())
        );
        // Re-registering a non-builtin entry is allowed
        register_header("x-spam-score", "X-SPAM-Score", decode_custom, None).unwrap();
        assert_eq!(
            lookup("x-spam-score").unwrap().preferred.as_ref(),
            "X-SPAM-Score"
        );
    }

    #[test]
    fn decode_builtin_values() {
        assert_eq!(
            decode_value("to", &["a@x".to_string()]),
            HeaderValue::AddressList(vec![Address::Addr(Addr::new(None, "a@x"))])
        );
        assert_eq!(
            decode_value("content-transfer-encoding", &["Base64".to_string()]),
            HeaderValue::Text("base64".to_string())
        );
        assert_eq!(
            decode_value("subject", &["=?UTF-8?B?w6k=?=".to_string()]),
            HeaderValue::TextList(vec!["é".to_string()])
        );
        // Unregistered names fall back to the verbatim text
        assert_eq!(
            decode_value("x-unknown-header", &["raw".to_string()]),
            HeaderValue::TextList(vec!["raw".to_string()])
        );
    }

    #[test]
    fn capitalize_names() {
        assert_eq!(capitalize_name("x-custom-header"), "X-Custom-Header");
        assert_eq!(capitalize_name("approved"), "Approved");
        assert_eq!(capitalize_name("x-123abc"), "X-123abc");
    }
}
