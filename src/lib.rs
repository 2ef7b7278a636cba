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

//! # mail-stream
//!
//! _mail-stream_ is a **streaming e-mail library** written in Rust that parses
//! MIME messages (_RFC 5322_ / _RFC 2045 - 2049_) as the raw octets arrive and
//! serializes structured header values back to wire form with proper line
//! folding and encoded-word generation (_RFC 2047_ / _RFC 2231_).
//!
//! Unlike tree-building parsers that require the whole message up front, the
//! [`MimeParser`](parsers::message::MimeParser) is a push interface: the caller
//! delivers byte chunks of any size and receives callbacks as body parts open,
//! produce data and close. Chunk boundaries carry no meaning; a message split
//! at every byte offset produces the same callback sequence as a single
//! delivery. Nested `multipart/*` containers and embedded `message/rfc822`
//! parts are parsed recursively and identified by part numbers such as `2.1`
//! or `1$`.
//!
//! This library abides by Postel's law: a best effort is made to parse
//! non-conformant messages, and malformed header fragments are dropped or
//! passed through raw rather than aborting the parse.
//!
//! ## Conformed RFCs
//!
//! - [RFC 5322 - Internet Message Format](https://datatracker.ietf.org/doc/html/rfc5322)
//! - [RFC 2045 - MIME Part One: Format of Internet Message Bodies](https://datatracker.ietf.org/doc/html/rfc2045)
//! - [RFC 2046 - MIME Part Two: Media Types](https://datatracker.ietf.org/doc/html/rfc2046)
//! - [RFC 2047 - MIME Part Three: Message Header Extensions for Non-ASCII Text](https://datatracker.ietf.org/doc/html/rfc2047)
//! - [RFC 2231 - MIME Parameter Value and Encoded Word Extensions](https://datatracker.ietf.org/doc/html/rfc2231)
//! - [RFC 2183 - The Content-Disposition Header Field](https://datatracker.ietf.org/doc/html/rfc2183)
//!
//! ## Usage Example
//!
//! ```
//! use mail_stream::parsers::message::{MessageListener, MimeParser, ParserOptions};
//! use mail_stream::StructuredHeaders;
//!
//! #[derive(Default)]
//! struct Subjects(Vec<String>);
//!
//! impl MessageListener for Subjects {
//!     fn start_part(&mut self, _part: &str, headers: &StructuredHeaders) {
//!         if let Some(value) = headers.get("subject") {
//!             self.0.extend(value.into_text_list());
//!         }
//!     }
//! }
//!
//! let mut listener = Subjects::default();
//! let mut parser = MimeParser::new(ParserOptions::default());
//! parser.deliver_data(&mut listener, b"Subject: =?UTF-8?B?w6k=?=\r\n\r\nBody\r\n");
//! parser.deliver_eof(&mut listener);
//!
//! assert_eq!(listener.0, ["é"]);
//! ```

pub mod core;
pub mod decoders;
pub mod emitters;
pub mod parsers;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub use crate::core::header::StructuredHeaders;
pub use crate::core::registry::{register_header, HeaderSpec, RegistryError};
pub use crate::emitters::{EmitterError, EmitterOptions, HeaderEmitter, HeaderSink};
pub use crate::parsers::message::{
    BodyFormat, MessageListener, MimeParser, ParserOptions, PartData, StrFormat,
};

/// An RFC5322 mailbox.
#[derive(Debug, Default, PartialEq, Eq, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Addr {
    /// The display name, with comments folded in.
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: Option<String>,

    /// The e-mail address.
    #[cfg_attr(feature = "serde", serde(default))]
    pub address: Option<String>,
}

impl Addr {
    pub fn new(name: Option<&str>, address: &str) -> Self {
        Addr {
            name: name.map(|name| name.to_string()),
            address: Some(address.to_string()),
        }
    }
}

/// An RFC5322 address group.
#[derive(Debug, Default, PartialEq, Eq, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Group {
    /// The group display name.
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: Option<String>,

    /// The mailboxes of the group.
    #[cfg_attr(feature = "serde", serde(default))]
    pub addresses: Vec<Addr>,
}

impl Group {
    pub fn new(name: &str, addresses: Vec<Addr>) -> Self {
        Group {
            name: Some(name.to_string()),
            addresses,
        }
    }
}

/// A mailbox or a group, as they appear interleaved in an address list.
#[derive(Debug, PartialEq, Eq, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Address {
    Addr(Addr),
    Group(Group),
}

/// An RFC2045 Content-Type or other parameterized header value.
///
/// The media type, subtype and attribute names are stored lower-cased;
/// attribute order is preserved.
#[derive(Debug, Default, PartialEq, Eq, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContentType {
    pub c_type: String,
    pub c_subtype: String,
    pub attributes: Vec<(String, String)>,
}

impl ContentType {
    pub fn new(c_type: &str, c_subtype: &str) -> Self {
        ContentType {
            c_type: c_type.to_string(),
            c_subtype: c_subtype.to_string(),
            attributes: Vec::new(),
        }
    }

    /// Returns the media type, e.g. `multipart`.
    pub fn ctype(&self) -> &str {
        &self.c_type
    }

    /// Returns the media subtype, e.g. `mixed`.
    pub fn subtype(&self) -> &str {
        &self.c_subtype
    }

    /// Returns `type/subtype`, or just the type when no subtype is present.
    pub fn full_type(&self) -> String {
        if self.c_subtype.is_empty() {
            self.c_type.clone()
        } else {
            format!("{}/{}", self.c_type, self.c_subtype)
        }
    }

    /// Case-insensitive attribute lookup.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }
}

/// An RFC5322 datetime field, normalized to UTC.
///
/// `DateTime::invalid()` is the sentinel produced when a date header cannot
/// be recovered; `is_valid()` reports it.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

/// A decoded header value.
#[derive(Debug, PartialEq, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum HeaderValue {
    /// Mailboxes and groups, in source order.
    AddressList(Vec<Address>),

    /// A Content-Type or other parameterized value.
    ContentType(ContentType),

    /// A datetime, or the invalid sentinel when the field could not be parsed.
    DateTime(DateTime),

    /// A single decoded text value.
    Text(String),

    /// One decoded text value per header occurrence.
    TextList(Vec<String>),

    #[default]
    Empty,
}

impl HeaderValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, HeaderValue::Empty)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            HeaderValue::Text(text) => Some(text),
            HeaderValue::TextList(list) => list.first().map(|text| text.as_str()),
            _ => None,
        }
    }

    pub fn as_address_list(&self) -> Option<&[Address]> {
        match self {
            HeaderValue::AddressList(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_content_type(&self) -> Option<&ContentType> {
        match self {
            HeaderValue::ContentType(ct) => Some(ct),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<&DateTime> {
        match self {
            HeaderValue::DateTime(datetime) => Some(datetime),
            _ => None,
        }
    }

    pub fn into_text_list(self) -> Vec<String> {
        match self {
            HeaderValue::Text(text) => vec![text],
            HeaderValue::TextList(list) => list,
            _ => Vec::new(),
        }
    }
}
