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

use crate::core::header::StructuredHeaders;
use crate::decoders::charsets::TextDecoder;
use crate::decoders::ContentDecoder;
use crate::{ContentType, HeaderValue};

/// Callbacks invoked as the parser walks the MIME tree. All methods have
/// empty defaults.
///
/// For any part P, `start_part` precedes every `part_data` and `end_part`
/// for P, and descendant parts are fully delivered before the parent's
/// remaining data and `end_part`. Data chunk boundaries carry no meaning.
pub trait MessageListener {
    fn start_message(&mut self) {}
    fn end_message(&mut self) {}
    fn start_part(&mut self, _part_num: &str, _headers: &StructuredHeaders) {}
    fn end_part(&mut self, _part_num: &str) {}
    fn part_data(&mut self, _part_num: &str, _data: PartData) {}
}

/// One chunk of body data.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum PartData {
    Bytes(Vec<u8>),
    Text(String),
}

/// What to do with body octets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyFormat {
    /// Deliver no body data at all.
    None,
    /// Deliver the body exactly as on the wire.
    Raw,
    /// Deliver the body without decoding the transfer encoding.
    #[default]
    NoDecode,
    /// Decode quoted-printable and base64 transfer encodings.
    Decode,
}

/// How decoded body data is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrFormat {
    /// Raw octets.
    #[default]
    BinaryString,
    /// Text parts are decoded to Unicode using the resolved charset; parts
    /// without one, and non-text parts, fall back to raw octets.
    Unicode,
    /// Raw octets.
    TypedArray,
}

#[derive(Debug, Clone)]
pub struct ParserOptions {
    /// Part-number prefix to keep; all other parts get no callbacks.
    pub prune_at: String,
    pub body_format: BodyFormat,
    pub str_format: StrFormat,
    /// Fallback charset label for headers and text bodies.
    pub charset: String,
    /// Ignore the Content-Type charset in favor of `charset`.
    pub force_charset: bool,
    /// Drop inner line breaks from folded header values.
    pub strip_continuations: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        ParserOptions {
            prune_at: String::new(),
            body_format: BodyFormat::default(),
            str_format: StrFormat::default(),
            charset: String::new(),
            force_charset: false,
            strip_continuations: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    ParsingHeaders,
    BlackHole,
    Emitter,
    Subparser,
}

enum SplitHandler {
    None,
    Multipart { count: u32, in_part: bool },
}

struct BoundaryMatch {
    start: usize,
    end: usize,
    terminator: bool,
}

/// A streaming, push-driven MIME message parser.
///
/// Feed raw octets with [`deliver_data`](Self::deliver_data) in chunks of
/// any size and finish with [`deliver_eof`](Self::deliver_eof); the
/// listener receives the message structure as it is discovered. Nested
/// `multipart/*` and `message/rfc822` parts are parsed by child parsers
/// owned by their parent.
///
/// Part numbers: the outermost part is `""`, multipart children count from
/// `1` (`2.1` is the first child of the second part), and the body of a
/// `message/*` envelope carries a `$` suffix.
pub struct MimeParser {
    options: ParserOptions,
    part_num: String,
    is_toplevel: bool,
    started: bool,
    state: State,
    header_text: Vec<u8>,
    hold: Vec<u8>,
    boundary: Option<Vec<u8>>,
    split: SplitHandler,
    child: Option<Box<MimeParser>>,
    child_content_type: ContentType,
    content_decoder: ContentDecoder,
    text_decoder: Option<TextDecoder>,
    default_content_type: ContentType,
    pruned: bool,
}

impl MimeParser {
    pub fn new(options: ParserOptions) -> Self {
        MimeParser {
            options,
            part_num: String::new(),
            is_toplevel: true,
            started: false,
            state: State::ParsingHeaders,
            header_text: Vec::new(),
            hold: Vec::new(),
            boundary: None,
            split: SplitHandler::None,
            child: None,
            child_content_type: ContentType::new("text", "plain"),
            content_decoder: ContentDecoder::None,
            text_decoder: None,
            default_content_type: ContentType::new("text", "plain"),
            pruned: false,
        }
    }

    fn subparser(options: ParserOptions, part_num: String, default_content_type: ContentType) -> Self {
        MimeParser {
            part_num,
            is_toplevel: false,
            default_content_type,
            ..MimeParser::new(options)
        }
    }

    /// Discards all progress and returns the parser to its initial state.
    pub fn reset(&mut self) {
        let options = self.options.clone();
        let part_num = std::mem::take(&mut self.part_num);
        let default_content_type = std::mem::take(&mut self.default_content_type);
        let is_toplevel = self.is_toplevel;
        *self = MimeParser::subparser(options, part_num, default_content_type);
        self.is_toplevel = is_toplevel;
    }

    /// Pushes a chunk of raw message octets.
    pub fn deliver_data(&mut self, listener: &mut dyn MessageListener, data: &[u8]) {
        if self.is_toplevel && !self.started {
            self.started = true;
            listener.start_message();
        }

        let buf = self.condition(data);
        if !buf.is_empty() {
            self.dispatch_data(listener, &buf);
        }
    }

    /// Signals the end of input, flushing all held state and closing every
    /// open part, depth first.
    pub fn deliver_eof(&mut self, listener: &mut dyn MessageListener) {
        if self.is_toplevel && !self.started {
            self.started = true;
            listener.start_message();
        }

        let held = std::mem::take(&mut self.hold);
        if !held.is_empty() {
            self.dispatch_data(listener, &held);
        }

        if self.state == State::ParsingHeaders {
            // Input ended inside the header block; parse what is there
            self.start_part(listener);
        }

        match self.state {
            State::Emitter => {
                if !self.pruned && self.options.body_format != BodyFormat::None {
                    let mut decoded = Vec::new();
                    self.content_decoder.decode(&[], &mut decoded, true);
                    self.deliver_part_data(listener, decoded, true);
                }
            }
            State::Subparser => {
                let mut decoded = Vec::new();
                self.content_decoder.decode(&[], &mut decoded, true);
                if let Some(child) = self.child.as_mut() {
                    if !decoded.is_empty() {
                        child.deliver_data(listener, &decoded);
                    }
                    child.deliver_eof(listener);
                }
                self.child = None;
            }
            State::BlackHole | State::ParsingHeaders => (),
        }

        if !self.pruned {
            listener.end_part(&self.part_num);
        }
        if self.is_toplevel {
            listener.end_message();
        }
    }

    /// Prepends held bytes and withholds everything past the last line
    /// break, so that every dispatch begins at the start of a line. A
    /// trailing `\r` is withheld too: the matching `\n` may be in the next
    /// chunk.
    fn condition(&mut self, data: &[u8]) -> Vec<u8> {
        let mut buf = std::mem::take(&mut self.hold);
        buf.extend_from_slice(data);

        let scan = if buf.last() == Some(&b'\r') {
            buf.len() - 1
        } else {
            buf.len()
        };
        let cut = buf[..scan]
            .iter()
            .rposition(|&ch| ch == b'\n' || ch == b'\r')
            .map_or(0, |pos| pos + 1);

        self.hold = buf.split_off(cut);
        buf
    }

    fn dispatch_data(&mut self, listener: &mut dyn MessageListener, buf: &[u8]) {
        if self.state == State::ParsingHeaders {
            self.header_text.extend_from_slice(buf);
            if let Some((header_end, body_start)) = find_header_end(&self.header_text) {
                let body = self.header_text.split_off(body_start);
                self.header_text.truncate(header_end);
                self.start_part(listener);
                if !body.is_empty() {
                    self.dispatch_body(listener, &body);
                }
            }
        } else {
            self.dispatch_body(listener, buf);
        }
    }

    fn dispatch_body(&mut self, listener: &mut dyn MessageListener, buf: &[u8]) {
        let mut buf = buf;
        loop {
            let matched = match &self.boundary {
                Some(boundary) => find_boundary(buf, boundary),
                None => None,
            };
            match matched {
                Some(matched) => {
                    if matched.start > 0 {
                        self.route(listener, &buf[..matched.start]);
                    }
                    self.on_boundary(listener, matched.terminator);
                    if matched.end >= buf.len() {
                        return;
                    }
                    buf = &buf[matched.end..];
                }
                None => {
                    self.route(listener, buf);
                    return;
                }
            }
        }
    }

    fn route(&mut self, listener: &mut dyn MessageListener, buf: &[u8]) {
        match self.state {
            State::BlackHole | State::ParsingHeaders => (),
            State::Emitter => {
                if self.pruned || self.options.body_format == BodyFormat::None {
                    return;
                }
                let mut decoded = Vec::new();
                self.content_decoder.decode(buf, &mut decoded, false);
                self.deliver_part_data(listener, decoded, false);
            }
            State::Subparser => {
                let mut decoded = Vec::new();
                self.content_decoder.decode(buf, &mut decoded, false);
                if !decoded.is_empty() {
                    if let Some(child) = self.child.as_mut() {
                        child.deliver_data(listener, &decoded);
                    }
                }
            }
        }
    }

    fn deliver_part_data(
        &mut self,
        listener: &mut dyn MessageListener,
        bytes: Vec<u8>,
        last: bool,
    ) {
        if let Some(decoder) = self.text_decoder.as_mut() {
            let text = decoder.push(&bytes, last);
            if last {
                self.text_decoder = None;
            }
            if !text.is_empty() {
                listener.part_data(&self.part_num, PartData::Text(text));
            }
        } else if !bytes.is_empty() {
            listener.part_data(&self.part_num, PartData::Bytes(bytes));
        }
    }

    fn start_part(&mut self, listener: &mut dyn MessageListener) {
        let raw = std::mem::take(&mut self.header_text);
        let headers = StructuredHeaders::parse(
            &raw,
            self.options.strip_continuations,
            &self.options.charset,
            self.default_content_type.clone(),
        );

        self.pruned = is_pruned(&self.part_num, &self.options.prune_at);
        if !self.pruned {
            listener.start_part(&self.part_num, &headers);
        }
        self.transition(&headers);
    }

    /// Picks the body state from the part's Content-Type.
    fn transition(&mut self, headers: &StructuredHeaders) {
        let content_type = headers.content_type();

        // Raw extraction of a whole subtree: no decoding, no splitting
        if self.options.body_format == BodyFormat::Raw
            && self.part_num == self.options.prune_at
        {
            self.state = State::Emitter;
            return;
        }

        if content_type.ctype() == "multipart" {
            match content_type.attribute("boundary") {
                Some(boundary) => {
                    self.state = State::BlackHole;
                    self.boundary = Some(format!("--{boundary}").into_bytes());
                    self.split = SplitHandler::Multipart {
                        count: 1,
                        in_part: false,
                    };
                    self.content_decoder = ContentDecoder::withhold_crlf();
                    self.child_content_type = if content_type.subtype() == "digest" {
                        ContentType::new("message", "rfc822")
                    } else {
                        ContentType::new("text", "plain")
                    };
                }
                None => {
                    log::warn!("multipart part {:?} without boundary", self.part_num);
                    self.state = State::BlackHole;
                }
            }
            return;
        }

        if matches!(
            content_type.full_type().as_str(),
            "message/rfc822" | "message/global" | "message/news"
        ) {
            self.state = State::Subparser;
            self.content_decoder = transfer_decoder(headers);
            self.child = Some(Box::new(MimeParser::subparser(
                self.options.clone(),
                format!("{}$", self.part_num),
                ContentType::new("text", "plain"),
            )));
            return;
        }

        self.state = State::Emitter;
        if self.options.body_format == BodyFormat::Decode {
            self.content_decoder = transfer_decoder(headers);
        }
        if self.options.str_format == StrFormat::Unicode && content_type.ctype() == "text" {
            self.text_decoder = self.resolve_charset(&content_type);
        }
    }

    fn resolve_charset(&self, content_type: &ContentType) -> Option<TextDecoder> {
        let configured = if self.options.charset.is_empty() {
            None
        } else {
            Some(self.options.charset.as_str())
        };
        let label = if self.options.force_charset {
            configured
        } else {
            content_type.attribute("charset").or(configured)
        };
        label.and_then(TextDecoder::for_label)
    }

    fn on_boundary(&mut self, listener: &mut dyn MessageListener, terminator: bool) {
        let (close_child, next_part) = match &mut self.split {
            SplitHandler::Multipart { count, in_part } => {
                let close_child = *in_part;
                let next_part = if terminator {
                    None
                } else {
                    *in_part = true;
                    let part_num = if self.part_num.is_empty() {
                        count.to_string()
                    } else {
                        format!("{}.{}", self.part_num, count)
                    };
                    *count += 1;
                    Some(part_num)
                };
                (close_child, next_part)
            }
            SplitHandler::None => return,
        };

        if close_child {
            // The line break before the boundary belonged to the boundary
            self.content_decoder.drop_pending_crlf();
            if let Some(child) = self.child.as_mut() {
                child.deliver_eof(listener);
            }
        }

        match next_part {
            Some(part_num) => {
                self.child = Some(Box::new(MimeParser::subparser(
                    self.options.clone(),
                    part_num,
                    self.child_content_type.clone(),
                )));
                self.state = State::Subparser;
            }
            None => {
                // Terminator: drop into the epilogue and ignore it
                self.state = State::BlackHole;
                self.boundary = None;
                self.split = SplitHandler::None;
                self.child = None;
            }
        }
    }
}

fn transfer_decoder(headers: &StructuredHeaders) -> ContentDecoder {
    match headers.get("content-transfer-encoding") {
        Some(HeaderValue::Text(encoding)) if encoding == "base64" => ContentDecoder::base64(),
        Some(HeaderValue::Text(encoding)) if encoding == "quoted-printable" => {
            ContentDecoder::quoted_printable()
        }
        _ => ContentDecoder::None,
    }
}

/// A part is pruned unless its number equals the prefix or extends it at a
/// `.` or `$` boundary. An empty prefix keeps everything.
fn is_pruned(part_num: &str, prefix: &str) -> bool {
    if prefix.is_empty() || part_num == prefix {
        return false;
    }
    match part_num.strip_prefix(prefix) {
        Some(rest) => !rest.starts_with(['.', '$']),
        None => true,
    }
}

/// Finds the end of the header block: a line break at offset zero, or two
/// consecutive identical line endings. Returns the end of the header text
/// and the start of the body.
fn find_header_end(buf: &[u8]) -> Option<(usize, usize)> {
    match buf.first() {
        Some(b'\n') => return Some((0, 1)),
        Some(b'\r') => {
            return if buf.get(1) == Some(&b'\n') {
                Some((0, 2))
            } else if buf.len() > 1 {
                Some((0, 1))
            } else {
                // A lone \r may yet become \r\n
                None
            };
        }
        _ => (),
    }

    for pos in 0..buf.len().saturating_sub(1) {
        match (buf[pos], buf[pos + 1]) {
            (b'\r', b'\n') => {
                if buf.get(pos + 2) == Some(&b'\r') && buf.get(pos + 3) == Some(&b'\n') {
                    return Some((pos + 2, pos + 4));
                }
            }
            (b'\n', b'\n') | (b'\r', b'\r') => return Some((pos + 1, pos + 2)),
            _ => (),
        }
    }
    None
}

/// Finds `--boundary` at the start of a line, optionally terminated with
/// `--`, padded with blanks and closed by a line break or the end of the
/// buffer. The preceding line break is part of the match.
fn find_boundary(buf: &[u8], boundary: &[u8]) -> Option<BoundaryMatch> {
    let mut break_start = 0;
    let mut line_start = 0;

    loop {
        if buf[line_start..].starts_with(boundary) {
            if let Some((end, terminator)) = boundary_tail(buf, line_start + boundary.len()) {
                return Some(BoundaryMatch {
                    start: break_start,
                    end,
                    terminator,
                });
            }
        }

        let mut pos = line_start;
        loop {
            match buf.get(pos) {
                None => return None,
                Some(b'\r') => {
                    break_start = pos;
                    line_start = if buf.get(pos + 1) == Some(&b'\n') {
                        pos + 2
                    } else {
                        pos + 1
                    };
                    break;
                }
                Some(b'\n') => {
                    break_start = pos;
                    line_start = pos + 1;
                    break;
                }
                Some(_) => pos += 1,
            }
        }
    }
}

fn boundary_tail(buf: &[u8], mut pos: usize) -> Option<(usize, bool)> {
    let terminator = buf.get(pos..pos + 2) == Some(b"--");
    if terminator {
        pos += 2;
    }
    while matches!(buf.get(pos), Some(b' ') | Some(b'\t')) {
        pos += 1;
    }
    match buf.get(pos) {
        None => Some((pos, terminator)),
        Some(b'\r') => {
            if buf.get(pos + 1) == Some(&b'\n') {
                Some((pos + 2, terminator))
            } else {
                Some((pos + 1, terminator))
            }
        }
        Some(b'\n') => Some((pos + 1, terminator)),
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{find_header_end, is_pruned, MessageListener, MimeParser, ParserOptions, PartData};
    use crate::core::header::StructuredHeaders;
    use crate::{BodyFormat, StrFormat};

    /// Records callbacks, coalescing consecutive data chunks of one part so
    /// that chunking choices do not show in the log.
    #[derive(Default)]
    struct EventLog {
        events: Vec<String>,
    }

    impl MessageListener for EventLog {
        fn start_message(&mut self) {
            self.events.push("start".to_string());
        }

        fn end_message(&mut self) {
            self.events.push("end".to_string());
        }

        fn start_part(&mut self, part_num: &str, headers: &StructuredHeaders) {
            self.events
                .push(format!("+{part_num} {}", headers.content_type().full_type()));
        }

        fn end_part(&mut self, part_num: &str) {
            self.events.push(format!("-{part_num}"));
        }

        fn part_data(&mut self, part_num: &str, data: PartData) {
            let text = match data {
                PartData::Bytes(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                PartData::Text(text) => text,
            };
            let tag = format!("={part_num} ");
            match self.events.last_mut() {
                Some(last) if last.starts_with(&tag) => last.push_str(&text),
                _ => self.events.push(format!("{tag}{text}")),
            }
        }
    }

    fn parse(message: &[u8], options: ParserOptions) -> Vec<String> {
        let mut listener = EventLog::default();
        let mut parser = MimeParser::new(options);
        parser.deliver_data(&mut listener, message);
        parser.deliver_eof(&mut listener);
        listener.events
    }

    const MULTIPART: &[u8] = b"From: a@x\r\n\
Content-Type: multipart/mixed; boundary=frontier\r\n\
\r\n\
This is the prologue.\r\n\
--frontier\r\n\
Content-Type: text/plain\r\n\
\r\n\
Part one\r\n\
--frontier\r\n\
Content-Type: text/html\r\n\
\r\n\
<p>Part two</p>\r\n\
--frontier--\r\n\
This is the epilogue.\r\n";

    #[test]
    fn multipart_parts_and_numbering() {
        let events = parse(MULTIPART, ParserOptions::default());
        assert_eq!(
            events,
            [
                "start",
                "+ multipart/mixed",
                "+1 text/plain",
                "=1 Part one",
                "-1",
                "+2 text/html",
                "=2 <p>Part two</p>",
                "-2",
                "-",
                "end",
            ]
        );
    }

    #[test]
    fn chunked_delivery_is_invariant() {
        let whole = parse(MULTIPART, ParserOptions::default());

        for split in 1..MULTIPART.len() {
            let mut listener = EventLog::default();
            let mut parser = MimeParser::new(ParserOptions::default());
            parser.deliver_data(&mut listener, &MULTIPART[..split]);
            parser.deliver_data(&mut listener, &MULTIPART[split..]);
            parser.deliver_eof(&mut listener);
            assert_eq!(listener.events, whole, "differs when split at {split}");
        }

        // Byte-at-a-time delivery
        let mut listener = EventLog::default();
        let mut parser = MimeParser::new(ParserOptions::default());
        for byte in MULTIPART {
            parser.deliver_data(&mut listener, &[*byte]);
        }
        parser.deliver_eof(&mut listener);
        assert_eq!(listener.events, whole);
    }

    #[test]
    fn nested_multipart_numbering() {
        let message = b"Content-Type: multipart/mixed; boundary=outer\r\n\
\r\n\
--outer\r\n\
\r\n\
first\r\n\
--outer\r\n\
Content-Type: multipart/alternative; boundary=inner\r\n\
\r\n\
--inner\r\n\
\r\n\
inner one\r\n\
--inner\r\n\
\r\n\
inner two\r\n\
--inner--\r\n\
--outer--\r\n";

        let events = parse(message, ParserOptions::default());
        assert_eq!(
            events,
            [
                "start",
                "+ multipart/mixed",
                "+1 text/plain",
                "=1 first",
                "-1",
                "+2 multipart/alternative",
                "+2.1 text/plain",
                "=2.1 inner one",
                "-2.1",
                "+2.2 text/plain",
                "=2.2 inner two",
                "-2.2",
                "-2",
                "-",
                "end",
            ]
        );
    }

    #[test]
    fn nested_message_rfc822() {
        let message = b"Content-Type: message/rfc822\r\n\
\r\n\
Subject: inner\r\n\
\r\n\
inner body\r\n";

        let events = parse(message, ParserOptions::default());
        assert_eq!(
            events,
            [
                "start",
                "+ message/rfc822",
                "+$ text/plain",
                "=$ inner body\r\n",
                "-$",
                "-",
                "end",
            ]
        );
    }

    #[test]
    fn rfc822_wrapper_honors_transfer_encoding() {
        // "Subject: hi\r\n\r\nhello\r\n" in base64
        let message = b"Content-Type: message/rfc822\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
U3ViamVjdDogaGkNCg0KaGVsbG8NCg==\r\n";

        let events = parse(message, ParserOptions::default());
        assert_eq!(
            events,
            [
                "start",
                "+ message/rfc822",
                "+$ text/plain",
                "=$ hello\r\n",
                "-$",
                "-",
                "end",
            ]
        );
    }

    #[test]
    fn digest_children_default_to_rfc822() {
        let message = b"Content-Type: multipart/digest; boundary=d\r\n\
\r\n\
--d\r\n\
\r\n\
Subject: first digest item\r\n\
\r\n\
item body\r\n\
--d--\r\n";

        let events = parse(message, ParserOptions::default());
        assert_eq!(
            events,
            [
                "start",
                "+ multipart/digest",
                "+1 message/rfc822",
                "+1$ text/plain",
                "=1$ item body",
                "-1$",
                "-1",
                "-",
                "end",
            ]
        );
    }

    #[test]
    fn decode_transfer_encodings() {
        let message = b"Content-Type: multipart/mixed; boundary=b\r\n\
\r\n\
--b\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
aGVsbG8gd29y\r\n\
bGQ=\r\n\
--b\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\
\r\n\
caf=C3=A9 em=\r\n\
ily\r\n\
--b--\r\n";

        let options = ParserOptions {
            body_format: BodyFormat::Decode,
            ..Default::default()
        };
        let events = parse(message, options);
        assert_eq!(
            events,
            [
                "start",
                "+ multipart/mixed",
                "+1 text/plain",
                "=1 hello world",
                "-1",
                "+2 text/plain",
                "=2 café emily",
                "-2",
                "-",
                "end",
            ]
        );
    }

    #[test]
    fn unicode_text_bodies() {
        let message = b"Content-Type: text/plain; charset=iso-8859-1\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\
\r\n\
caf=E9\r\n";

        let options = ParserOptions {
            body_format: BodyFormat::Decode,
            str_format: StrFormat::Unicode,
            ..Default::default()
        };
        let events = parse(message, options);
        assert_eq!(
            events,
            ["start", "+ text/plain", "= café\r\n", "-", "end"]
        );
    }

    #[test]
    fn missing_boundary_swallows_body() {
        let message = b"Content-Type: multipart/mixed\r\n\r\nlost body\r\n";
        let events = parse(message, ParserOptions::default());
        assert_eq!(events, ["start", "+ multipart/mixed", "-", "end"]);
    }

    #[test]
    fn boundary_on_message_type_is_ignored() {
        let message = b"Content-Type: message/rfc822; boundary=\"--x\"\r\n\
\r\n\
Subject: s\r\n\
\r\n\
body\r\n";
        let events = parse(message, ParserOptions::default());
        assert_eq!(
            events,
            [
                "start",
                "+ message/rfc822",
                "+$ text/plain",
                "=$ body\r\n",
                "-$",
                "-",
                "end",
            ]
        );
    }

    #[test]
    fn pruning_suppresses_other_parts() {
        let options = ParserOptions {
            prune_at: "2".to_string(),
            ..Default::default()
        };
        let events = parse(MULTIPART, options);
        assert_eq!(
            events,
            ["start", "+2 text/html", "=2 <p>Part two</p>", "-2", "end"]
        );
    }

    #[test]
    fn raw_subtree_extraction() {
        let options = ParserOptions {
            prune_at: "2".to_string(),
            body_format: BodyFormat::Raw,
            ..Default::default()
        };
        let events = parse(MULTIPART, options);
        assert_eq!(
            events,
            ["start", "+2 text/html", "=2 <p>Part two</p>", "-2", "end"]
        );
    }

    #[test]
    fn raw_whole_message_body() {
        // With the root as the target, the body keeps its boundaries
        let options = ParserOptions {
            body_format: BodyFormat::Raw,
            ..Default::default()
        };
        let events = parse(MULTIPART, options);
        let body = String::from_utf8_lossy(&MULTIPART[63..]).into_owned();
        assert_eq!(
            events,
            [
                "start".to_string(),
                "+ multipart/mixed".to_string(),
                format!("= {body}"),
                "-".to_string(),
                "end".to_string(),
            ]
        );
    }

    #[test]
    fn body_format_none_suppresses_data() {
        let options = ParserOptions {
            body_format: BodyFormat::None,
            ..Default::default()
        };
        let events = parse(MULTIPART, options);
        assert_eq!(
            events,
            [
                "start",
                "+ multipart/mixed",
                "+1 text/plain",
                "-1",
                "+2 text/html",
                "-2",
                "-",
                "end",
            ]
        );
    }

    #[test]
    fn bare_lf_and_cr_line_endings() {
        let message = b"Content-Type: multipart/mixed; boundary=b\n\
\n\
--b\n\
\n\
unix part\n\
--b--\n";
        let events = parse(message, ParserOptions::default());
        assert_eq!(
            events,
            [
                "start",
                "+ multipart/mixed",
                "+1 text/plain",
                "=1 unix part",
                "-1",
                "-",
                "end",
            ]
        );
    }

    #[test]
    fn headers_without_body() {
        let events = parse(b"Subject: only headers", ParserOptions::default());
        assert_eq!(events, ["start", "+ text/plain", "-", "end"]);
    }

    #[test]
    fn empty_message() {
        let events = parse(b"", ParserOptions::default());
        assert_eq!(events, ["start", "+ text/plain", "-", "end"]);
    }

    #[test]
    fn multipart_without_terminator() {
        let message = b"Content-Type: multipart/mixed; boundary=b\r\n\
\r\n\
--b\r\n\
\r\n\
dangling part\r\n";
        let events = parse(message, ParserOptions::default());
        assert_eq!(
            events,
            [
                "start",
                "+ multipart/mixed",
                "+1 text/plain",
                "=1 dangling part\r\n",
                "-1",
                "-",
                "end",
            ]
        );
    }

    #[test]
    fn find_header_end_variants() {
        assert_eq!(find_header_end(b"A: b\r\n\r\nbody"), Some((6, 8)));
        assert_eq!(find_header_end(b"A: b\n\nbody"), Some((5, 6)));
        assert_eq!(find_header_end(b"A: b\r\rbody"), Some((5, 6)));
        assert_eq!(find_header_end(b"\r\nbody"), Some((0, 2)));
        assert_eq!(find_header_end(b"\nbody"), Some((0, 1)));
        assert_eq!(find_header_end(b"A: b\r\n"), None);
        assert_eq!(find_header_end(b"\r"), None);
    }

    #[test]
    fn prune_prefix_matching() {
        assert!(!is_pruned("", ""));
        assert!(!is_pruned("1.2", ""));
        assert!(!is_pruned("2", "2"));
        assert!(!is_pruned("2.1", "2"));
        assert!(!is_pruned("2$", "2"));
        assert!(is_pruned("", "2"));
        assert!(is_pruned("22", "2"));
        assert!(is_pruned("1", "2"));
        assert!(is_pruned("2.1", "2.10"));
    }
}
