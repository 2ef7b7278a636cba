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
use std::fmt;

use crate::parsers::encoded_word::decode_word_run;

/// A single token of a structured header value.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Token<'x> {
    /// A delimiter character from the caller-supplied set.
    Delimiter(char),

    /// The longest run of octets that is not whitespace, a delimiter or the
    /// opening of a quoted construct. Quoted-pairs are unescaped.
    Atom(Cow<'x, str>),

    /// The contents of a `"..."` construct, quoted-pairs unescaped.
    QuotedString(Cow<'x, str>),

    /// A full `[...]` construct including the brackets, quoted-pairs kept.
    DomainLiteral(Cow<'x, str>),

    /// The opening parenthesis of a comment.
    CommentOpen,

    /// The closing parenthesis of a comment.
    CommentClose,

    /// The decoded Unicode text of a run of adjacent RFC2047 encoded-words.
    EncodedWord(String),
}

impl Token<'_> {
    /// Tag equality against a known delimiter character. Never compare a
    /// token's payload to test for a delimiter; an atom `,` produced by a
    /// quoted-pair is not one.
    #[inline(always)]
    pub fn is_delimiter(&self, ch: char) -> bool {
        matches!(self, Token::Delimiter(delimiter) if *delimiter == ch)
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Delimiter(ch) => write!(f, "{ch}"),
            Token::Atom(text) | Token::QuotedString(text) | Token::DomainLiteral(text) => {
                f.write_str(text)
            }
            Token::CommentOpen => f.write_str("("),
            Token::CommentClose => f.write_str(")"),
            Token::EncodedWord(text) => f.write_str(text),
        }
    }
}

/// Which quoted constructs the tokenizer recognizes.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokenizerOpts {
    /// Recognize `"..."`.
    pub qstring: bool,
    /// Recognize `[...]`.
    pub dliteral: bool,
    /// Recognize nested `(` / `)`; delimiters inside a comment are demoted
    /// to plain text.
    pub comments: bool,
    /// Recognize and eagerly decode `=?...?=` encoded-word runs.
    pub rfc2047: bool,
}

struct AtomBuilder<'x> {
    value: &'x str,
    start: Option<usize>,
    buf: String,
    buffered: bool,
}

impl<'x> AtomBuilder<'x> {
    fn new(value: &'x str) -> Self {
        AtomBuilder {
            value,
            start: None,
            buf: String::new(),
            buffered: false,
        }
    }

    #[inline(always)]
    fn extend(&mut self, pos: usize) {
        if self.start.is_none() {
            self.start = Some(pos);
        }
    }

    fn push_escaped(&mut self, pos: usize, ch: char) {
        if let Some(start) = self.start.take() {
            self.buf.push_str(&self.value[start..pos]);
        }
        self.buf.push(ch);
        self.buffered = true;
    }

    fn flush(&mut self, end: usize, tokens: &mut Vec<Token<'x>>) {
        let run = self.start.take().map(|start| &self.value[start..end]);
        if self.buffered {
            if let Some(run) = run {
                self.buf.push_str(run);
            }
            tokens.push(Token::Atom(std::mem::take(&mut self.buf).into()));
            self.buffered = false;
        } else if let Some(run) = run {
            tokens.push(Token::Atom(run.into()));
        }
    }
}

/// Splits a header value into a materialized token sequence.
///
/// A backslash escapes the next character in every context. Whitespace
/// closes the current atom but emits nothing. A quoted-string left open at
/// the end of input is closed implicitly.
pub fn tokenize<'x>(value: &'x str, delimiters: &str, opts: TokenizerOpts) -> Vec<Token<'x>> {
    let mut tokens = Vec::new();
    let mut atom = AtomBuilder::new(value);
    let mut comment_depth = 0u32;
    let mut pos = 0;

    while let Some(ch) = value[pos..].chars().next() {
        match ch {
            '\\' => {
                if let Some(escaped) = value[pos + 1..].chars().next() {
                    atom.push_escaped(pos, escaped);
                    pos += 1 + escaped.len_utf8();
                } else {
                    atom.push_escaped(pos, '\\');
                    pos += 1;
                }
                continue;
            }
            '"' if opts.qstring => {
                atom.flush(pos, &mut tokens);
                pos += 1;
                tokens.push(quoted_string(value, &mut pos));
                continue;
            }
            '[' if opts.dliteral => {
                atom.flush(pos, &mut tokens);
                tokens.push(domain_literal(value, &mut pos));
                continue;
            }
            '(' if opts.comments => {
                atom.flush(pos, &mut tokens);
                comment_depth += 1;
                tokens.push(Token::CommentOpen);
            }
            ')' if opts.comments && comment_depth > 0 => {
                atom.flush(pos, &mut tokens);
                comment_depth -= 1;
                tokens.push(Token::CommentClose);
            }
            '=' if opts.rfc2047 && value[pos..].starts_with("=?") => {
                if let Some((decoded, end)) = decode_word_run(value, pos) {
                    atom.flush(pos, &mut tokens);
                    tokens.push(Token::EncodedWord(decoded));
                    pos = end;
                    continue;
                } else {
                    atom.extend(pos);
                }
            }
            ' ' | '\t' | '\r' | '\n' => {
                atom.flush(pos, &mut tokens);
            }
            _ if comment_depth == 0 && ch.is_ascii() && delimiters.contains(ch) => {
                atom.flush(pos, &mut tokens);
                tokens.push(Token::Delimiter(ch));
            }
            _ => {
                atom.extend(pos);
            }
        }
        pos += ch.len_utf8();
    }

    atom.flush(value.len(), &mut tokens);
    tokens
}

fn quoted_string<'x>(value: &'x str, pos: &mut usize) -> Token<'x> {
    let start = *pos;
    let mut buf: Option<String> = None;

    while let Some(ch) = value[*pos..].chars().next() {
        match ch {
            '\\' => {
                let buf = buf.get_or_insert_with(|| value[start..*pos].to_string());
                *pos += 1;
                if let Some(escaped) = value[*pos..].chars().next() {
                    buf.push(escaped);
                    *pos += escaped.len_utf8();
                } else {
                    buf.push('\\');
                }
            }
            '"' => {
                let text = match buf {
                    Some(buf) => Cow::Owned(buf),
                    None => Cow::Borrowed(&value[start..*pos]),
                };
                *pos += 1;
                return Token::QuotedString(text);
            }
            _ => {
                if let Some(buf) = buf.as_mut() {
                    buf.push(ch);
                }
                *pos += ch.len_utf8();
            }
        }
    }

    // Implicitly closed at end of input
    Token::QuotedString(match buf {
        Some(buf) => Cow::Owned(buf),
        None => Cow::Borrowed(&value[start..]),
    })
}

fn domain_literal<'x>(value: &'x str, pos: &mut usize) -> Token<'x> {
    let start = *pos;
    *pos += 1;

    while let Some(ch) = value[*pos..].chars().next() {
        match ch {
            '\\' => {
                *pos += 1;
                if let Some(escaped) = value[*pos..].chars().next() {
                    *pos += escaped.len_utf8();
                }
            }
            ']' => {
                *pos += 1;
                return Token::DomainLiteral(Cow::Borrowed(&value[start..*pos]));
            }
            _ => {
                *pos += ch.len_utf8();
            }
        }
    }

    Token::DomainLiteral(Cow::Borrowed(&value[start..]))
}
