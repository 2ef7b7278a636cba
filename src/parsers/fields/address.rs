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

use crate::parsers::tokenizer::{tokenize, Token, TokenizerOpts};
use crate::{Addr, Address, Group};

// Characters that force the local-part of a bare addr-spec into quotes
const LOCAL_PART_SPECIALS: &str = " !()<>[]:;@\\,\"";

struct AddressParser {
    name: String,
    address: String,
    group_name: String,
    addrlist: Vec<Addr>,
    result: Vec<Address>,
    in_angle: bool,
    comment_depth: u32,
    needs_space: bool,
}

impl AddressParser {
    fn add_address(&mut self) {
        if !self.name.is_empty() || !self.address.is_empty() {
            self.addrlist.push(Addr {
                name: if self.name.is_empty() {
                    None
                } else {
                    Some(std::mem::take(&mut self.name))
                },
                address: if self.address.is_empty() {
                    None
                } else {
                    Some(std::mem::take(&mut self.address))
                },
            });
        }
        self.name.clear();
        self.address.clear();
    }

    fn flush_list(&mut self) {
        if self.group_name.is_empty() {
            self.result
                .extend(self.addrlist.drain(..).map(Address::Addr));
        } else {
            self.result.push(Address::Group(Group {
                name: Some(std::mem::take(&mut self.group_name)),
                addresses: std::mem::take(&mut self.addrlist),
            }));
        }
    }

    fn add_text(&mut self, text: &str, is_comment_close: bool) {
        // Comment text always belongs to the display name, even after the
        // addr-spec; spaces are only ever inserted into the name.
        if self.comment_depth == 0 && (self.in_angle || !self.address.is_empty()) {
            self.address.push_str(text);
        } else {
            if self.needs_space
                && !is_comment_close
                && !text.starts_with('.')
                && !self.name.is_empty()
            {
                self.name.push(' ');
            }
            self.name.push_str(text);
        }
    }
}

/// Parses an RFC5322 address list into mailboxes and groups, in source
/// order. A missing trailing `;` on a group and a local-part without a
/// domain are both tolerated.
pub fn parse_address_list(value: &str, rfc2047: bool) -> Vec<Address> {
    let mut parser = AddressParser {
        name: String::new(),
        address: String::new(),
        group_name: String::new(),
        addrlist: Vec::new(),
        result: Vec::new(),
        in_angle: false,
        comment_depth: 0,
        needs_space: false,
    };

    let opts = TokenizerOpts {
        qstring: true,
        dliteral: true,
        comments: true,
        rfc2047,
    };

    for token in tokenize(value, ":,;<>@", opts) {
        match token {
            Token::Delimiter(':') => {
                parser.group_name = std::mem::take(&mut parser.name);
                // Addresses collected before the group opened are top-level
                let pending = std::mem::take(&mut parser.addrlist);
                parser.result.extend(pending.into_iter().map(Address::Addr));
                parser.needs_space = false;
            }
            Token::Delimiter('<') => {
                parser.in_angle = true;
            }
            Token::Delimiter('>') => {
                parser.in_angle = false;
            }
            Token::Delimiter('@') => {
                if !parser.in_angle && parser.address.is_empty() {
                    // The name so far was really the local-part
                    let mut local = std::mem::take(&mut parser.name);
                    if local.contains(|ch| LOCAL_PART_SPECIALS.contains(ch)) {
                        local = format!(
                            "\"{}\"",
                            local.replace('\\', "\\\\").replace('"', "\\\"")
                        );
                    }
                    parser.address = local;
                }
                parser.address.push('@');
                parser.needs_space = false;
            }
            Token::Delimiter(',') => {
                parser.add_address();
                parser.in_angle = false;
                parser.needs_space = false;
            }
            Token::Delimiter(';') => {
                parser.add_address();
                parser.flush_list();
                parser.in_angle = false;
                parser.needs_space = false;
            }
            Token::CommentOpen => {
                parser.comment_depth += 1;
                parser.add_text("(", false);
                parser.needs_space = false;
            }
            Token::CommentClose => {
                parser.add_text(")", true);
                parser.comment_depth = parser.comment_depth.saturating_sub(1);
                parser.needs_space = true;
            }
            Token::Delimiter(_) => (),
            text_token => {
                let text = text_token.to_string();
                parser.add_text(&text, false);
                parser.needs_space = true;
            }
        }
    }

    parser.add_address();
    if !parser.group_name.is_empty() || !parser.addrlist.is_empty() {
        parser.flush_list();
    }
    parser.result
}

#[cfg(test)]
mod tests {
    use super::parse_address_list;
    use crate::{Addr, Address, Group};

    fn addr(name: Option<&str>, address: Option<&str>) -> Address {
        Address::Addr(Addr {
            name: name.map(str::to_string),
            address: address.map(str::to_string),
        })
    }

    #[test]
    fn parse_addresses() {
        let inputs: &[(&str, &[Address])] = &[
            ("a@x", &[addr(None, Some("a@x"))]),
            (
                "a@x, b@y",
                &[addr(None, Some("a@x")), addr(None, Some("b@y"))],
            ),
            (
                "\"Joe Q. Public\" <john.q.public@example.com>",
                &[addr(Some("Joe Q. Public"), Some("john.q.public@example.com"))],
            ),
            (
                "John Smith <john@example.com>",
                &[addr(Some("John Smith"), Some("john@example.com"))],
            ),
            (
                "Art Vandelay (Vandelay Industries) <art@vandelay.com>",
                &[addr(
                    Some("Art Vandelay (Vandelay Industries)"),
                    Some("art@vandelay.com"),
                )],
            ),
            (
                "=?UTF-8?Q?John_Sm=C3=AEth?= <john@example.com>",
                &[addr(Some("John Smîth"), Some("john@example.com"))],
            ),
            (
                "jdoe@[127.0.0.1]",
                &[addr(None, Some("jdoe@[127.0.0.1]"))],
            ),
            // Local part with specials is re-quoted
            (
                "\"john smith\"@example.com",
                &[addr(None, Some("\"john smith\"@example.com"))],
            ),
            // Name without any address
            ("Undisclosed", &[addr(Some("Undisclosed"), None)]),
            // Missing domain is tolerated
            ("orphan@", &[addr(None, Some("orphan@"))]),
        ];

        for (input, expected) in inputs {
            assert_eq!(
                &parse_address_list(input, true),
                expected,
                "failed for {input:?}"
            );
        }
    }

    #[test]
    fn parse_groups() {
        let result = parse_address_list("A Group: a@x, b@y;", true);
        assert_eq!(
            result,
            [Address::Group(Group::new(
                "A Group",
                vec![Addr::new(None, "a@x"), Addr::new(None, "b@y")]
            ))]
        );

        // Missing trailing semicolon is tolerated
        let result = parse_address_list("Friends: c@z", true);
        assert_eq!(
            result,
            [Address::Group(Group::new(
                "Friends",
                vec![Addr::new(None, "c@z")]
            ))]
        );

        // Mixed top-level addresses and groups keep source order
        let result = parse_address_list("x@y, Team: a@x;, z@w", true);
        assert_eq!(
            result,
            [
                addr_entry(None, "x@y"),
                Address::Group(Group::new("Team", vec![Addr::new(None, "a@x")])),
                addr_entry(None, "z@w"),
            ]
        );
    }

    fn addr_entry(name: Option<&str>, address: &str) -> Address {
        Address::Addr(Addr::new(name, address))
    }

    #[test]
    fn quoted_display_names() {
        let result = parse_address_list("\"Giant; \\\"Big\\\" Box\" <sysservices@example.net>", true);
        assert_eq!(
            result,
            [addr_entry(
                Some("Giant; \"Big\" Box"),
                "sysservices@example.net"
            )]
        );
    }
}
