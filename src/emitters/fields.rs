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

use crate::core::registry;
use crate::emitters::{quote_if_needed, EmitterError, HeaderEmitter};
use crate::parsers::fields::date::{DOW, MONTH};
use crate::{Addr, Address, ContentType, DateTime, Group, HeaderValue};

const NAME_QCHARS: &str = ",()<>:;.\"";
const LOCAL_PART_QCHARS: &str = "()<>[]:;@\\,\" !";
const TSPECIALS: &str = "()<>@,;:\\\"/[]?= \t";

impl HeaderEmitter<'_> {
    /// Writes one mailbox. A display name is followed by the angle-bracketed
    /// address; without one the bare addr-spec is emitted. The local-part is
    /// re-quoted when it needs it, splitting at the last `@`.
    pub fn add_address(&mut self, addr: &Addr) -> Result<(), EmitterError> {
        let name = addr.name.as_deref().unwrap_or("");
        let email = addr.address.as_deref().unwrap_or("");

        if !name.is_empty() {
            // Try to keep short addresses on one line
            let _ = self.reserve_space(name.chars().count() + email.chars().count() + 3);
            self.add_phrase(name, NAME_QCHARS, true)?;
            if email.is_empty() {
                return Ok(());
            }
            self.add_text("<", false)?;
        }

        let close = if name.is_empty() { "" } else { ">" };
        match email.rfind('@') {
            Some(at) => {
                self.add_quotable(&email[..at], LOCAL_PART_QCHARS, false)?;
                self.add_text(&format!("{}{close}", &email[at..]), false)
            }
            None => self.add_text(&format!("{email}{close}"), false),
        }
    }

    /// Writes an address list, groups expanded as `name : members ;`.
    pub fn add_addresses(&mut self, addresses: &[Address]) -> Result<(), EmitterError> {
        let mut first = true;
        for address in addresses {
            if !first {
                self.add_text(",", true)?;
            }
            first = false;

            match address {
                Address::Addr(addr) => self.add_address(addr)?,
                Address::Group(group) => self.add_group(group)?,
            }
        }
        Ok(())
    }

    fn add_group(&mut self, group: &Group) -> Result<(), EmitterError> {
        self.add_phrase(group.name.as_deref().unwrap_or(""), NAME_QCHARS, false)?;
        self.add_text(":", true)?;
        let mut first = true;
        for addr in &group.addresses {
            if !first {
                self.add_text(",", true)?;
            }
            first = false;
            self.add_address(addr)?;
        }
        self.add_text(";", true)
    }

    /// Writes an RFC5322 date as a single unbreakable token. The value is a
    /// UTC instant, so the zone is always `+0000`.
    pub fn add_date(&mut self, datetime: &DateTime) -> Result<(), EmitterError> {
        if !datetime.is_valid() {
            return Err(EmitterError::InvalidDate);
        }
        let formatted = format!(
            "{}, {} {} {:04} {:02}:{:02}:{:02} +0000",
            DOW[datetime.day_of_week() as usize],
            datetime.day,
            MONTH[(datetime.month - 1) as usize],
            datetime.year,
            datetime.hour,
            datetime.minute,
            datetime.second,
        );
        self.add_text(&formatted, false)
    }

    /// Writes a parameterized value as `type/subtype; name=value; ...`,
    /// quoting parameter values that need it.
    pub fn add_parameterized(&mut self, value: &ContentType) -> Result<(), EmitterError> {
        self.add_text(&value.full_type(), false)?;
        for (name, value) in &value.attributes {
            self.add_text(";", true)?;
            let rendered = match quote_if_needed(value, TSPECIALS) {
                Some(quoted) => quoted,
                None if value.is_empty() => "\"\"".to_string(),
                None => value.clone(),
            };
            self.add_text(&format!("{name}={rendered}"), false)?;
        }
        Ok(())
    }

    /// Commits any pending header and opens a new one named `name`.
    pub fn add_header_name(&mut self, name: &str) -> Result<(), EmitterError> {
        self.end_header();
        self.add_text(&format!("{name}:"), true)
    }

    /// Writes one complete header. Registered names use their preferred
    /// spelling and encoder; unknown names are emitted capitalized with the
    /// text value as unstructured content.
    pub fn add_structured_header(
        &mut self,
        name: &str,
        value: &HeaderValue,
    ) -> Result<(), EmitterError> {
        if let Some(spec) = registry::lookup(name) {
            if let Some(encoder) = spec.encoder {
                self.add_header_name(spec.preferred.as_ref())?;
                encoder(self, value)?;
                self.end_header();
                return Ok(());
            }
        }

        match value {
            HeaderValue::Text(text) => {
                self.add_header_name(&registry::capitalize_name(name))?;
                self.add_unstructured(text)?;
                self.end_header();
                Ok(())
            }
            _ => Err(EmitterError::UnknownHeader(name.to_string())),
        }
    }
}

pub(crate) fn encode_address_list(
    emitter: &mut HeaderEmitter<'_>,
    value: &HeaderValue,
) -> Result<(), EmitterError> {
    match value {
        HeaderValue::AddressList(addresses) => emitter.add_addresses(addresses),
        HeaderValue::Text(text) => emitter.add_unstructured(text),
        _ => Err(EmitterError::ValueMismatch),
    }
}

pub(crate) fn encode_date(
    emitter: &mut HeaderEmitter<'_>,
    value: &HeaderValue,
) -> Result<(), EmitterError> {
    match value {
        HeaderValue::DateTime(datetime) => emitter.add_date(datetime),
        _ => Err(EmitterError::ValueMismatch),
    }
}

pub(crate) fn encode_unstructured(
    emitter: &mut HeaderEmitter<'_>,
    value: &HeaderValue,
) -> Result<(), EmitterError> {
    match value {
        HeaderValue::Text(text) => emitter.add_unstructured(text),
        HeaderValue::TextList(list) => match list.first() {
            Some(text) => emitter.add_unstructured(text),
            None => Ok(()),
        },
        _ => Err(EmitterError::ValueMismatch),
    }
}

pub(crate) fn encode_parameterized(
    emitter: &mut HeaderEmitter<'_>,
    value: &HeaderValue,
) -> Result<(), EmitterError> {
    match value {
        HeaderValue::ContentType(content_type) => emitter.add_parameterized(content_type),
        _ => Err(EmitterError::ValueMismatch),
    }
}
