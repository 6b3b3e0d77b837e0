// dkim-inspector – inspection of DKIM signatures and key records
// Copyright © 2022–2023 David Bürgin <dbuergin@gluet.ch>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.

//! Raw email messages.
//!
//! A [`Message`] holds the message bytes with line endings normalised to CRLF,
//! the header fields in message order together with their byte spans, and the
//! body.

use crate::{
    header::{FieldBody, FieldName, HeaderField, HeaderFields},
    parse::is_wsp_byte,
};
use bstr::ByteSlice;
use std::{
    borrow::Cow,
    error::Error,
    fmt::{self, Display, Formatter},
    ops::Range,
    str,
};
use tracing::trace;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MessageError {
    NoHeaderFields,
}

impl Display for MessageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoHeaderFields => write!(f, "no header fields"),
        }
    }
}

impl Error for MessageError {}

/// An email message, split into header fields and body.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Message {
    data: Box<[u8]>,
    headers: HeaderFields,
    spans: Box<[Range<usize>]>,
    body_offset: usize,
}

impl Message {
    /// Parses a raw message.
    ///
    /// Bare LF line endings are converted to CRLF first. A leading mbox
    /// `From ` line is skipped. The header block ends at the first empty line;
    /// a message without an empty line has only a header block and an empty
    /// body.
    ///
    /// Lines in the header block that do not form a header field are skipped:
    /// they stay in the message bytes but are not among the header fields.
    pub fn parse(input: &[u8]) -> Result<Self, MessageError> {
        let data = normalize_line_endings(input).into_owned();

        let header_start = if is_mbox_from_line(&data) {
            data.find(b"\r\n").map_or(data.len(), |i| i + 2)
        } else {
            0
        };

        let rest = &data[header_start..];
        let (header_end, body_offset) = if rest.starts_with(b"\r\n") {
            (0, 2)
        } else {
            match rest.find(b"\r\n\r\n") {
                Some(i) => (i, i + 4),
                None if rest.ends_with(b"\r\n") => (rest.len() - 2, rest.len()),
                None => (rest.len(), rest.len()),
            }
        };

        let fields = parse_header_block(&rest[..header_end]);

        let (fields, spans): (Vec<_>, Vec<_>) = fields
            .into_iter()
            .map(|(field, span)| (field, (span.start + header_start)..(span.end + header_start)))
            .unzip();

        let headers = HeaderFields::new(fields).map_err(|_| MessageError::NoHeaderFields)?;

        Ok(Self {
            data: data.into(),
            headers,
            spans: spans.into(),
            body_offset: header_start + body_offset,
        })
    }

    pub fn headers(&self) -> &HeaderFields {
        &self.headers
    }

    /// Returns the byte span of the header field at the given index, from the
    /// first byte of the name up to (not including) the terminating CRLF.
    pub fn header_span(&self, index: usize) -> Option<Range<usize>> {
        self.spans.get(index).cloned()
    }

    /// Returns the header field at the given index as it appears in the
    /// message, without the terminating CRLF.
    pub fn raw_header_field(&self, index: usize) -> Option<&[u8]> {
        self.spans.get(index).map(|span| &self.data[span.clone()])
    }

    /// Returns the name of the header field at the given index as it appears
    /// in the message, including any whitespace before the colon.
    pub fn raw_header_name(&self, index: usize) -> Option<&str> {
        let raw = self.raw_header_field(index)?;
        let (_, body) = self.headers.as_ref().get(index)?;
        let len = raw.len().checked_sub(body.as_ref().len() + 1)?;
        str::from_utf8(&raw[..len]).ok()
    }

    pub fn body(&self) -> &[u8] {
        &self.data[self.body_offset..]
    }

    /// Returns the whole message, with normalised line endings.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// Converts bare LF line endings to CRLF. Stray CR bytes are left alone.
pub fn normalize_line_endings(input: &[u8]) -> Cow<'_, [u8]> {
    let has_bare_lf = input
        .iter()
        .enumerate()
        .any(|(i, &b)| b == b'\n' && (i == 0 || input[i - 1] != b'\r'));

    if !has_bare_lf {
        return Cow::Borrowed(input);
    }

    let mut result = Vec::with_capacity(input.len() + input.len() / 32);
    let mut prev = None;
    for &b in input {
        if b == b'\n' && prev != Some(b'\r') {
            result.push(b'\r');
        }
        result.push(b);
        prev = Some(b);
    }

    Cow::Owned(result)
}

/// Whether the data begins with an mbox `From ` separator line, as opposed
/// to a `From` header field with whitespace before the colon.
fn is_mbox_from_line(data: &[u8]) -> bool {
    match data.strip_prefix(b"From ") {
        Some(rest) => !rest.trim_start_with(|c| matches!(c, ' ' | '\t')).starts_with(b":"),
        None => false,
    }
}

/// Parses a header block (CRLF-separated, without the final CRLF) into header
/// fields and their spans within the block.
///
/// Whitespace between field name and colon is not part of the name. Lines
/// that do not form a header field, together with their continuation lines,
/// are skipped.
pub fn parse_header_block(block: &[u8]) -> Vec<(HeaderField, Range<usize>)> {
    if block.is_empty() {
        return vec![];
    }

    // span of each field, and index of its colon if it has one
    let mut fields: Vec<(Range<usize>, Option<usize>)> = vec![];

    let mut start = 0;
    for line in block.split_str("\r\n") {
        let end = start + line.len();

        match fields.last_mut() {
            Some((span, _)) if line.first().map_or(false, |&b| is_wsp_byte(b)) => {
                span.end = end;
            }
            _ => {
                let colon = line.find_byte(b':').map(|i| start + i);
                fields.push((start..end, colon));
            }
        }

        start = end + 2;
    }

    fields
        .into_iter()
        .filter_map(|(span, colon)| {
            let field = colon.and_then(|colon| {
                let name = block[span.start..colon].trim_end_with(|c| matches!(c, ' ' | '\t'));
                let name = FieldName::new(str::from_utf8(name).ok()?).ok()?;
                let body = FieldBody::new(&block[(colon + 1)..span.end]).ok()?;
                Some((name, body))
            });

            if field.is_none() {
                trace!(line = ?block[span.clone()].as_bstr(), "skipping ill-formed header line");
            }

            field.map(|field| (field, span))
        })
        .collect()
}
