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

//! Canonicalization of header fields and message bodies.

use crate::{
    header::{FieldBody, FieldName, HeaderFields},
    message::Message,
    parse::is_wsp_byte,
    signature::CanonicalizationAlgorithm,
};
use bstr::ByteSlice;

const SP: u8 = b' ';
const CR: u8 = b'\r';
const LF: u8 = b'\n';
const CRLF: [u8; 2] = [CR, LF];

// what was seen last
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum CanonState {
    Init,
    CrLf,
    Cr,
    Wsp,
    WspCr,
    Byte,
}

/// A streaming body canonicalizer.
///
/// Feeding a body in chunks through [`BodyCanonicalizer::canon_chunk`] and
/// appending [`BodyCanonicalizer::finish`] gives the same result as
/// [`canonicalize_body`], regardless of how the body was split.
#[derive(Clone, Debug)]
pub struct BodyCanonicalizer {
    algorithm: CanonicalizationAlgorithm,
    state: CanonState,
    blank_line: bool,  // whether currently on an empty or blank line
    empty_lines: usize,  // number of held-back empty lines
    started: bool,  // whether any output has been produced
}

impl BodyCanonicalizer {
    pub fn new(algorithm: CanonicalizationAlgorithm) -> Self {
        Self {
            algorithm,
            state: CanonState::Init,
            blank_line: true,
            empty_lines: 0,
            started: false,
        }
    }

    pub fn simple() -> Self {
        Self::new(CanonicalizationAlgorithm::Simple)
    }

    pub fn relaxed() -> Self {
        Self::new(CanonicalizationAlgorithm::Relaxed)
    }

    // only CRLF is recognised as line terminator, stray CR and LF are treated
    // like other bytes
    pub fn canon_chunk(&mut self, bytes: &[u8]) -> Vec<u8> {
        match self.algorithm {
            CanonicalizationAlgorithm::Simple => self.canon_chunk_simple(bytes),
            CanonicalizationAlgorithm::Relaxed => self.canon_chunk_relaxed(bytes),
        }
    }

    fn canon_chunk_simple(&mut self, bytes: &[u8]) -> Vec<u8> {
        let mut result = Vec::with_capacity(bytes.len());

        for &b in bytes {
            match self.state {
                CanonState::Init | CanonState::CrLf => {
                    if b == CR {
                        self.state = CanonState::Cr;
                    } else {
                        self.flush_empty_lines(&mut result);
                        result.push(b);
                        self.state = CanonState::Byte;
                    }
                }
                CanonState::Cr => {
                    if b == LF {
                        self.end_line(&mut result);
                        continue;
                    }

                    self.flush_empty_lines(&mut result);
                    result.push(CR);

                    if b != CR {
                        result.push(b);
                        self.state = CanonState::Byte;
                    }
                }
                CanonState::Byte => {
                    if b == CR {
                        self.state = CanonState::Cr;
                    } else {
                        result.push(b);
                    }
                }
                CanonState::Wsp | CanonState::WspCr => unreachable!(),
            }
        }

        result
    }

    fn canon_chunk_relaxed(&mut self, bytes: &[u8]) -> Vec<u8> {
        let mut result = Vec::with_capacity(bytes.len());

        for &b in bytes {
            match self.state {
                CanonState::Init | CanonState::CrLf => {
                    if is_wsp_byte(b) {
                        self.state = CanonState::Wsp;
                    } else if b == CR {
                        self.state = CanonState::Cr;
                    } else {
                        self.flush_empty_lines(&mut result);
                        result.push(b);
                        self.state = CanonState::Byte;
                    }
                }
                CanonState::Wsp => {
                    if b == CR {
                        self.state = CanonState::WspCr;
                    } else if !is_wsp_byte(b) {
                        self.flush_empty_lines(&mut result);
                        result.push(SP);
                        result.push(b);
                        self.state = CanonState::Byte;
                    }
                }
                CanonState::Cr => {
                    if b == LF {
                        self.end_line(&mut result);
                        continue;
                    }

                    self.flush_empty_lines(&mut result);
                    result.push(CR);

                    if is_wsp_byte(b) {
                        self.state = CanonState::Wsp;
                    } else if b != CR {
                        result.push(b);
                        self.state = CanonState::Byte;
                    }
                }
                CanonState::WspCr => {
                    if b == LF {
                        self.end_line(&mut result);
                        continue;
                    }

                    self.flush_empty_lines(&mut result);
                    result.push(SP);
                    result.push(CR);

                    if b == CR {
                        self.state = CanonState::Cr;
                    } else if is_wsp_byte(b) {
                        self.state = CanonState::Wsp;
                    } else {
                        result.push(b);
                        self.state = CanonState::Byte;
                    }
                }
                CanonState::Byte => {
                    if is_wsp_byte(b) {
                        self.state = CanonState::Wsp;
                    } else if b == CR {
                        self.state = CanonState::Cr;
                    } else {
                        result.push(b);
                    }
                }
            }
        }

        result
    }

    /// Completes canonicalization, returning the final piece of output.
    pub fn finish(mut self) -> Vec<u8> {
        let mut result = vec![];

        match (self.algorithm, self.state) {
            (CanonicalizationAlgorithm::Simple, CanonState::Init | CanonState::CrLf) => {
                // a body of only empty lines is a single CRLF
                if !self.started {
                    result.extend(CRLF);
                }
            }
            (CanonicalizationAlgorithm::Relaxed, CanonState::Init | CanonState::CrLf) => {}
            (_, CanonState::Cr) => {
                self.flush_empty_lines(&mut result);
                result.push(CR);
                result.extend(CRLF);
            }
            (_, CanonState::Wsp) => {
                // trailing WSP is dropped; a blank final line is an empty line
                if !self.blank_line {
                    result.extend(CRLF);
                }
            }
            (_, CanonState::WspCr) => {
                self.flush_empty_lines(&mut result);
                result.push(SP);
                result.push(CR);
                result.extend(CRLF);
            }
            (_, CanonState::Byte) => {
                result.extend(CRLF);
            }
        }

        result
    }

    fn end_line(&mut self, result: &mut Vec<u8>) {
        if self.blank_line {
            self.empty_lines += 1;
        } else {
            result.extend(CRLF);
            self.blank_line = true;
        }
        self.state = CanonState::CrLf;
    }

    // empty lines are held back until a byte shows they are not trailing
    fn flush_empty_lines(&mut self, result: &mut Vec<u8>) {
        for _ in 0..self.empty_lines {
            result.extend(CRLF);
        }
        self.empty_lines = 0;
        self.blank_line = false;
        self.started = true;
    }
}

/// Canonicalizes a complete message body.
pub fn canonicalize_body(algorithm: CanonicalizationAlgorithm, body: &[u8]) -> Vec<u8> {
    let mut canonicalizer = BodyCanonicalizer::new(algorithm);
    let mut result = canonicalizer.canon_chunk(body);
    result.extend(canonicalizer.finish());
    result
}

/// Selects the header fields named in `selected_headers`, in the order given,
/// and returns their indexes.
///
/// Each selected name takes the bottom-most instance of that name not yet
/// used. If a selected name has no unused instance left, that name is
/// returned as the error.
pub fn select_headers(
    headers: &HeaderFields,
    selected_headers: &[FieldName],
) -> Result<Vec<usize>, FieldName> {
    let headers = headers.as_ref();

    let mut used = vec![false; headers.len()];

    selected_headers
        .iter()
        .map(|selected| {
            let index = headers
                .iter()
                .enumerate()
                .rev()
                .find(|(i, (name, _))| !used[*i] && name == selected)
                .map(|(i, _)| i)
                .ok_or_else(|| selected.clone())?;

            used[index] = true;

            Ok(index)
        })
        .collect()
}

/// Canonicalizes the header fields selected by name, in the order given.
///
/// Header fields are selected as by [`select_headers`].
pub fn canonicalize_headers(
    algorithm: CanonicalizationAlgorithm,
    headers: &HeaderFields,
    selected_headers: &[FieldName],
) -> Result<Vec<u8>, FieldName> {
    let mut result = vec![];

    for index in select_headers(headers, selected_headers)? {
        let (name, value) = &headers.as_ref()[index];
        canonicalize_header_into(&mut result, algorithm, name, value);
        result.extend(CRLF);
    }

    Ok(result)
}

/// Canonicalizes the message’s header fields selected by name, in the order
/// given.
///
/// Unlike [`canonicalize_headers`], simple canonicalization reproduces each
/// field name exactly as it appears in the message, including whitespace
/// before the colon.
pub fn canonicalize_message_headers(
    algorithm: CanonicalizationAlgorithm,
    message: &Message,
    selected_headers: &[FieldName],
) -> Result<Vec<u8>, FieldName> {
    let headers = message.headers();

    let mut result = vec![];

    for index in select_headers(headers, selected_headers)? {
        let (name, value) = &headers.as_ref()[index];
        let name = message_header_name(algorithm, message, index, name);
        canonicalize_header_into(&mut result, algorithm, name, value);
        result.extend(CRLF);
    }

    Ok(result)
}

/// The name to canonicalize for the message’s header field at `index`: the
/// raw name for simple, the parsed name for relaxed canonicalization.
pub fn message_header_name<'a>(
    algorithm: CanonicalizationAlgorithm,
    message: &'a Message,
    index: usize,
    name: &'a FieldName,
) -> &'a str {
    match algorithm {
        CanonicalizationAlgorithm::Simple => {
            message.raw_header_name(index).unwrap_or(name.as_ref())
        }
        CanonicalizationAlgorithm::Relaxed => name.as_ref(),
    }
}

/// Canonicalizes one header field, terminated with CRLF.
pub fn canonicalize_header(
    algorithm: CanonicalizationAlgorithm,
    name: impl AsRef<str>,
    value: impl AsRef<[u8]>,
) -> Vec<u8> {
    let mut result = vec![];
    canonicalize_header_into(&mut result, algorithm, name, value);
    result.extend(CRLF);
    result
}

/// Canonicalizes a header field into some result vector, without line
/// terminator.
pub fn canonicalize_header_into(
    result: &mut Vec<u8>,
    algorithm: CanonicalizationAlgorithm,
    name: impl AsRef<str>,
    value: impl AsRef<[u8]>,
) {
    let name = name.as_ref();
    let value = value.as_ref();

    match algorithm {
        CanonicalizationAlgorithm::Simple => {
            result.extend(name.bytes());
            result.push(b':');
            result.extend(value);
        }
        CanonicalizationAlgorithm::Relaxed => {
            result.extend(name.to_ascii_lowercase().bytes());
            result.push(b':');
            canonicalize_header_relaxed(result, value);
        }
    }
}

fn canonicalize_header_relaxed(result: &mut Vec<u8>, value: &[u8]) {
    fn is_space(c: char) -> bool {
        matches!(c, ' ' | '\t' | '\r' | '\n')
    }

    debug_assert!(FieldBody::new(value).is_ok());

    let value = value.trim_with(is_space);

    let mut compressing = false;
    for &b in value {
        if is_space(b.into()) {
            if !compressing {
                result.push(SP);
                compressing = true;
            }
        } else {
            result.push(b);
            compressing = false;
        }
    }
}
