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

//! Inspection of DKIM signatures in a message.
//!
//! Inspection reconstructs what the signer hashed and signed: the *signing
//! input*, made up of the canonicalized signed header fields followed by the
//! canonicalized `DKIM-Signature` header field with its b= value removed.

use crate::{
    canonicalize::{canonicalize_header_into, canonicalize_message_headers, message_header_name},
    header::{FieldBody, FieldName},
    message::{Message, MessageError},
    resolver,
    signature::{
        DkimSignature, DkimSignatureError, DkimSignatureErrorKind, DomainName, DKIM_SIGNATURE_NAME,
    },
    tag_list::strip_tag_name_and_equals,
};
use std::{
    borrow::Cow,
    error::Error,
    fmt::{self, Display, Formatter},
    str,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InspectError {
    MessageFormat(MessageError),
    MissingSignature,
    MultipleSignatures,
    MalformedTagList(DkimSignatureError),
    SignedHeaderNotFound(FieldName),
    InvalidSignatureEncoding,
}

impl Display for InspectError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::MessageFormat(e) => write!(f, "ill-formed message: {e}"),
            Self::MissingSignature => write!(f, "no matching DKIM-Signature header"),
            Self::MultipleSignatures => write!(f, "more than one matching DKIM-Signature header"),
            Self::MalformedTagList(e) => write!(f, "malformed DKIM-Signature: {e}"),
            Self::SignedHeaderNotFound(name) => write!(f, "signed header {name} not found"),
            Self::InvalidSignatureEncoding => write!(f, "invalid Base64 in b= tag"),
        }
    }
}

impl Error for InspectError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::MessageFormat(e) => Some(e),
            Self::MalformedTagList(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MessageError> for InspectError {
    fn from(error: MessageError) -> Self {
        Self::MessageFormat(error)
    }
}

/// A `DKIM-Signature` header field found in a message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureHeader {
    /// Index of the header field in the message.
    pub index: usize,
    pub name: FieldName,
    pub value: FieldBody,
    pub signature: Result<DkimSignature, DkimSignatureError>,
}

/// The result of inspecting one DKIM signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Inspection {
    pub signature: DkimSignature,
    /// The decoded b= tag value.
    pub signature_data: Box<[u8]>,
    /// The bytes that were hashed and signed.
    pub signing_input: Box<[u8]>,
    /// Index of the `DKIM-Signature` header field in the message.
    pub header_index: usize,
}

impl Inspection {
    /// The DNS name of the signature’s key record.
    pub fn key_query_name(&self) -> String {
        resolver::key_query_name(self.signature.domain.as_ref(), self.signature.selector.as_ref())
    }
}

/// Extracts all `DKIM-Signature` header fields in message order.
///
/// Each is parsed on its own; a parse failure is recorded in that entry only.
pub fn extract_signatures(message: &Message) -> Vec<SignatureHeader> {
    message
        .headers()
        .as_ref()
        .iter()
        .enumerate()
        .filter(|(_, (name, _))| *name == DKIM_SIGNATURE_NAME)
        .map(|(index, (name, value))| {
            let signature = match str::from_utf8(value.as_ref()) {
                Ok(s) => s.parse(),
                Err(_) => Err(DkimSignatureError {
                    domain: None,
                    selector: None,
                    kind: DkimSignatureErrorKind::InvalidTagList,
                }),
            };

            SignatureHeader {
                index,
                name: name.clone(),
                value: value.clone(),
                signature,
            }
        })
        .collect()
}

/// Assembles the signing input and decodes the signature data for one
/// `DKIM-Signature` header field of the message.
pub fn assemble(message: &Message, header: &SignatureHeader) -> Result<Inspection, InspectError> {
    let signature = header
        .signature
        .clone()
        .map_err(InspectError::MalformedTagList)?;

    let algorithm = signature.canonicalization.header;

    let mut signing_input =
        canonicalize_message_headers(algorithm, message, &signature.signed_headers)
            .map_err(InspectError::SignedHeaderNotFound)?;

    // a successfully parsed signature is UTF-8
    let value = String::from_utf8_lossy(header.value.as_ref());
    let value = strip_b_tag_value(&value);

    // no final CRLF after the DKIM-Signature header
    let name = message_header_name(algorithm, message, header.index, &header.name);
    canonicalize_header_into(&mut signing_input, algorithm, name, value.as_bytes());

    let signature_data = signature
        .signature_data()
        .map_err(|_| InspectError::InvalidSignatureEncoding)?;

    if signature_data.is_empty() {
        return Err(InspectError::InvalidSignatureEncoding);
    }

    Ok(Inspection {
        signature,
        signature_data: signature_data.into(),
        signing_input: signing_input.into(),
        header_index: header.index,
    })
}

/// Inspects the first DKIM signature of a message.
pub fn inspect(message: &[u8]) -> Result<Inspection, InspectError> {
    let message = Message::parse(message)?;

    let signatures = extract_signatures(&message);

    let header = signatures.first().ok_or(InspectError::MissingSignature)?;

    assemble(&message, header)
}

/// Inspects all DKIM signatures of a message, each with its own result.
pub fn inspect_all(message: &[u8]) -> Result<Vec<Result<Inspection, InspectError>>, InspectError> {
    let message = Message::parse(message)?;

    let signatures = extract_signatures(&message);

    if signatures.is_empty() {
        return Err(InspectError::MissingSignature);
    }

    Ok(signatures.iter().map(|h| assemble(&message, h)).collect())
}

/// Inspects the one DKIM signature of a message with the given domain (d=)
/// and selector (s=).
///
/// A signature that cannot be parsed still matches if its d= and s= tags can
/// be read.
pub fn inspect_selected(
    message: &[u8],
    domain: &str,
    selector: &str,
) -> Result<Inspection, InspectError> {
    let message = Message::parse(message)?;

    let signatures = extract_signatures(&message);

    let mut matching = signatures.iter().filter(|h| {
        let (d, s) = match &h.signature {
            Ok(sig) => (Some(&sig.domain), Some(&sig.selector)),
            Err(e) => (e.domain.as_ref(), e.selector.as_ref()),
        };
        matches!(d, Some(d) if domain_matches(d, domain))
            && matches!(s, Some(s) if s.as_ref().eq_ignore_ascii_case(selector))
    });

    let header = matching.next().ok_or(InspectError::MissingSignature)?;

    if matching.next().is_some() {
        return Err(InspectError::MultipleSignatures);
    }

    assemble(&message, header)
}

fn domain_matches(domain: &DomainName, s: &str) -> bool {
    let s = idna::domain_to_ascii(s).unwrap_or_else(|_| s.into());
    domain.to_ascii().eq_ignore_ascii_case(&s)
}

/// Removes the value of the first b= tag in a `DKIM-Signature` header field
/// value, keeping the tag itself and all surrounding text.
pub fn strip_b_tag_value(value: &str) -> Cow<'_, str> {
    let mut start = 0;

    for tag_spec in value.split(';') {
        let end = start + tag_spec.len();

        if let Some((rest, "b")) = strip_tag_name_and_equals(tag_spec) {
            let value_start = end - rest.len();
            let mut result = String::with_capacity(value.len());
            result.push_str(&value[..value_start]);
            result.push_str(&value[end..]);
            return result.into();
        }

        start = end + 1;
    }

    value.into()
}
