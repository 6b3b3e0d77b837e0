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


//! A library for inspecting *DomainKeys Identified Mail* (DKIM) signatures, as
//! described in [RFC 6376].
//!
//! Given a raw email message, this library locates its `DKIM-Signature` header
//! fields, parses their tag lists, and reconstructs the exact byte sequence
//! that was signed (the *signing input*), together with the decoded signature
//! data. It can also retrieve and decode the signer’s public key from DNS.
//!
//! The [`Inspection`] result holds all inputs needed for checking the
//! cryptographic signature. Callers may do that themselves, or use the
//! verification routine in module [`verify`][mod@verify].
//!
//! # Usage
//!
//! The functions [`inspect`], [`inspect_all`], and [`inspect_selected`] are the
//! entry points for inspecting a message. Function [`resolve_key`] retrieves
//! the public key for a signature’s domain and selector, and function
//! [`verify()`] checks an inspected signature against the signer’s key record.
//!
//! ```
//! let message = b"\
//! DKIM-Signature: v=1; a=rsa-sha256; d=example.com; s=sel; h=From;\r\n\
//! \tbh=47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU=; b=YWJj\r\n\
//! From: me@example.com\r\n\
//! \r\n";
//!
//! let inspection = dkim_inspector::inspect(message).unwrap();
//!
//! assert_eq!(inspection.signature_data.as_ref(), b"abc");
//! assert_eq!(inspection.key_query_name(), "sel._domainkey.example.com");
//! ```
//!
//! # Cargo features
//!
//! The feature **`hickory-resolver`** makes an implementation of
//! [`LookupTxt`][crate::resolver::LookupTxt] available for the Hickory DNS
//! resolver.
//!
//! The feature **`pre-rfc8301`** reverts cryptographic algorithm usage back to
//! before [RFC 8301]: it enables dependency `sha1` and thereby the insecure,
//! historic SHA-1 hash algorithm and signature algorithm `rsa-sha1`. Without
//! this feature, a signature using `rsa-sha1` is rejected as historic. This is
//! a legacy compatibility feature, its use is strongly discouraged.
//!
//! [RFC 6376]: https://www.rfc-editor.org/rfc/rfc6376
//! [RFC 8301]: https://www.rfc-editor.org/rfc/rfc8301

pub mod canonicalize;
pub mod crypto;
pub mod header;
pub mod inspect;
pub mod key;
pub mod message;
mod parse;
pub mod record;
pub mod resolver;
pub mod signature;
mod tag_list;
mod util;
pub mod verify;

pub use crate::{
    header::{FieldBody, FieldName, HeaderField, HeaderFields},
    inspect::{inspect, inspect_all, inspect_selected, InspectError, Inspection},
    key::{KeyError, PublicKey},
    message::{Message, MessageError},
    record::DkimKeyRecord,
    resolver::{resolve_key, resolve_record, LookupTxt},
    signature::{DkimSignature, DomainName, Selector, SignatureAlgorithm},
    util::{decode_base64, encode_base64, Base64Error, CanonicalStr},
    verify::{verify, Config, VerificationError},
};
