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

//! The `DKIM-Signature` header field.

mod names;

pub use names::{DomainName, ParseDomainError, Selector};

use crate::{
    crypto::{HashAlgorithm, KeyType},
    header::FieldName,
    tag_list::{
        parse_base64_tag_value, parse_colon_separated_tag_value, strip_fws_from_tag_value,
        TagList, TagListParseError, TagSpec,
    },
    util::{self, Base64Error, CanonicalStr},
};
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    str::FromStr,
};

pub const DKIM_SIGNATURE_NAME: &str = "DKIM-Signature";

/// A signature algorithm.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SignatureAlgorithm {
    /// The *rsa-sha1* signature algorithm, historic since RFC 8301. Without
    /// feature `pre-rfc8301` it can be inspected but not verified.
    RsaSha1,
    /// The *rsa-sha256* signature algorithm.
    RsaSha256,
    /// The *ed25519-sha256* signature algorithm.
    Ed25519Sha256,
}

impl SignatureAlgorithm {
    pub fn to_key_type(self) -> KeyType {
        match self {
            Self::RsaSha1 | Self::RsaSha256 => KeyType::Rsa,
            Self::Ed25519Sha256 => KeyType::Ed25519,
        }
    }

    /// The hash algorithm, if hashing with it is supported.
    pub fn to_hash_algorithm(self) -> Option<HashAlgorithm> {
        match self {
            #[cfg(feature = "pre-rfc8301")]
            Self::RsaSha1 => Some(HashAlgorithm::Sha1),
            #[cfg(not(feature = "pre-rfc8301"))]
            Self::RsaSha1 => None,
            Self::RsaSha256 | Self::Ed25519Sha256 => Some(HashAlgorithm::Sha256),
        }
    }
}

impl CanonicalStr for SignatureAlgorithm {
    fn canonical_str(&self) -> &'static str {
        match self {
            Self::RsaSha1 => "rsa-sha1",
            Self::RsaSha256 => "rsa-sha256",
            Self::Ed25519Sha256 => "ed25519-sha256",
        }
    }
}

impl Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_str())
    }
}

impl FromStr for SignatureAlgorithm {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rsa-sha1" => Ok(Self::RsaSha1),
            "rsa-sha256" => Ok(Self::RsaSha256),
            "ed25519-sha256" => Ok(Self::Ed25519Sha256),
            _ => Err("unknown signature algorithm"),
        }
    }
}

/// A canonicalization algorithm.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum CanonicalizationAlgorithm {
    /// The *simple* canonicalization algorithm.
    #[default]
    Simple,
    /// The *relaxed* canonicalization algorithm.
    Relaxed,
}

impl CanonicalStr for CanonicalizationAlgorithm {
    fn canonical_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Relaxed => "relaxed",
        }
    }
}

impl Display for CanonicalizationAlgorithm {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_str())
    }
}

impl FromStr for CanonicalizationAlgorithm {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("simple") {
            Ok(Self::Simple)
        } else if s.eq_ignore_ascii_case("relaxed") {
            Ok(Self::Relaxed)
        } else {
            Err("unknown canonicalization algorithm")
        }
    }
}

/// A pair of header/body canonicalization algorithms.
#[derive(Clone, Copy, Default, Eq, Hash, PartialEq)]
pub struct Canonicalization {
    pub header: CanonicalizationAlgorithm,
    pub body: CanonicalizationAlgorithm,
}

impl Display for Canonicalization {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.header, self.body)
    }
}

impl fmt::Debug for Canonicalization {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{:?}", self.header, self.body)
    }
}

impl FromStr for Canonicalization {
    type Err = &'static str;

    /// Parses a c= value. A lone algorithm applies to the header, and the body
    /// then uses *simple*.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (header, body) = match s.split_once('/') {
            Some((header, body)) => (header.parse()?, body.parse()?),
            None => (s.parse()?, Default::default()),
        };
        Ok(Self { header, body })
    }
}

/// An error that occurred when parsing a `DKIM-Signature` header field.
///
/// Where the tag-list was readable, the domain and selector are included for
/// diagnostics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DkimSignatureError {
    pub domain: Option<DomainName>,
    pub selector: Option<Selector>,
    pub kind: DkimSignatureErrorKind,
}

impl Display for DkimSignatureError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

impl Error for DkimSignatureError {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DkimSignatureErrorKind {
    InvalidTagList,
    DuplicateTag,
    MissingVersionTag,
    UnsupportedVersion,
    UnsupportedAlgorithm,
    MissingAlgorithmTag,
    MissingSignatureTag,
    InvalidBodyHash,
    MissingBodyHashTag,
    UnsupportedCanonicalization,
    InvalidDomain,
    MissingDomainTag,
    SignedHeadersEmpty,
    InvalidSignedHeaderName,
    FromHeaderNotSigned,
    MissingSignedHeadersTag,
    InvalidBodyLength,
    QueryMethodsNotSupported,
    InvalidSelector,
    MissingSelectorTag,
    InvalidTimestamp,
    InvalidExpiration,
    ExpirationNotAfterTimestamp,
    InvalidUserId,
    DomainMismatch,
}

impl Display for DkimSignatureErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTagList => write!(f, "ill-formed tag-list"),
            Self::DuplicateTag => write!(f, "duplicate tag"),
            Self::MissingVersionTag => write!(f, "v= tag missing"),
            Self::UnsupportedVersion => write!(f, "v= tag has unsupported version"),
            Self::UnsupportedAlgorithm => write!(f, "a= tag has unsupported signature algorithm"),
            Self::MissingAlgorithmTag => write!(f, "a= tag missing"),
            Self::MissingSignatureTag => write!(f, "b= tag missing"),
            Self::InvalidBodyHash => write!(f, "bh= tag has invalid Base64 value"),
            Self::MissingBodyHashTag => write!(f, "bh= tag missing"),
            Self::UnsupportedCanonicalization => write!(f, "c= tag has unsupported canonicalization"),
            Self::InvalidDomain => write!(f, "d= tag has invalid domain"),
            Self::MissingDomainTag => write!(f, "d= tag missing"),
            Self::SignedHeadersEmpty => write!(f, "h= tag is empty"),
            Self::InvalidSignedHeaderName => write!(f, "h= tag has invalid header name"),
            Self::FromHeaderNotSigned => write!(f, "h= tag does not include From"),
            Self::MissingSignedHeadersTag => write!(f, "h= tag missing"),
            Self::InvalidBodyLength => write!(f, "l= tag has invalid body length"),
            Self::QueryMethodsNotSupported => write!(f, "q= tag does not include dns/txt"),
            Self::InvalidSelector => write!(f, "s= tag has invalid selector"),
            Self::MissingSelectorTag => write!(f, "s= tag missing"),
            Self::InvalidTimestamp => write!(f, "t= tag has invalid timestamp"),
            Self::InvalidExpiration => write!(f, "x= tag has invalid expiration"),
            Self::ExpirationNotAfterTimestamp => write!(f, "x= tag not after t= tag"),
            Self::InvalidUserId => write!(f, "i= tag has invalid identity"),
            Self::DomainMismatch => write!(f, "i= tag domain not within d= domain"),
        }
    }
}

/// A DKIM signature as encoded in a `DKIM-Signature` header field.
///
/// The b= value is kept as text (with FWS removed) so that a signature can be
/// inspected even when its signature data does not decode. The i= and z= tags
/// are kept as written.
#[derive(Clone, Eq, PartialEq)]
pub struct DkimSignature {
    pub algorithm: SignatureAlgorithm,
    pub signature_data_base64: Box<str>,
    pub body_hash: Box<[u8]>,
    pub canonicalization: Canonicalization,
    pub domain: DomainName,
    pub signed_headers: Box<[FieldName]>,  // not empty, includes From
    pub user_id: Option<Box<str>>,
    pub body_length: Option<u64>,
    pub selector: Selector,
    pub timestamp: Option<u64>,
    pub expiration: Option<u64>,
    pub copied_headers: Option<Box<str>>,
}

impl DkimSignature {
    /// Decodes the b= tag value.
    pub fn signature_data(&self) -> Result<Vec<u8>, Base64Error> {
        util::decode_base64(&self.signature_data_base64)
    }

    fn from_tag_list(tag_list: &TagList<'_>) -> Result<Self, DkimSignatureErrorKind> {
        use DkimSignatureErrorKind::*;

        let mut version_seen = false;
        let mut algorithm = None;
        let mut signature_data_base64 = None;
        let mut body_hash = None;
        let mut canonicalization = None;
        let mut domain = None;
        let mut signed_headers = None;
        let mut user_id = None;
        let mut body_length = None;
        let mut selector = None;
        let mut timestamp = None;
        let mut expiration = None;
        let mut copied_headers = None;

        for &TagSpec { name, value } in tag_list.as_ref() {
            match name {
                "v" => {
                    if value != "1" {
                        return Err(UnsupportedVersion);
                    }
                    version_seen = true;
                }
                "a" => {
                    let value = value.parse().map_err(|_| UnsupportedAlgorithm)?;
                    algorithm = Some(value);
                }
                "b" => {
                    signature_data_base64 = Some(strip_fws_from_tag_value(value).into());
                }
                "bh" => {
                    let value = parse_base64_tag_value(value).map_err(|_| InvalidBodyHash)?;
                    if value.is_empty() {
                        return Err(InvalidBodyHash);
                    }
                    body_hash = Some(value.into());
                }
                "c" => {
                    let value = value.parse().map_err(|_| UnsupportedCanonicalization)?;
                    canonicalization = Some(value);
                }
                "d" => {
                    let value = DomainName::new(value).map_err(|_| InvalidDomain)?;
                    domain = Some(value);
                }
                "h" => {
                    if value.is_empty() {
                        return Err(SignedHeadersEmpty);
                    }
                    let names = parse_colon_separated_tag_value(value)
                        .into_iter()
                        .map(FieldName::new)
                        .collect::<Result<Vec<_>, _>>()
                        .map_err(|_| InvalidSignedHeaderName)?;
                    if !names.iter().any(|name| *name == "From") {
                        return Err(FromHeaderNotSigned);
                    }
                    signed_headers = Some(names.into());
                }
                "i" => {
                    let (_, domain_part) = value.rsplit_once('@').ok_or(InvalidUserId)?;
                    let domain_part = DomainName::new(domain_part).map_err(|_| InvalidUserId)?;
                    user_id = Some((value, domain_part));
                }
                "l" => {
                    let value = parse_decimal(value).ok_or(InvalidBodyLength)?;
                    body_length = Some(value);
                }
                "q" => {
                    if !parse_colon_separated_tag_value(value)
                        .iter()
                        .any(|v| v.eq_ignore_ascii_case("dns/txt"))
                    {
                        return Err(QueryMethodsNotSupported);
                    }
                }
                "s" => {
                    let value = Selector::new(value).map_err(|_| InvalidSelector)?;
                    selector = Some(value);
                }
                "t" => {
                    let value = parse_decimal(value).ok_or(InvalidTimestamp)?;
                    timestamp = Some(value);
                }
                "x" => {
                    let value = parse_decimal(value).ok_or(InvalidExpiration)?;
                    expiration = Some(value);
                }
                "z" => {
                    copied_headers = Some(strip_fws_from_tag_value(value).into());
                }
                _ => {}
            }
        }

        if !version_seen {
            return Err(MissingVersionTag);
        }

        let algorithm = algorithm.ok_or(MissingAlgorithmTag)?;
        let signature_data_base64 = signature_data_base64.ok_or(MissingSignatureTag)?;
        let body_hash = body_hash.ok_or(MissingBodyHashTag)?;
        let domain = domain.ok_or(MissingDomainTag)?;
        let signed_headers = signed_headers.ok_or(MissingSignedHeadersTag)?;
        let selector = selector.ok_or(MissingSelectorTag)?;

        let user_id = match user_id {
            Some((i, i_domain)) => {
                if !i_domain.eq_or_subdomain_of(&domain) {
                    return Err(DomainMismatch);
                }
                Some(i.into())
            }
            None => None,
        };

        if let (Some(timestamp), Some(expiration)) = (timestamp, expiration) {
            if expiration <= timestamp {
                return Err(ExpirationNotAfterTimestamp);
            }
        }

        Ok(Self {
            algorithm,
            signature_data_base64,
            body_hash,
            canonicalization: canonicalization.unwrap_or_default(),
            domain,
            signed_headers,
            user_id,
            body_length,
            selector,
            timestamp,
            expiration,
            copied_headers,
        })
    }
}

impl FromStr for DkimSignature {
    type Err = DkimSignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag_list = TagList::from_str(s).map_err(|e| DkimSignatureError {
            domain: None,
            selector: None,
            kind: match e {
                TagListParseError::DuplicateTag => DkimSignatureErrorKind::DuplicateTag,
                TagListParseError::Syntax => DkimSignatureErrorKind::InvalidTagList,
            },
        })?;

        Self::from_tag_list(&tag_list).map_err(|kind| DkimSignatureError {
            domain: tag_list.get("d").and_then(|d| DomainName::new(d).ok()),
            selector: tag_list.get("s").and_then(|s| Selector::new(s).ok()),
            kind,
        })
    }
}

impl fmt::Debug for DkimSignature {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("DkimSignature")
            .field("algorithm", &self.algorithm)
            .field("signature_data_base64", &self.signature_data_base64)
            .field("body_hash", &util::encode_base64(&self.body_hash))
            .field("canonicalization", &self.canonicalization)
            .field("domain", &self.domain)
            .field("signed_headers", &self.signed_headers)
            .field("user_id", &self.user_id)
            .field("body_length", &self.body_length)
            .field("selector", &self.selector)
            .field("timestamp", &self.timestamp)
            .field("expiration", &self.expiration)
            .field("copied_headers", &self.copied_headers)
            .finish()
    }
}

// 1*76DIGIT, no sign
fn parse_decimal(value: &str) -> Option<u64> {
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}
