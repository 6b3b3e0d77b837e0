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

//! Cryptographic primitives.
//!
//! # Public key formats in DNS
//!
//! RFC 6376, section 3.6.1 says that an RSA key in p= is an RSAPublicKey (RFC
//! 3447), but the example in appendix C publishes a SubjectPublicKeyInfo (RFC
//! 5280). Deployed software follows the example, so SubjectPublicKeyInfo is
//! read first, and RSAPublicKey is the fallback.
//!
//! RFC 8463 specifies the 32 raw key bytes for Ed25519. OpenSSL outputs
//! SubjectPublicKeyInfo by default, so that form is accepted as a fallback
//! there too.

mod ed25519;
mod hash;
mod rsa;

pub use self::{
    ed25519::{read_ed25519_verifying_key, verify_ed25519},
    hash::{digest_slices, CountingHasher, HashStatus, InsufficientInput},
    rsa::{public_key_size, read_rsa_public_key, verify_rsa},
};

use crate::util::CanonicalStr;
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    str::FromStr,
};

/// A key type, as given in the k= tag of a key record.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum KeyType {
    Rsa,
    Ed25519,
    /// A key type not known to this library, kept as written.
    Other(Box<str>),
}

impl Display for KeyType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rsa => f.write_str("rsa"),
            Self::Ed25519 => f.write_str("ed25519"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ParseKeyTypeError;

impl Display for ParseKeyTypeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "invalid key type")
    }
}

impl Error for ParseKeyTypeError {}

impl FromStr for KeyType {
    type Err = ParseKeyTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("rsa") {
            Ok(Self::Rsa)
        } else if s.eq_ignore_ascii_case("ed25519") {
            Ok(Self::Ed25519)
        } else if is_hyphenated_word(s) {
            Ok(Self::Other(s.into()))
        } else {
            Err(ParseKeyTypeError)
        }
    }
}

// hyphenated-word = ALPHA [ *(ALPHA / DIGIT / "-") (ALPHA / DIGIT) ]
fn is_hyphenated_word(s: &str) -> bool {
    s.starts_with(|c: char| c.is_ascii_alphabetic())
        && !s.ends_with('-')
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// A hash algorithm.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum HashAlgorithm {
    #[cfg(feature = "pre-rfc8301")]
    Sha1,
    Sha256,
}

impl HashAlgorithm {
    pub fn all() -> Vec<Self> {
        #[cfg_attr(not(feature = "pre-rfc8301"), allow(unused_mut))]
        let mut all = vec![Self::Sha256];
        #[cfg(feature = "pre-rfc8301")]
        all.push(Self::Sha1);
        all
    }
}

impl CanonicalStr for HashAlgorithm {
    fn canonical_str(&self) -> &'static str {
        match self {
            #[cfg(feature = "pre-rfc8301")]
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
        }
    }
}

impl Display for HashAlgorithm {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|alg| s.eq_ignore_ascii_case(alg.canonical_str()))
            .ok_or("unsupported hash algorithm")
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum CryptoError {
    InvalidKey,
    InvalidSignature,
    VerificationFailure,
}

impl Display for CryptoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidKey => write!(f, "invalid key data"),
            Self::InvalidSignature => write!(f, "invalid signature data"),
            Self::VerificationFailure => write!(f, "signature verification failed"),
        }
    }
}

impl Error for CryptoError {}
