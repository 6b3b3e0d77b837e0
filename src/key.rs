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

//! Decoding of public key material.

use crate::{
    crypto::{self, KeyType},
    record::{DkimKeyRecord, DkimKeyRecordParseError, KeyData},
    util,
};
use pkcs8::{ObjectIdentifier, SubjectPublicKeyInfoRef};
use rsa::{traits::PublicKeyParts, BigUint, RsaPublicKey};
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    io,
};
use tracing::trace;

const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");

/// An error that occurred when retrieving or decoding a public key.
#[derive(Debug)]
pub enum KeyError {
    DnsLookupFailed(io::Error),
    NoKeyRecord,
    MalformedKeyRecord(DkimKeyRecordParseError),
    KeyRevoked,
    InvalidBase64,
    InvalidKeyEncoding,
}

impl Display for KeyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::DnsLookupFailed(_) => write!(f, "DNS lookup failed"),
            Self::NoKeyRecord => write!(f, "no key record"),
            Self::MalformedKeyRecord(e) => write!(f, "malformed key record: {e}"),
            Self::KeyRevoked => write!(f, "key revoked"),
            Self::InvalidBase64 => write!(f, "invalid Base64 in key data"),
            Self::InvalidKeyEncoding => write!(f, "invalid key encoding"),
        }
    }
}

impl Error for KeyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::DnsLookupFailed(e) => Some(e),
            Self::MalformedKeyRecord(e) => Some(e),
            _ => None,
        }
    }
}

/// A public key, decoded from a key record.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    /// Key data of a type without structural decoding here, eg Ed25519.
    Raw {
        key_type: KeyType,
        key_data: Box<[u8]>,
    },
}

impl PublicKey {
    /// Decodes the key material in the p= tag of a key record.
    ///
    /// RSA keys are read as SubjectPublicKeyInfo, or else as RSAPublicKey. Key
    /// data of other key types is only Base64-decoded.
    pub fn decode(record: &DkimKeyRecord) -> Result<Self, KeyError> {
        let key_data = match &record.key_data {
            KeyData::Revoked => return Err(KeyError::KeyRevoked),
            KeyData::Base64(s) => util::decode_base64(s).map_err(|_| KeyError::InvalidBase64)?,
        };

        match &record.key_type {
            KeyType::Rsa => decode_rsa(&key_data).map(Self::Rsa),
            key_type => Ok(Self::Raw {
                key_type: key_type.clone(),
                key_data: key_data.into(),
            }),
        }
    }

    pub fn key_type(&self) -> KeyType {
        match self {
            Self::Rsa(_) => KeyType::Rsa,
            Self::Raw { key_type, .. } => key_type.clone(),
        }
    }

    /// The RSA modulus.
    pub fn modulus(&self) -> Option<&BigUint> {
        match self {
            Self::Rsa(k) => Some(k.n()),
            Self::Raw { .. } => None,
        }
    }

    /// The RSA public exponent.
    pub fn exponent(&self) -> Option<&BigUint> {
        match self {
            Self::Rsa(k) => Some(k.e()),
            Self::Raw { .. } => None,
        }
    }

    /// The RSA key size in bits.
    pub fn key_size(&self) -> Option<usize> {
        match self {
            Self::Rsa(k) => Some(crypto::public_key_size(k)),
            Self::Raw { .. } => None,
        }
    }
}

fn decode_rsa(key_data: &[u8]) -> Result<RsaPublicKey, KeyError> {
    if let Ok(spki) = SubjectPublicKeyInfoRef::try_from(key_data) {
        if spki.algorithm.oid != RSA_ENCRYPTION {
            trace!(oid = %spki.algorithm.oid, "SubjectPublicKeyInfo does not hold an RSA key");
            return Err(KeyError::InvalidKeyEncoding);
        }
    }

    crypto::read_rsa_public_key(key_data).map_err(|_| KeyError::InvalidKeyEncoding)
}
