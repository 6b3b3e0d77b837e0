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

//! Verification of an inspected DKIM signature against a key record.

use crate::{
    canonicalize::{self, BodyCanonicalizer},
    crypto::{self, CountingHasher, CryptoError, HashAlgorithm, KeyType},
    inspect::Inspection,
    key::{KeyError, PublicKey},
    record::DkimKeyRecord,
    signature::CanonicalizationAlgorithm,
};
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    time::{Duration, SystemTime},
};
use tracing::trace;

/// Configuration for verification.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// Minimum acceptable key size in bits. When the key size of an RSA public
    /// key is below this limit, the signature does not verify.
    pub min_key_bits: usize,

    /// When this flag is set, signatures using the SHA-1 hash algorithm are
    /// acceptable. Only effective with feature `pre-rfc8301`.
    pub allow_sha1: bool,

    /// When this flag is set, a signature whose l= tag covers only part of
    /// the body does not verify.
    pub forbid_partially_signed_body: bool,

    /// When this flag is set, an expired signature (x=) does not verify.
    pub fail_if_expired: bool,

    /// When this flag is set, a signature with a timestamp in the future (t=)
    /// does not verify.
    pub fail_if_in_future: bool,

    /// Tolerance applied to time values, to allow for clock drift. Resolution
    /// is in seconds.
    pub time_tolerance: Duration,

    /// The `SystemTime` value to use as the instant ‘now’.
    pub fixed_system_time: Option<SystemTime>,
}

impl Config {
    fn current_timestamp(&self) -> u64 {
        self.fixed_system_time
            .unwrap_or_else(SystemTime::now)
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_key_bits: 1024,
            allow_sha1: false,
            forbid_partially_signed_body: false,
            fail_if_expired: true,
            fail_if_in_future: true,
            time_tolerance: Duration::from_secs(30),
            fixed_system_time: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PolicyError {
    ForbidPartiallySignedBody,
    SignatureExpired,
    TimestampInFuture,
    DisallowedSha1Hash,
    KeyTooSmall,
}

impl Display for PolicyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::ForbidPartiallySignedBody => write!(f, "partial body signing not acceptable"),
            Self::SignatureExpired => write!(f, "signature expired"),
            Self::TimestampInFuture => write!(f, "timestamp in future"),
            Self::DisallowedSha1Hash => write!(f, "hash algorithm SHA-1 not acceptable"),
            Self::KeyTooSmall => write!(f, "public key size too small"),
        }
    }
}

impl Error for PolicyError {}

#[derive(Debug)]
pub enum VerificationError {
    Policy(PolicyError),
    Key(KeyError),
    WrongKeyType,
    DisallowedHashAlgorithm,
    DisallowedServiceType,
    InsufficientBodyLength,
    BodyHashMismatch,
    InvalidKey,
    InvalidSignature,
    VerificationFailure,
}

impl Display for VerificationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Policy(e) => e.fmt(f),
            Self::Key(e) => e.fmt(f),
            Self::WrongKeyType => write!(f, "wrong key type"),
            Self::DisallowedHashAlgorithm => write!(f, "hash algorithm not allowed by key record"),
            Self::DisallowedServiceType => write!(f, "key record not for email"),
            Self::InsufficientBodyLength => write!(f, "truncated body"),
            Self::BodyHashMismatch => write!(f, "body hash mismatch"),
            Self::InvalidKey => write!(f, "invalid key data"),
            Self::InvalidSignature => write!(f, "invalid signature data"),
            Self::VerificationFailure => write!(f, "signature verification failed"),
        }
    }
}

impl Error for VerificationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Policy(e) => Some(e),
            Self::Key(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PolicyError> for VerificationError {
    fn from(error: PolicyError) -> Self {
        Self::Policy(error)
    }
}

impl From<CryptoError> for VerificationError {
    fn from(error: CryptoError) -> Self {
        match error {
            CryptoError::InvalidKey => Self::InvalidKey,
            CryptoError::InvalidSignature => Self::InvalidSignature,
            CryptoError::VerificationFailure => Self::VerificationFailure,
        }
    }
}

/// Canonicalizes and hashes a message body. With a body length (l=), only
/// that many bytes of the canonicalized body are hashed.
pub fn compute_body_hash(
    hash_alg: HashAlgorithm,
    algorithm: CanonicalizationAlgorithm,
    body: &[u8],
    length: Option<u64>,
) -> Result<Box<[u8]>, VerificationError> {
    let length = length.map(|len| usize::try_from(len).unwrap_or(usize::MAX));

    let mut canonicalizer = BodyCanonicalizer::new(algorithm);
    let mut hasher = CountingHasher::new(hash_alg, length);

    hasher.update(&canonicalizer.canon_chunk(body));
    hasher.update(&canonicalizer.finish());

    let (hash, _) = hasher
        .finish()
        .map_err(|_| VerificationError::InsufficientBodyLength)?;

    Ok(hash)
}

/// Verifies an inspected signature, given the message body and the signer’s
/// key record.
pub fn verify(
    inspection: &Inspection,
    body: &[u8],
    key_record: &DkimKeyRecord,
    config: &Config,
) -> Result<(), VerificationError> {
    let signature = &inspection.signature;

    check_timestamps(signature.timestamp, signature.expiration, config)?;

    let key_type = signature.algorithm.to_key_type();
    if key_record.key_type != key_type {
        return Err(VerificationError::WrongKeyType);
    }

    // rsa-sha1 is historic (RFC 8301) unless feature `pre-rfc8301` is enabled
    let hash_alg = signature
        .algorithm
        .to_hash_algorithm()
        .ok_or(PolicyError::DisallowedSha1Hash)?;
    #[cfg(feature = "pre-rfc8301")]
    if hash_alg == HashAlgorithm::Sha1 && !config.allow_sha1 {
        return Err(PolicyError::DisallowedSha1Hash.into());
    }
    if !key_record.hash_algorithms.contains(&hash_alg) {
        return Err(VerificationError::DisallowedHashAlgorithm);
    }

    if !key_record.allows_email() {
        return Err(VerificationError::DisallowedServiceType);
    }

    let public_key = PublicKey::decode(key_record).map_err(VerificationError::Key)?;

    if let Some(key_size) = public_key.key_size() {
        if key_size < config.min_key_bits {
            trace!(key_size, min_key_bits = config.min_key_bits, "RSA key too small");
            return Err(PolicyError::KeyTooSmall.into());
        }
    }

    let body_canon = signature.canonicalization.body;

    if let (true, Some(len)) = (config.forbid_partially_signed_body, signature.body_length) {
        let canonical_len = canonicalize::canonicalize_body(body_canon, body).len();
        if len < canonical_len as u64 {
            return Err(PolicyError::ForbidPartiallySignedBody.into());
        }
    }

    let body_hash = compute_body_hash(hash_alg, body_canon, body, signature.body_length)?;
    if body_hash != signature.body_hash {
        trace!("body hash mismatch");
        return Err(VerificationError::BodyHashMismatch);
    }

    let data_hash = crypto::digest_slices(hash_alg, [&inspection.signing_input]);
    let signature_data = &inspection.signature_data;

    match (&public_key, key_type) {
        (PublicKey::Rsa(k), _) => crypto::verify_rsa(hash_alg, k, &data_hash, signature_data)?,
        (PublicKey::Raw { key_data, .. }, KeyType::Ed25519) => {
            let k = crypto::read_ed25519_verifying_key(key_data)?;
            crypto::verify_ed25519(&k, &data_hash, signature_data)?;
        }
        (PublicKey::Raw { .. }, _) => return Err(VerificationError::WrongKeyType),
    }

    trace!(domain = %signature.domain, selector = %signature.selector, "signature verified");

    Ok(())
}

fn check_timestamps(
    timestamp: Option<u64>,
    expiration: Option<u64>,
    config: &Config,
) -> Result<(), PolicyError> {
    let now = config.current_timestamp();
    let tolerance = config.time_tolerance.as_secs();

    if config.fail_if_expired {
        if let Some(x) = expiration {
            if x.saturating_add(tolerance) < now {
                return Err(PolicyError::SignatureExpired);
            }
        }
    }

    if config.fail_if_in_future {
        if let Some(t) = timestamp {
            if t > now.saturating_add(tolerance) {
                return Err(PolicyError::TimestampInFuture);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::encode_base64;

    fn config_at(secs: u64) -> Config {
        Config {
            fixed_system_time: Some(SystemTime::UNIX_EPOCH + Duration::from_secs(secs)),
            ..Default::default()
        }
    }

    #[test]
    fn check_timestamps_ok() {
        let config = config_at(1000);

        assert_eq!(check_timestamps(Some(900), Some(1100), &config), Ok(()));
        assert_eq!(check_timestamps(None, Some(980), &config), Ok(()));
        assert_eq!(check_timestamps(None, Some(960), &config), Err(PolicyError::SignatureExpired));
        assert_eq!(check_timestamps(Some(1020), None, &config), Ok(()));
        assert_eq!(check_timestamps(Some(1040), None, &config), Err(PolicyError::TimestampInFuture));

        let config = Config {
            fail_if_expired: false,
            fail_if_in_future: false,
            ..config
        };
        assert_eq!(check_timestamps(Some(5000), Some(10), &config), Ok(()));
    }

    #[test]
    fn compute_body_hash_empty() {
        let hash = compute_body_hash(
            HashAlgorithm::Sha256,
            CanonicalizationAlgorithm::Simple,
            b"",
            None,
        )
        .unwrap();
        assert_eq!(encode_base64(hash), "frcCV1k9oG9oKj3dpUqdJg1PxRT2RSN/XKdLCPjaYaY=");

        let hash = compute_body_hash(
            HashAlgorithm::Sha256,
            CanonicalizationAlgorithm::Relaxed,
            b"\r\n\r\n",
            None,
        )
        .unwrap();
        assert_eq!(encode_base64(hash), "47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU=");
    }

    #[test]
    fn compute_body_hash_length() {
        let body = b"Hi.\r\n\r\nWe lost the game.\r\n";

        let full = compute_body_hash(
            HashAlgorithm::Sha256,
            CanonicalizationAlgorithm::Simple,
            b"Hi.\r\n",
            None,
        )
        .unwrap();
        let prefix = compute_body_hash(
            HashAlgorithm::Sha256,
            CanonicalizationAlgorithm::Simple,
            body,
            Some(5),
        )
        .unwrap();
        assert_eq!(full, prefix);

        assert!(matches!(
            compute_body_hash(HashAlgorithm::Sha256, CanonicalizationAlgorithm::Simple, body, Some(100)),
            Err(VerificationError::InsufficientBodyLength)
        ));
    }
}
