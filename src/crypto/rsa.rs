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

use crate::crypto::{CryptoError, HashAlgorithm};
use rsa::{
    pkcs1::DecodeRsaPublicKey, pkcs8::DecodePublicKey, traits::PublicKeyParts, Pkcs1v15Sign,
    RsaPublicKey,
};
#[cfg(feature = "pre-rfc8301")]
use sha1::Sha1;
use sha2::Sha256;
use tracing::trace;

/// Returns the key size in bits.
pub fn public_key_size(public_key: &RsaPublicKey) -> usize {
    public_key.size() * 8
}

/// Reads an RSA public key from DER, as SubjectPublicKeyInfo or else as
/// RSAPublicKey.
pub fn read_rsa_public_key(key_data: &[u8]) -> Result<RsaPublicKey, CryptoError> {
    RsaPublicKey::from_public_key_der(key_data)
        .or_else(|e| {
            trace!(error = %e, "not a SubjectPublicKeyInfo RSA key, trying RSAPublicKey");
            RsaPublicKey::from_pkcs1_der(key_data)
        })
        .map_err(|_| CryptoError::InvalidKey)
}

/// Verifies an RSASSA-PKCS1-v1_5 signature over a precomputed hash.
pub fn verify_rsa(
    hash_alg: HashAlgorithm,
    public_key: &RsaPublicKey,
    hashed: &[u8],
    signature_data: &[u8],
) -> Result<(), CryptoError> {
    let result = match hash_alg {
        #[cfg(feature = "pre-rfc8301")]
        HashAlgorithm::Sha1 => {
            public_key.verify(Pkcs1v15Sign::new::<Sha1>(), hashed, signature_data)
        }
        HashAlgorithm::Sha256 => {
            public_key.verify(Pkcs1v15Sign::new::<Sha256>(), hashed, signature_data)
        }
    };

    result.map_err(|e| {
        trace!(error = %e, "RSA signature verification failed");
        CryptoError::VerificationFailure
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::decode_base64;
    use rsa::BigUint;

    // RFC 6376, appendix C
    const SPKI_KEY: &str = "MIGfMA0GCSqGSIb3DQEBAQUAA4GNADCBiQKBgQDwIRP/UC3SBsEmGqZ9ZJW3/DkMoGeLnQg1fWn7/zYtIxN2SnFCjxOCKG9v3b4jYfcTNh5ijSsq631uBItLa7od+v/RtdC2UzJ1lWT947qR+Rcac2gbto/NMqJ0fzfVjH4OuKhitdY9tf6mcwGjaNBcWToIMmPSPDdQPNUYckcQ2QIDAQAB";
    const PKCS1_KEY: &str = "MIGJAoGBAPAhE/9QLdIGwSYapn1klbf8OQygZ4udCDV9afv/Ni0jE3ZKcUKPE4Iob2/dviNh9xM2HmKNKyrrfW4Ei0truh36/9G10LZTMnWVZP3jupH5FxpzaBu2j80yonR/N9WMfg64qGK11j21/qZzAaNo0FxZOggyY9I8N1A81RhyRxDZAgMBAAE=";

    #[test]
    fn read_rsa_public_key_both_formats() {
        let spki = read_rsa_public_key(&decode_base64(SPKI_KEY).unwrap()).unwrap();
        let pkcs1 = read_rsa_public_key(&decode_base64(PKCS1_KEY).unwrap()).unwrap();

        assert_eq!(spki, pkcs1);
        assert_eq!(public_key_size(&spki), 1024);
        assert_eq!(spki.e(), &BigUint::from(65537u32));
    }

    #[test]
    fn read_rsa_public_key_invalid() {
        assert_eq!(read_rsa_public_key(b"not a key"), Err(CryptoError::InvalidKey));

        // Ed25519 SubjectPublicKeyInfo
        let ed25519 = decode_base64("MCowBQYDK2VwAyEA9VXMCgG0fXGIzwV7eOxKhz+Pe6DRmOBYjyvVoVrc/Dw=").unwrap();
        assert_eq!(read_rsa_public_key(&ed25519), Err(CryptoError::InvalidKey));
    }
}
