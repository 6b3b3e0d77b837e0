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

use crate::crypto::CryptoError;
use ed25519_dalek::{pkcs8::DecodePublicKey, Signature, Verifier, VerifyingKey};

/// Reads an Ed25519 public key, as 32 raw bytes or else as
/// SubjectPublicKeyInfo.
pub fn read_ed25519_verifying_key(key_data: &[u8]) -> Result<VerifyingKey, CryptoError> {
    VerifyingKey::try_from(key_data)
        .or_else(|_| VerifyingKey::from_public_key_der(key_data))
        .map_err(|_| CryptoError::InvalidKey)
}

pub fn verify_ed25519(
    verifying_key: &VerifyingKey,
    msg: &[u8],
    signature_data: &[u8],
) -> Result<(), CryptoError> {
    let signature =
        Signature::from_slice(signature_data).map_err(|_| CryptoError::InvalidSignature)?;

    verifying_key
        .verify(msg, &signature)
        .map_err(|_| CryptoError::VerificationFailure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::decode_base64;

    #[test]
    fn read_ed25519_key_both_formats() {
        let spki = decode_base64("MCowBQYDK2VwAyEA9VXMCgG0fXGIzwV7eOxKhz+Pe6DRmOBYjyvVoVrc/Dw=").unwrap();
        let raw = &spki[12..];
        assert_eq!(raw.len(), 32);

        let k1 = read_ed25519_verifying_key(&spki).unwrap();
        let k2 = read_ed25519_verifying_key(raw).unwrap();

        assert_eq!(k1, k2);
    }

    #[test]
    fn read_ed25519_key_invalid() {
        assert_eq!(read_ed25519_verifying_key(&[0; 31]), Err(CryptoError::InvalidKey));
    }

    #[test]
    fn verify_ed25519_bad_signature_length() {
        let spki = decode_base64("MCowBQYDK2VwAyEA9VXMCgG0fXGIzwV7eOxKhz+Pe6DRmOBYjyvVoVrc/Dw=").unwrap();
        let key = read_ed25519_verifying_key(&spki).unwrap();

        assert_eq!(verify_ed25519(&key, b"msg", &[0; 10]), Err(CryptoError::InvalidSignature));
        assert_eq!(verify_ed25519(&key, b"msg", &[0; 64]), Err(CryptoError::VerificationFailure));
    }
}
