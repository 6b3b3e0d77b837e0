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

use crate::crypto::HashAlgorithm;
use digest::{Digest, DynDigest};
#[cfg(feature = "pre-rfc8301")]
use sha1::Sha1;
use sha2::Sha256;

/// Hashes the concatenation of the given byte slices.
pub fn digest_slices<I, T>(hash_alg: HashAlgorithm, slices: I) -> Box<[u8]>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    fn digest_all<D: Digest, I: IntoIterator<Item = T>, T: AsRef<[u8]>>(slices: I) -> Box<[u8]> {
        let mut hasher = D::new();
        for bytes in slices {
            hasher.update(bytes.as_ref());
        }
        Box::from(&hasher.finalize()[..])
    }

    match hash_alg {
        #[cfg(feature = "pre-rfc8301")]
        HashAlgorithm::Sha1 => digest_all::<Sha1, _, _>(slices),
        HashAlgorithm::Sha256 => digest_all::<Sha256, _, _>(slices),
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct InsufficientInput;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HashStatus {
    AllConsumed,  // input was digested entirely
    Truncated,  // only a prefix of the input was digested
}

/// A hasher that digests at most some number of bytes.
pub struct CountingHasher {
    digest: Box<dyn DynDigest + Send>,
    length: Option<usize>,
    bytes_written: usize,
}

impl CountingHasher {
    pub fn new(hash_alg: HashAlgorithm, length: Option<usize>) -> Self {
        let digest: Box<dyn DynDigest + Send> = match hash_alg {
            #[cfg(feature = "pre-rfc8301")]
            HashAlgorithm::Sha1 => Box::new(Sha1::default()),
            HashAlgorithm::Sha256 => Box::new(Sha256::default()),
        };

        Self {
            digest,
            length,
            bytes_written: 0,
        }
    }

    pub fn update(&mut self, bytes: &[u8]) -> HashStatus {
        let (bytes, status) = match self.length {
            Some(len) if len - self.bytes_written < bytes.len() => {
                (&bytes[..(len - self.bytes_written)], HashStatus::Truncated)
            }
            _ => (bytes, HashStatus::AllConsumed),
        };

        self.digest.update(bytes);
        self.bytes_written += bytes.len();

        status
    }

    pub fn is_done(&self) -> bool {
        matches!(self.length, Some(len) if len == self.bytes_written)
    }

    /// Returns the digest and the number of bytes digested. Fails if a length
    /// was given and fewer bytes than that were supplied.
    pub fn finish(self) -> Result<(Box<[u8]>, usize), InsufficientInput> {
        if self.length.is_some() && !self.is_done() {
            return Err(InsufficientInput);
        }

        Ok((self.digest.finalize(), self.bytes_written))
    }
}
