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

//! DKIM public key record.

use crate::{
    crypto::{HashAlgorithm, KeyType},
    tag_list::{parse_colon_separated_tag_value, strip_fws_from_tag_value, TagList, TagSpec},
};
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    str::FromStr,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServiceType {
    Any,
    Email,
    Other(Box<str>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Flags {
    Testing,
    NoSubdomains,
    Other(Box<str>),
}

/// The key data in the p= tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyData {
    /// The p= tag is empty: the key has been revoked.
    Revoked,
    /// Base64-encoded key data, with FWS removed. Not yet decoded.
    Base64(Box<str>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DkimKeyRecordParseError {
    TagListSyntax,
    UnsupportedVersion,
    MisplacedVersionTag,
    InvalidKeyType,
    MissingKeyTag,
    ServiceTypesEmpty,
}

impl Display for DkimKeyRecordParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::TagListSyntax => write!(f, "ill-formed tag-list"),
            Self::UnsupportedVersion => write!(f, "unsupported version"),
            Self::MisplacedVersionTag => write!(f, "v= tag not initial"),
            Self::InvalidKeyType => write!(f, "invalid key type"),
            Self::MissingKeyTag => write!(f, "p= tag missing"),
            Self::ServiceTypesEmpty => write!(f, "service types empty"),
        }
    }
}

impl Error for DkimKeyRecordParseError {}

/// A DKIM public key record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DkimKeyRecord {
    /// Acceptable hash algorithms. Empty if h= names only unsupported ones.
    pub hash_algorithms: Box<[HashAlgorithm]>,
    pub key_type: KeyType,
    pub notes: Option<Box<str>>,
    pub key_data: KeyData,
    pub service_types: Box<[ServiceType]>,  // non-empty
    pub flags: Box<[Flags]>,
}

impl DkimKeyRecord {
    pub fn is_revoked(&self) -> bool {
        self.key_data == KeyData::Revoked
    }

    /// Whether the domain is testing DKIM (t=y).
    pub fn is_testing(&self) -> bool {
        self.flags.contains(&Flags::Testing)
    }

    pub fn allows_email(&self) -> bool {
        self.service_types
            .iter()
            .any(|s| matches!(s, ServiceType::Any | ServiceType::Email))
    }

    fn from_tag_list(tag_list: &TagList<'_>) -> Result<Self, DkimKeyRecordParseError> {
        let mut hash_algorithms = HashAlgorithm::all();
        let mut key_type = KeyType::Rsa;
        let mut notes = None;
        let mut key_data = None;
        let mut service_types = vec![ServiceType::Any];
        let mut flags = vec![];

        for (i, &TagSpec { name, value }) in tag_list.as_ref().iter().enumerate() {
            match name {
                "v" => {
                    if i != 0 {
                        return Err(DkimKeyRecordParseError::MisplacedVersionTag);
                    }
                    if value != "DKIM1" {
                        return Err(DkimKeyRecordParseError::UnsupportedVersion);
                    }
                }
                "h" => {
                    // unknown and historic algorithms are ignored
                    hash_algorithms = parse_colon_separated_tag_value(value)
                        .into_iter()
                        .filter_map(|s| s.parse().ok())
                        .collect();
                }
                "k" => {
                    key_type = value
                        .parse()
                        .map_err(|_| DkimKeyRecordParseError::InvalidKeyType)?;
                }
                "n" => {
                    notes = Some(value.into());
                }
                "p" => {
                    key_data = Some(if value.is_empty() {
                        KeyData::Revoked
                    } else {
                        KeyData::Base64(strip_fws_from_tag_value(value).into())
                    });
                }
                "s" => {
                    let st: Vec<_> = parse_colon_separated_tag_value(value)
                        .into_iter()
                        .filter(|s| !s.is_empty())
                        .map(|s| {
                            if s == "*" {
                                ServiceType::Any
                            } else if s.eq_ignore_ascii_case("email") {
                                ServiceType::Email
                            } else {
                                ServiceType::Other(s.into())
                            }
                        })
                        .collect();

                    if st.is_empty() {
                        return Err(DkimKeyRecordParseError::ServiceTypesEmpty);
                    }

                    service_types = st;
                }
                "t" => {
                    flags = parse_colon_separated_tag_value(value)
                        .into_iter()
                        .filter(|s| !s.is_empty())
                        .map(|s| {
                            if s.eq_ignore_ascii_case("y") {
                                Flags::Testing
                            } else if s.eq_ignore_ascii_case("s") {
                                Flags::NoSubdomains
                            } else {
                                Flags::Other(s.into())
                            }
                        })
                        .collect();
                }
                // unknown tags must be ignored
                _ => {}
            }
        }

        let key_data = key_data.ok_or(DkimKeyRecordParseError::MissingKeyTag)?;

        Ok(Self {
            hash_algorithms: hash_algorithms.into(),
            key_type,
            notes,
            key_data,
            service_types: service_types.into(),
            flags: flags.into(),
        })
    }
}

impl FromStr for DkimKeyRecord {
    type Err = DkimKeyRecordParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag_list =
            TagList::from_str(s).map_err(|_| DkimKeyRecordParseError::TagListSyntax)?;

        Self::from_tag_list(&tag_list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dkim_key_record_from_str_ok() {
        let record = DkimKeyRecord::from_str("v=DKIM1; p=YW\r\n Jj; s = email; n = highly=20interesting;")
            .unwrap();

        assert_eq!(
            record,
            DkimKeyRecord {
                hash_algorithms: HashAlgorithm::all().into(),
                key_type: KeyType::Rsa,
                notes: Some("highly=20interesting".into()),
                key_data: KeyData::Base64("YWJj".into()),
                service_types: [ServiceType::Email].into(),
                flags: [].into(),
            }
        );
        assert!(!record.is_revoked());
        assert!(record.allows_email());
    }

    #[test]
    fn dkim_key_record_revoked() {
        let record = DkimKeyRecord::from_str("v=DKIM1; k=rsa; p=").unwrap();
        assert_eq!(record.key_data, KeyData::Revoked);
        assert!(record.is_revoked());

        let record = DkimKeyRecord::from_str("p= ; t=y").unwrap();
        assert!(record.is_revoked());
        assert!(record.is_testing());
    }

    #[test]
    fn dkim_key_record_key_types() {
        let record = DkimKeyRecord::from_str("k=ed25519; p=YWJj").unwrap();
        assert_eq!(record.key_type, KeyType::Ed25519);

        let record = DkimKeyRecord::from_str("k=pq-sig2; p=YWJj").unwrap();
        assert_eq!(record.key_type, KeyType::Other("pq-sig2".into()));

        assert_eq!(
            DkimKeyRecord::from_str("k=2rsa; p=YWJj"),
            Err(DkimKeyRecordParseError::InvalidKeyType)
        );
    }

    #[test]
    fn dkim_key_record_hash_algorithms() {
        let record = DkimKeyRecord::from_str("h=md5:sha256:foo; p=YWJj").unwrap();
        assert_eq!(record.hash_algorithms.as_ref(), [HashAlgorithm::Sha256]);

        let record = DkimKeyRecord::from_str("h=md5; p=YWJj").unwrap();
        assert!(record.hash_algorithms.is_empty());
    }

    #[test]
    fn dkim_key_record_sha1_only() {
        let record = DkimKeyRecord::from_str("v=DKIM1; h=sha1; k=rsa; p=YWJj").unwrap();

        assert_eq!(record.key_type, KeyType::Rsa);
        assert_eq!(record.key_data, KeyData::Base64("YWJj".into()));
        #[cfg(feature = "pre-rfc8301")]
        assert_eq!(record.hash_algorithms.as_ref(), [HashAlgorithm::Sha1]);
        #[cfg(not(feature = "pre-rfc8301"))]
        assert!(record.hash_algorithms.is_empty());
    }

    #[test]
    fn dkim_key_record_errors() {
        assert_eq!(
            DkimKeyRecord::from_str("v=DKIM2; p=YWJj"),
            Err(DkimKeyRecordParseError::UnsupportedVersion)
        );
        assert_eq!(
            DkimKeyRecord::from_str("p=YWJj; v=DKIM1"),
            Err(DkimKeyRecordParseError::MisplacedVersionTag)
        );
        assert_eq!(
            DkimKeyRecord::from_str("v=DKIM1; k=rsa"),
            Err(DkimKeyRecordParseError::MissingKeyTag)
        );
        assert_eq!(
            DkimKeyRecord::from_str("v=DKIM1; s=; p=YWJj"),
            Err(DkimKeyRecordParseError::ServiceTypesEmpty)
        );
        assert_eq!(
            DkimKeyRecord::from_str("v=DKIM1; p=YWJj; p=YWJj"),
            Err(DkimKeyRecordParseError::TagListSyntax)
        );
        assert_eq!(
            DkimKeyRecord::from_str("v=DKIM1; p"),
            Err(DkimKeyRecordParseError::TagListSyntax)
        );
    }

    #[test]
    fn dkim_key_record_bare_lf_folding() {
        // seen in the wild: LF instead of CRLF in FWS
        let s = "v=DKIM1; h=sha256; k=rsa; \n\t  p=MIIBIjANBgkqhkiG9w0BAQEFAAOCAQ8AMIIBCgKCAQEAxjVp";

        assert_eq!(DkimKeyRecord::from_str(s), Err(DkimKeyRecordParseError::TagListSyntax));
    }
}
