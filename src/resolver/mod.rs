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

//! Key record lookup in DNS.

#[cfg(feature = "hickory-resolver")]
mod hickory_resolver;

use crate::{
    key::{KeyError, PublicKey},
    record::DkimKeyRecord,
};
use std::{
    future::Future,
    io::{self, ErrorKind},
};
use tracing::trace;

/// A trait for looking up DNS TXT records containing DKIM public key records.
///
/// The error type used here is `std::io::Error`. On the query result,
/// `ErrorKind::NotFound` signals NXDOMAIN or an empty answer; any other error,
/// including timeouts, is a failed lookup. The inner, per-record
/// `std::io::Error` can be used to signal errors with individual TXT records.
pub trait LookupTxt: Send + Sync {
    /// The answer consisting of TXT records found. Each item is one record,
    /// its character-strings concatenated in order.
    type Answer: IntoIterator<Item = io::Result<Vec<u8>>>;
    /// The future resolving to the query’s answer.
    type Query<'a>: Future<Output = io::Result<Self::Answer>> + Send + 'a
    where
        Self: 'a;

    /// Looks up the domain’s TXT records in DNS.
    ///
    /// The domain is passed in A-label (ASCII) form where possible, eg
    /// `selector._domainkey.example.com`.
    fn lookup_txt(&self, domain: &str) -> Self::Query<'_>;
}

/// Returns the DNS name where the key for the given domain and selector is
/// published, `<selector>._domainkey.<domain>`.
///
/// U-labels are converted to A-labels. If that conversion fails, the name is
/// returned as given; no further validation is done.
pub fn key_query_name(domain: &str, selector: &str) -> String {
    let name = format!("{selector}._domainkey.{domain}");
    idna::domain_to_ascii(&name).unwrap_or(name)
}

/// Maximum number of key records tried for one query.
const MAX_KEY_RECORDS: usize = 3;

/// Looks up the key record texts for the given domain and selector.
///
/// Each answer item is one TXT record, whose strings the `LookupTxt`
/// implementation has already concatenated in the order returned. Records
/// are not joined with each other. When there are more than three records,
/// only the first two and the last are returned.
pub async fn resolve<T>(
    resolver: &T,
    domain: &str,
    selector: &str,
) -> Result<Vec<io::Result<String>>, KeyError>
where
    T: LookupTxt + ?Sized,
{
    fn parse_utf8(txt: io::Result<Vec<u8>>) -> io::Result<String> {
        txt.and_then(|s| String::from_utf8(s).map_err(|e| io::Error::new(ErrorKind::InvalidData, e)))
    }

    let name = key_query_name(domain, selector);

    trace!(%name, "looking up DKIM key record");

    let answer = resolver.lookup_txt(&name).await.map_err(|e| {
        trace!(%name, error = %e, "DNS lookup failed");
        match e.kind() {
            ErrorKind::NotFound => KeyError::NoKeyRecord,
            _ => KeyError::DnsLookupFailed(e),
        }
    })?;

    // RFC 6376, section 6.1.2: the verifier may cycle through multiple key
    // records, in unspecified order
    let mut records = vec![];
    let mut last = None;
    let mut count = 0;
    for (i, txt) in answer.into_iter().enumerate() {
        if i < MAX_KEY_RECORDS - 1 {
            records.push(parse_utf8(txt));
        } else {
            last = Some(txt);
        }
        count += 1;
    }
    if let Some(txt) = last {
        records.push(parse_utf8(txt));
    }

    if records.is_empty() {
        return Err(KeyError::NoKeyRecord);
    }

    trace!(%name, records = count, "received DKIM key records");

    Ok(records)
}

/// Looks up, parses, and decodes the public key for the given domain and
/// selector.
///
/// Key records are tried in order. The first one that yields a usable key is
/// taken; if none does, the error for the first record is returned.
pub async fn resolve_key<T>(
    resolver: &T,
    domain: &str,
    selector: &str,
) -> Result<PublicKey, KeyError>
where
    T: LookupTxt + ?Sized,
{
    let records = resolve(resolver, domain, selector).await?;

    first_usable(records, |text| PublicKey::decode(&parse_record(&text)?))
}

/// Looks up and parses the key record for the given domain and selector.
///
/// Key records are tried in order. The first well-formed one is returned; if
/// none is, the error for the first record is returned.
pub async fn resolve_record<T>(
    resolver: &T,
    domain: &str,
    selector: &str,
) -> Result<DkimKeyRecord, KeyError>
where
    T: LookupTxt + ?Sized,
{
    let records = resolve(resolver, domain, selector).await?;

    first_usable(records, |text| parse_record(&text))
}

fn parse_record(text: &str) -> Result<DkimKeyRecord, KeyError> {
    text.parse().map_err(KeyError::MalformedKeyRecord)
}

fn first_usable<U, F>(records: Vec<io::Result<String>>, f: F) -> Result<U, KeyError>
where
    F: Fn(String) -> Result<U, KeyError>,
{
    let mut first_error = None;

    for record in records {
        match record.map_err(KeyError::DnsLookupFailed).and_then(&f) {
            Ok(value) => return Ok(value),
            Err(e) => {
                trace!(error = %e, "skipping unusable key record");
                first_error.get_or_insert(e);
            }
        }
    }

    Err(first_error.unwrap_or(KeyError::NoKeyRecord))
}
