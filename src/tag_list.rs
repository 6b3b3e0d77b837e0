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

//! Tag-list syntax shared by `DKIM-Signature` headers and key records.
//!
//! See RFC 6376, section 3.2.

use crate::{
    parse::{strip_fws, strip_suffix},
    util::{self, Base64Error},
};
use std::{
    collections::HashSet,
    fmt::{self, Display, Formatter},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TagListParseError {
    DuplicateTag,
    Syntax,
}

impl Display for TagListParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateTag => write!(f, "duplicate tag"),
            Self::Syntax => write!(f, "ill-formed tag-list"),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct TagSpec<'a> {
    pub name: &'a str,
    pub value: &'a str,
}

#[derive(Debug, PartialEq, Eq)]
pub struct TagList<'a>(Vec<TagSpec<'a>>);

impl<'a> AsRef<[TagSpec<'a>]> for TagList<'a> {
    fn as_ref(&self) -> &[TagSpec<'a>] {
        &self.0
    }
}

impl<'a> TagList<'a> {
    pub fn from_str(val: &'a str) -> Result<Self, TagListParseError> {
        match parse_tag_list_internal(val) {
            Some((rest, tag_list)) if rest.is_empty() => {
                let mut names_seen = HashSet::new();
                if tag_list.iter().any(|tag| !names_seen.insert(tag.name)) {
                    return Err(TagListParseError::DuplicateTag);
                }
                Ok(TagList(tag_list))
            }
            _ => Err(TagListParseError::Syntax),
        }
    }

    pub fn get(&self, name: &str) -> Option<&'a str> {
        self.0.iter().find(|t| t.name == name).map(|t| t.value)
    }
}

fn parse_tag_list_internal(val: &str) -> Option<(&str, Vec<TagSpec<'_>>)> {
    let (mut s, t) = parse_tag_spec(val)?;

    let mut tags = vec![t];

    while let Some((snext, t)) = s.strip_prefix(';').and_then(parse_tag_spec) {
        s = snext;
        tags.push(t);
    }

    // trailing semicolon, possibly followed by FWS
    let s = match s.strip_prefix(';') {
        Some(s) => strip_fws(s).unwrap_or(s),
        None => s,
    };

    Some((s, tags))
}

fn parse_tag_spec(val: &str) -> Option<(&str, TagSpec<'_>)> {
    let (s, name) = strip_tag_name_and_equals(val)?;

    let s = strip_fws(s).unwrap_or(s);

    let (s, value) = match parse_tag_value(s) {
        Some((s, value)) => {
            let s = strip_fws(s).unwrap_or(s);
            (s, value)
        }
        None => (s, Default::default()),
    };

    Some((s, TagSpec { name, value }))
}

/// Strips leading FWS, a tag name, FWS, and the `=` sign. Returns the rest
/// and the tag name.
pub fn strip_tag_name_and_equals(val: &str) -> Option<(&str, &str)> {
    let s = strip_fws(val).unwrap_or(val);

    let (s, name) = parse_tag_name(s)?;

    let s = strip_fws(s).unwrap_or(s);

    let s = s.strip_prefix('=')?;

    Some((s, name))
}

fn parse_tag_name(value: &str) -> Option<(&str, &str)> {
    let s = value
        .strip_prefix(is_alpha)?
        .trim_start_matches(is_alphanum);
    Some((s, strip_suffix(value, s)))
}

// Note erratum 5070 in ABNF
fn parse_tag_value(value: &str) -> Option<(&str, &str)> {
    fn strip_tval(s: &str) -> Option<&str> {
        s.strip_prefix(is_tval_char)
            .map(|s| s.trim_start_matches(is_tval_char))
    }

    let mut s = strip_tval(value)?;

    while let Some(snext) = strip_fws(s).and_then(strip_tval) {
        s = snext;
    }

    Some((s, strip_suffix(value, s)))
}

fn is_alpha(c: char) -> bool {
    c.is_ascii_alphabetic()
}

fn is_alphanum(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

pub fn is_tval_char(c: char) -> bool {
    // printable ASCII w/o ; or non-ASCII UTF-8
    matches!(c, '!'..=':' | '<'..='~') || !c.is_ascii()
}

pub fn parse_colon_separated_tag_value(value: &str) -> Vec<&str> {
    value
        .split(':')
        .map(|s| s.trim_matches(|c| matches!(c, ' ' | '\t' | '\r' | '\n')))
        .collect()
}

pub fn strip_fws_from_tag_value(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, ' ' | '\t' | '\r' | '\n'))
        .collect()
}

pub fn parse_base64_tag_value(value: &str) -> Result<Vec<u8>, Base64Error> {
    let value = strip_fws_from_tag_value(value);
    util::decode_base64(&value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_colon_separated_tag_value_ok() {
        assert_eq!(
            parse_colon_separated_tag_value("ab:\r\n\tc\r\n\td:e"),
            ["ab", "c\r\n\td", "e"]
        );
        assert_eq!(parse_colon_separated_tag_value(""), [""]);
    }

    #[test]
    fn tag_list_from_str_ok() {
        let example = " v = 1 ; a=rsa-sha256;d=example.net; s=brisbane;
  c=simple; q=dns/txt; i=中文@eng.example.net;
  t=1117574938; x=1118006938;
  h=from:to:subject:date;
  bh=MTIzNDU2Nzg5MDEyMzQ1Njc4OTAxMjM0NTY3ODkwMTI=;
  b=dzdVyOfAKCdLXdJOc9G2q8LoXSlEniSbav+yuU4zGeeruD00lszZVoG4ZHRNiYzR";
        let example = example.replace('\n', "\r\n");

        let tags = TagList::from_str(&example).unwrap();

        assert_eq!(tags.as_ref().len(), 12);
        assert_eq!(tags.get("v"), Some("1"));
        assert_eq!(tags.get("i"), Some("中文@eng.example.net"));
        assert_eq!(tags.get("z"), None);
    }

    #[test]
    fn tag_list_trailing_semicolon() {
        let tags = TagList::from_str("v=DKIM1; p=YWJj; ").unwrap();
        assert_eq!(tags.get("p"), Some("YWJj"));
    }

    #[test]
    fn tag_list_empty_value() {
        let tags = TagList::from_str("v=DKIM1; k=rsa; p=").unwrap();
        assert_eq!(tags.get("p"), Some(""));
    }

    #[test]
    fn tag_list_syntax_errors() {
        assert_eq!(TagList::from_str(""), Err(TagListParseError::Syntax));
        assert_eq!(TagList::from_str("v=1; a"), Err(TagListParseError::Syntax));
        assert_eq!(TagList::from_str("v=1; =x"), Err(TagListParseError::Syntax));
        assert_eq!(TagList::from_str("v=1;; a=b"), Err(TagListParseError::Syntax));
        assert_eq!(TagList::from_str("1v=1"), Err(TagListParseError::Syntax));
        assert_eq!(
            TagList::from_str("v=1; a=x; a=y"),
            Err(TagListParseError::DuplicateTag)
        );
    }

    #[test]
    fn strip_tag_name_and_equals_ok() {
        assert_eq!(strip_tag_name_and_equals(" b = abc"), Some((" abc", "b")));
        assert_eq!(strip_tag_name_and_equals("\r\n\tbh=abc"), Some(("abc", "bh")));
        assert_eq!(strip_tag_name_and_equals(" b abc"), None);
    }

    #[test]
    fn parse_base64_tag_value_ok() {
        assert_eq!(parse_base64_tag_value("YW\r\n\tJj"), Ok(b"abc".to_vec()));
        assert!(parse_base64_tag_value("YW*Jj").is_err());
    }
}
