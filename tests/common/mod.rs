#![allow(dead_code)]

use std::{future::Future, io, pin::Pin, sync::Arc};
use dkim_inspector::LookupTxt;

pub type LookupOutput = Vec<io::Result<Vec<u8>>>;
pub type LookupFuture<'a> = Pin<Box<dyn Future<Output = io::Result<LookupOutput>> + Send + 'a>>;

#[derive(Clone)]
pub struct MockLookup(Arc<dyn Fn(&str) -> LookupFuture<'_> + Send + Sync>);

impl MockLookup {
    pub fn new(f: impl Fn(&str) -> LookupFuture<'_> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }
}

impl LookupTxt for MockLookup {
    type Answer = LookupOutput;
    type Query<'a> = Pin<Box<dyn Future<Output = io::Result<Self::Answer>> + Send + 'a>>;

    fn lookup_txt(&self, domain: &str) -> Self::Query<'_> {
        let domain = domain.to_owned();

        Box::pin(async move { self.0(&domain).await })
    }
}

/// Public key of RFC 6376, appendix A.2, in SubjectPublicKeyInfo format.
pub const BRISBANE_SPKI: &str = "\
MIGfMA0GCSqGSIb3DQEBAQUAA4GNADCBiQKBgQDwIRP/UC3SBsEmGqZ9ZJW3/DkMoGeLnQg1fWn7/zYtIxN2SnFCjxOCKG9v3b4jY\
fcTNh5ijSsq631uBItLa7od+v/RtdC2UzJ1lWT947qR+Rcac2gbto/NMqJ0fzfVjH4OuKhitdY9tf6mcwGjaNBcWToIMmPSPDdQPNU\
YckcQ2QIDAQAB";

/// The same public key in RSAPublicKey format.
pub const BRISBANE_PKCS1: &str = "\
MIGJAoGBAPAhE/9QLdIGwSYapn1klbf8OQygZ4udCDV9afv/Ni0jE3ZKcUKPE4Iob2/dviNh9xM2HmKNKyrrfW4Ei0truh36/9G10LZ\
TMnWVZP3jupH5FxpzaBu2j80yonR/N9WMfg64qGK11j21/qZzAaNo0FxZOggyY9I8N1A81RhyRxDZAgMBAAE=";

pub const BRISBANE_MODULUS: &str = "\
f02113ff502dd206c1261aa67d6495b7fc390ca0678b9d08357d69fbff362d2313764a71428f1382286f6fddbe2361f713361e\
628d2b2aeb7d6e048b4b6bba1dfaffd1b5d0b65332759564fde3ba91f9171a73681bb68fcd32a2747f37d58c7e0eb8a862b5d6\
3db5fea67301a368d05c593a083263d23c37503cd518724710d9";

pub const BRISBANE_QUERY_NAME: &str = "brisbane._domainkey.example.com";

/// Resolver answering the query for the given name with the given TXT
/// records, and NXDOMAIN for anything else.
pub fn txt_resolver(query_name: &str, txts: &[&str]) -> MockLookup {
    let query_name = query_name.to_owned();
    let txts: Vec<String> = txts.iter().map(|&s| s.to_owned()).collect();

    MockLookup::new(move |name| {
        let result: io::Result<LookupOutput> = if name == query_name {
            Ok(txts.iter().map(|s| Ok(s.clone().into_bytes())).collect())
        } else {
            Err(io::ErrorKind::NotFound.into())
        };
        Box::pin(async move { result })
    })
}

pub fn brisbane_resolver(txts: &[&str]) -> MockLookup {
    txt_resolver(BRISBANE_QUERY_NAME, txts)
}

/// Message of RFC 6376, appendix A.2, with LF line endings.
// Note RFC 6376, errata 3192 and 4926!
pub const RFC_APPENDIX_A_MESSAGE: &str = "\
DKIM-Signature: v=1; a=rsa-sha256; s=brisbane; d=example.com;
      c=simple/simple; q=dns/txt; i=joe@football.example.com;
      h=Received : From : To : Subject : Date : Message-ID;
      bh=2jUSOH9NhtVGCQWNr9BrIAPreKQjO6Sn7XIkfJVOzv8=;
      b=AuUoFEfDxTDkHlLXSZEpZj79LICEps6eda7W3deTVFOk4yAUoqOB
        4nujc7YopdG5dWLSdNg6xNAZpOPr+kHxt1IrE+NahM6L/LbvaHut
        KVdkLLkpVaVVQPzeRDI009SO2Il5Lu7rDNH6mZckBdrIx0orEtZV
        4bmp/YzhwvcubU4=;
Received: from client1.football.example.com  [192.0.2.1]
      by submitserver.example.com with SUBMISSION;
      Fri, 11 Jul 2003 21:01:54 -0700 (PDT)
From: Joe SixPack <joe@football.example.com>
To: Suzie Q <suzie@shopping.example.net>
Subject: Is dinner ready?
Date: Fri, 11 Jul 2003 21:00:37 -0700 (PDT)
Message-ID: <20030712040037.46341.5F8J@football.example.com>

Hi.

We lost the game. Are you hungry yet?

Joe.
";

/// Signing input of the appendix A.2 message, with LF line endings.
pub const RFC_APPENDIX_A_SIGNING_INPUT: &str = "\
Received: from client1.football.example.com  [192.0.2.1]
      by submitserver.example.com with SUBMISSION;
      Fri, 11 Jul 2003 21:01:54 -0700 (PDT)
From: Joe SixPack <joe@football.example.com>
To: Suzie Q <suzie@shopping.example.net>
Subject: Is dinner ready?
Date: Fri, 11 Jul 2003 21:00:37 -0700 (PDT)
Message-ID: <20030712040037.46341.5F8J@football.example.com>
DKIM-Signature: v=1; a=rsa-sha256; s=brisbane; d=example.com;
      c=simple/simple; q=dns/txt; i=joe@football.example.com;
      h=Received : From : To : Subject : Date : Message-ID;
      bh=2jUSOH9NhtVGCQWNr9BrIAPreKQjO6Sn7XIkfJVOzv8=;
      b=;";

pub fn crlf(s: &str) -> Vec<u8> {
    s.replace('\n', "\r\n").into_bytes()
}

pub fn rfc_appendix_a_message() -> Vec<u8> {
    crlf(RFC_APPENDIX_A_MESSAGE)
}

/// Public key of the key record at `sel1._domainkey.example.com`.
pub const SEL1_SPKI: &str = "MIGfMA0GCSqGSIb3DQEBAQUAA4GNADCBiQKBgQDUUBpSF9Z5KKnl6thBtA/JHrAD5PGK8GV6wBnxa++ZqyE89iJZ1c2owxsUVGvIbDicPcBTgeWzp1rA9iScyD+dXh+BJPWzTOW9aqG7TASFKxbDkHQQw3kU4VdlWdDx/QFBcHw4akY/graxh/fmXDefQU8oNHaLftgEQZeg8A5gBwIDAQAB";

/// Message signed with c=relaxed/relaxed.
pub const RELAXED_MESSAGE: &str = "\
DKIM-Signature: v=1; a=rsa-sha256; c=relaxed/relaxed; d=example.com; s=sel1;\r\n\
\th=From : Subject; bh=aB3JHhL6YfMiNbWX8XRnLJvbWmh93GDFE5RlKDnCXMM=;\r\n\
\tb=SKDgHoiLhshZufSD/tm9E+29MP8NgP3Abl2V6Xnury/bJ57ECVWBcE2URm66\r\n\
\t 60LGJ+id8xS/rMet+hLS9sz9sncl9YHBpepmbkjaOZf/n6THdg8iiBokJlR4\r\n\
\t 9NTpeU4wbKyd+R3xGSvZqNNuZoKgpfY/vjaUWe4jT/wm7g9lInY=\r\n\
From: Joe  SixPack <joe@example.com>  \r\n\
Subject:   Is dinner\r\n\
\tready?  \r\n\
\r\n\
Hi.  \r\n\
\x20 \r\n\
We lost the game.\tAre you hungry yet?\r\n\
\r\n\
\r\n";

pub const RELAXED_SIGNING_INPUT: &str = "\
from:Joe SixPack <joe@example.com>\r\n\
subject:Is dinner ready?\r\n\
dkim-signature:v=1; a=rsa-sha256; c=relaxed/relaxed; d=example.com; s=sel1; h=From : Subject; bh=aB3JHhL6YfMiNbWX8XRnLJvbWmh93GDFE5RlKDnCXMM=; b=";

/// Public key of RFC 8463, appendix A.2.
pub const ED25519_KEY: &str = "11qYAYKxCrfVS/7TyWQHOg7hcvPapiMlrwIaaPcHURo=";

/// Message signed with ed25519-sha256 and body length limit, with trailer
/// text added after signing.
pub const ED25519_MESSAGE: &str = "\
DKIM-Signature: v=1; a=ed25519-sha256; c=relaxed/simple;\r\n\
\x20d=football.example.com; s=brisbane; t=1700000000; x=1700086400;\r\n\
\x20l=54; h=from : to : subject;\r\n\
\x20bh=2jUSOH9NhtVGCQWNr9BrIAPreKQjO6Sn7XIkfJVOzv8=;\r\n\
\x20b=jqEoa+NxCQ1aWSVecM5HHNIRVVuZ5/heUmHWjTkxYgf1KwG3CIscwMounKiS\r\n\
\x20 GDh6cF4fPUMcG3+4/TD2x7rOAw==\r\n\
From: Joe SixPack <joe@football.example.com>\r\n\
To: Suzie Q <suzie@shopping.example.net>\r\n\
Subject: Is dinner ready?\r\n\
\r\n\
Hi.\r\n\
\r\n\
We lost the game. Are you hungry yet?\r\n\
\r\n\
Joe.\r\n\
-- \r\n\
Mailing list footer\r\n";

pub const ED25519_SIGNED_BODY_LENGTH: u64 = 54;
