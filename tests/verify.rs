pub mod common;

use common::*;
use dkim_inspector::{
    inspect,
    verify::{self, Config, PolicyError, VerificationError},
    KeyError, LookupTxt, Message,
};
use std::time::{Duration, SystemTime};

async fn verify_message<T: LookupTxt>(
    message: &[u8],
    resolver: &T,
    config: &Config,
) -> Result<(), VerificationError> {
    let inspection = inspect(message).unwrap();
    let message = Message::parse(message).unwrap();

    let sig = &inspection.signature;
    let record = dkim_inspector::resolve_record(resolver, sig.domain.as_ref(), sig.selector.as_ref())
        .await
        .unwrap();

    verify::verify(&inspection, message.body(), &record, config)
}

fn config_at(secs: u64) -> Config {
    Config {
        fixed_system_time: Some(SystemTime::UNIX_EPOCH + Duration::from_secs(secs)),
        ..Default::default()
    }
}

fn ed25519_resolver() -> MockLookup {
    txt_resolver(
        "brisbane._domainkey.football.example.com",
        &[&format!("v=DKIM1; k=ed25519; p={ED25519_KEY}")],
    )
}

/// Example from RFC 6376, appendix A.2, with public key in both formats.
#[tokio::test]
async fn rfc_appendix_a() {
    let _ = tracing_subscriber::fmt::try_init();

    let message = rfc_appendix_a_message();
    let config = Config::default();

    for key in [BRISBANE_SPKI, BRISBANE_PKCS1] {
        let resolver = brisbane_resolver(&[&format!("v=DKIM1; k=rsa; p={key}")]);

        let result = verify_message(&message, &resolver, &config).await;

        assert!(result.is_ok(), "{result:?}");
    }
}

#[tokio::test]
async fn rfc_appendix_a_mbox() {
    let resolver = brisbane_resolver(&[&format!("v=DKIM1; k=rsa; p={BRISBANE_SPKI}")]);
    let message = crlf(&format!(
        "From joe@football.example.com Fri Jul 11 21:01:54 2003\nX-Foo : bar\n{RFC_APPENDIX_A_MESSAGE}"
    ));

    let result = verify_message(&message, &resolver, &Config::default()).await;

    assert!(result.is_ok(), "{result:?}");
}

#[tokio::test]
async fn relaxed() {
    let resolver = txt_resolver("sel1._domainkey.example.com", &[&format!("v=DKIM1; p={SEL1_SPKI}")]);

    let result = verify_message(RELAXED_MESSAGE.as_bytes(), &resolver, &Config::default()).await;

    assert!(result.is_ok(), "{result:?}");
}

#[tokio::test]
async fn ed25519_partially_signed_body() {
    let resolver = ed25519_resolver();
    let message = ED25519_MESSAGE.as_bytes();

    let config = config_at(1_700_000_100);

    let inspection = inspect(message).unwrap();
    assert_eq!(inspection.signature.body_length, Some(ED25519_SIGNED_BODY_LENGTH));

    let result = verify_message(message, &resolver, &config).await;
    assert!(result.is_ok(), "{result:?}");

    let config = Config {
        forbid_partially_signed_body: true,
        ..config
    };

    let result = verify_message(message, &resolver, &config).await;
    assert!(matches!(
        result,
        Err(VerificationError::Policy(PolicyError::ForbidPartiallySignedBody))
    ));
}

#[tokio::test]
async fn ed25519_truncated_body() {
    let resolver = ed25519_resolver();
    let (header, _) = ED25519_MESSAGE.split_once("\r\n\r\n").unwrap();
    let message = format!("{header}\r\n\r\nHi.\r\n");

    let result = verify_message(message.as_bytes(), &resolver, &config_at(1_700_000_100)).await;

    assert!(matches!(result, Err(VerificationError::InsufficientBodyLength)));
}

#[tokio::test]
async fn ed25519_time_policy() {
    let resolver = ed25519_resolver();
    let message = ED25519_MESSAGE.as_bytes();

    let result = verify_message(message, &resolver, &config_at(1_800_000_000)).await;
    assert!(matches!(
        result,
        Err(VerificationError::Policy(PolicyError::SignatureExpired))
    ));

    let result = verify_message(message, &resolver, &config_at(1_600_000_000)).await;
    assert!(matches!(
        result,
        Err(VerificationError::Policy(PolicyError::TimestampInFuture))
    ));

    let config = Config {
        fail_if_expired: false,
        ..config_at(1_800_000_000)
    };
    let result = verify_message(message, &resolver, &config).await;
    assert!(result.is_ok(), "{result:?}");
}

#[tokio::test]
async fn tampered_header() {
    let resolver = brisbane_resolver(&[&format!("v=DKIM1; k=rsa; p={BRISBANE_SPKI}")]);
    let message = crlf(&RFC_APPENDIX_A_MESSAGE.replace("Is dinner ready?", "Is dinner ready?!"));

    let result = verify_message(&message, &resolver, &Config::default()).await;

    assert!(matches!(result, Err(VerificationError::VerificationFailure)));
}

#[tokio::test]
async fn tampered_body() {
    let resolver = brisbane_resolver(&[&format!("v=DKIM1; k=rsa; p={BRISBANE_SPKI}")]);
    let message = crlf(&RFC_APPENDIX_A_MESSAGE.replace("We lost", "We won"));

    let result = verify_message(&message, &resolver, &Config::default()).await;

    assert!(matches!(result, Err(VerificationError::BodyHashMismatch)));
}

#[tokio::test]
async fn key_record_mismatch() {
    let message = rfc_appendix_a_message();
    let config = Config::default();

    let resolver = brisbane_resolver(&[&format!("v=DKIM1; k=ed25519; p={ED25519_KEY}")]);
    let result = verify_message(&message, &resolver, &config).await;
    assert!(matches!(result, Err(VerificationError::WrongKeyType)));

    let resolver = brisbane_resolver(&[&format!("v=DKIM1; s=x-other; p={BRISBANE_SPKI}")]);
    let result = verify_message(&message, &resolver, &config).await;
    assert!(matches!(result, Err(VerificationError::DisallowedServiceType)));

    let resolver = brisbane_resolver(&["v=DKIM1; p="]);
    let result = verify_message(&message, &resolver, &config).await;
    assert!(matches!(result, Err(VerificationError::Key(KeyError::KeyRevoked))));
}

#[tokio::test]
async fn key_too_small() {
    let resolver = brisbane_resolver(&[&format!("v=DKIM1; k=rsa; p={BRISBANE_SPKI}")]);
    let config = Config {
        min_key_bits: 2048,
        ..Default::default()
    };

    let result = verify_message(&rfc_appendix_a_message(), &resolver, &config).await;

    assert!(matches!(
        result,
        Err(VerificationError::Policy(PolicyError::KeyTooSmall))
    ));
}

#[cfg(not(feature = "pre-rfc8301"))]
#[tokio::test]
async fn historic_algorithm_rejected() {
    let message = crlf(&RFC_APPENDIX_A_MESSAGE.replace("a=rsa-sha256", "a=rsa-sha1"));

    for record in [
        format!("v=DKIM1; k=rsa; p={BRISBANE_SPKI}"),
        format!("v=DKIM1; h=sha1; k=rsa; p={BRISBANE_SPKI}"),
    ] {
        let resolver = brisbane_resolver(&[&record]);

        let result = verify_message(&message, &resolver, &Config::default()).await;

        assert!(matches!(
            result,
            Err(VerificationError::Policy(PolicyError::DisallowedSha1Hash))
        ));
    }
}

#[tokio::test]
async fn sha1_only_key_record() {
    let resolver = brisbane_resolver(&[&format!("v=DKIM1; h=sha1; k=rsa; p={BRISBANE_SPKI}")]);

    let result = verify_message(&rfc_appendix_a_message(), &resolver, &Config::default()).await;

    assert!(matches!(result, Err(VerificationError::DisallowedHashAlgorithm)));
}
