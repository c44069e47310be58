mod util;

use std::collections::HashSet;

use certsign::cert::extensions::{ExtendedKeyUsageOption, KeyUsages};
use certsign::cert::params::ValidityPolicy;
use certsign::cert::{Certificate, SignatureAlgorithm};
use certsign::csr;
use certsign::error::PkiError;
use certsign::key::{KeyAlgorithm, KeyPair};
use certsign::pem_utils::{self, PemKind};
use certsign::verify::verify_issued;
pub type Result<T> = std::result::Result<T, PkiError>;
use time::OffsetDateTime;

/// A ten-year CA issues a one-year server certificate for a validated request.
#[test]
fn issue_server_cert_from_csr() -> Result<()> {
    let ca = util::generate_ca(KeyAlgorithm::EcdsaP256);
    let ca_cert = ca.certificate();
    assert!(ca_cert.is_ca()?);
    assert_eq!(ca_cert.issuer(), ca_cert.subject());
    let ca_validity = ca_cert.validity();
    assert_eq!(
        ca_validity.not_after - ca_validity.not_before,
        time::Duration::days(ValidityPolicy::CA_DEFAULT_DAYS)
    );

    let key = KeyPair::generate_ecdsa_p256();
    let identity = util::service_identity("svc.example.com");
    let request = csr::build_request(&key, &identity)?;
    let issued = ca.issue_from_csr(&request)?;
    let leaf = &issued.certificate;

    assert!(issued.private_key_pem.is_none());
    assert!(!leaf.is_ca()?);
    assert_eq!(leaf.issuer(), ca_cert.subject());
    assert_eq!(leaf.subject(), &identity.subject.as_x509_name()?);
    assert_eq!(leaf.public_key()?, key.public_key());
    assert_eq!(
        leaf.subject_alt_name()?.dns_names,
        vec!["svc.example.com".to_string()]
    );
    assert_eq!(
        leaf.extended_key_usage()?,
        vec![ExtendedKeyUsageOption::ServerAuth]
    );
    let key_usage = leaf.key_usage()?.expect("leaf carries key usage");
    assert!(key_usage.contains(KeyUsages::DigitalSignature));
    assert!(!key_usage.contains(KeyUsages::KeyCertSign));

    let validity = leaf.validity();
    assert!(validity.not_after > validity.not_before);
    verify_issued(leaf, ca_cert, OffsetDateTime::now_utc())?;
    ca.verify(leaf)?;

    let reparsed = Certificate::from_pem(&issued.certificate_pem)?;
    assert_eq!(&reparsed, leaf);
    Ok(())
}

#[test]
fn leaf_fails_under_another_ca() -> Result<()> {
    let ca = util::generate_ca(KeyAlgorithm::EcdsaP256);
    let other = util::generate_ca(KeyAlgorithm::EcdsaP256);

    let key = KeyPair::generate_ecdsa_p256();
    let request = csr::build_request(&key, &util::service_identity("svc.example.com"))?;
    let issued = ca.issue_from_csr(&request)?;

    assert!(matches!(
        other.verify(&issued.certificate),
        Err(PkiError::SignatureVerificationError(_))
    ));
    Ok(())
}

#[test]
fn corrupted_csr_yields_no_certificate() -> Result<()> {
    let ca = util::generate_ca(KeyAlgorithm::EcdsaP256);
    let key = KeyPair::generate_ecdsa_p256();
    let mut request = csr::build_request(&key, &util::service_identity("svc.example.com"))?;
    let last = request.len() - 1;
    request[last] ^= 0x01;

    assert!(matches!(
        ca.issue_from_csr(&request),
        Err(PkiError::SignatureVerificationError(_))
    ));
    Ok(())
}

#[test]
fn consecutive_issuances_have_distinct_serials() -> Result<()> {
    let ca = util::generate_ca(KeyAlgorithm::EcdsaP256);
    let identity = util::service_identity("svc.example.com");

    let mut serials = HashSet::new();
    serials.insert(ca.certificate().serial_number().to_vec());
    for _ in 0..4 {
        let issued = ca.issue_server_certificate(&identity, KeyAlgorithm::EcdsaP256)?;
        assert!(serials.insert(issued.certificate.serial_number().to_vec()));
    }
    Ok(())
}

#[test]
fn rsa_authority_issues_rsa_leaf() -> Result<()> {
    let ca = util::generate_ca(KeyAlgorithm::Rsa { bits: 2048 });
    assert_eq!(
        ca.certificate().signature_algorithm()?,
        SignatureAlgorithm::Sha256WithRSA
    );

    let issued = ca.issue_server_certificate(
        &util::service_identity("rsa.example.com"),
        KeyAlgorithm::Rsa { bits: 2048 },
    )?;
    ca.verify(&issued.certificate)?;

    let key_pem = issued.private_key_pem.expect("generated key is returned");
    let (kind, _) = pem_utils::decode(&key_pem)?;
    assert_eq!(kind, PemKind::RsaPrivateKey);
    let key = KeyPair::from_pem(&key_pem)?;
    assert_eq!(issued.certificate.public_key()?, key.public_key());
    Ok(())
}

#[test]
fn mixed_algorithms_chain() -> Result<()> {
    let ca = util::generate_ca(KeyAlgorithm::EcdsaP384);
    let issued = ca.issue_server_certificate(
        &util::service_identity("mixed.example.com"),
        KeyAlgorithm::Rsa { bits: 2048 },
    )?;
    assert_eq!(
        issued.certificate.signature_algorithm()?,
        SignatureAlgorithm::Sha384WithECDSA
    );
    ca.verify(&issued.certificate)?;
    Ok(())
}

#[test]
fn ca_survives_pem_round_trip() -> Result<()> {
    let ca = util::generate_ca(KeyAlgorithm::EcdsaP256);
    let bundle = format!("{}{}", ca.certificate_pem()?, ca.private_key_pem()?);
    let blocks = pem_utils::decode_all(&bundle)?;
    assert_eq!(
        blocks.iter().map(|(kind, _)| *kind).collect::<Vec<_>>(),
        vec![PemKind::Certificate, PemKind::EcPrivateKey]
    );

    let reloaded = certsign::authority::CertificateAuthority::from_pem(
        &ca.certificate_pem()?,
        &ca.private_key_pem()?,
        Default::default(),
    )?;
    let issued = reloaded.issue_server_certificate(
        &util::service_identity("svc.example.com"),
        KeyAlgorithm::EcdsaP256,
    )?;
    ca.verify(&issued.certificate)?;
    Ok(())
}
