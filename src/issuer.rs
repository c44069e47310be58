use der::Encode;
use time::OffsetDateTime;
use tracing::{debug, info};
use x509_cert::certificate::CertificateInner;

use crate::cert::Certificate;
use crate::cert::extensions::KeyUsages;
use crate::error::{PkiError, Result};
use crate::key::{KeyPair, MIN_RSA_BITS, PublicKey};
use crate::tbs_certificate::TbsCertificate;
use crate::template::CertificateTemplate;

/// Represents an entity capable of issuing certificates.
///
/// An issuer is a signing key plus, unless it is signing its own certificate, the
/// certificate that vouches for that key.
pub trait Issuer {
    /// The issuer's certificate, or `None` when the issuer signs its own certificate.
    fn issuer_certificate(&self) -> Option<&Certificate>;

    /// Returns the signing key of the issuer.
    fn signing_key(&self) -> &KeyPair;

    /// Signs `template` for `subject_key`.
    ///
    /// Every precondition is checked before the signing key is touched; on error nothing
    /// has been signed.
    ///
    /// # Errors
    /// `SigningError` when the issuer certificate does not belong to the signing key, is
    /// not a CA, may not sign certificates, or is outside its validity window, when either
    /// key is below the minimum size, and when the template's window is empty.
    fn sign_template(
        &self,
        template: &CertificateTemplate,
        subject_key: &PublicKey,
    ) -> Result<Certificate> {
        let now = OffsetDateTime::now_utc();
        let signing_key = self.signing_key();

        if template.validity.not_after <= template.validity.not_before {
            return Err(PkiError::SigningError(
                "template notAfter must be later than notBefore".to_string(),
            ));
        }

        let (issuer, authority_key_id) = match self.issuer_certificate() {
            Some(issuer_cert) => {
                check_issuer_certificate(issuer_cert, signing_key, now)?;
                if !subject_key.meets_minimum_size() {
                    return Err(PkiError::SigningError(format!(
                        "refusing to certify a weak {} key",
                        subject_key.algorithm()
                    )));
                }
                let key_id = signing_key.public_key().key_identifier()?;
                (issuer_cert.subject().clone(), Some(key_id))
            }
            None => {
                if *subject_key != signing_key.public_key() {
                    return Err(PkiError::SigningError(
                        "self-signed certificate must certify the signing key".to_string(),
                    ));
                }
                (template.subject.clone(), None)
            }
        };

        let tbs_cert = TbsCertificate {
            serial_number: template.serial_number.clone(),
            signature_algorithm: signing_key.signature_algorithm(),
            issuer,
            validity: template.validity.clone(),
            subject: template.subject.clone(),
            subject_public_key: subject_key.clone(),
            extensions: template.extensions(subject_key, authority_key_id)?,
        };
        debug!(
            serial = %hex::encode(&tbs_cert.serial_number),
            algorithm = ?tbs_cert.signature_algorithm,
            "signing certificate"
        );

        let tbs_cert_inner = tbs_cert.to_tbs_certificate_inner()?;
        let signature = signing_key.sign_data(&tbs_cert_inner.to_der()?)?;

        let cert_inner = CertificateInner {
            tbs_certificate: tbs_cert_inner,
            signature_algorithm: tbs_cert.signature_algorithm.into(),
            signature: der::asn1::BitString::from_bytes(&signature)?,
        };

        info!(
            serial = %hex::encode(&tbs_cert.serial_number),
            subject = %tbs_cert.subject,
            not_after = %tbs_cert.validity.not_after,
            is_ca = template.is_ca,
            "issued certificate"
        );
        Ok(Certificate { inner: cert_inner })
    }
}

/// Checks that `issuer_cert` may sign certificates with `issuer_key` at `at`.
pub fn check_issuer_certificate(
    issuer_cert: &Certificate,
    issuer_key: &KeyPair,
    at: OffsetDateTime,
) -> Result<()> {
    if issuer_cert.public_key()? != issuer_key.public_key() {
        return Err(PkiError::SigningError(
            "issuer key does not match the issuer certificate".to_string(),
        ));
    }
    if !issuer_key.public_key().meets_minimum_size() {
        return Err(PkiError::SigningError(format!(
            "issuer {} key is below the {MIN_RSA_BITS}-bit minimum",
            issuer_key.algorithm()
        )));
    }
    if !issuer_cert.is_ca()? {
        return Err(PkiError::SigningError(
            "issuer certificate is not a CA".to_string(),
        ));
    }
    if let Some(key_usage) = issuer_cert.key_usage()? {
        if !key_usage.contains(KeyUsages::KeyCertSign) {
            return Err(PkiError::SigningError(
                "issuer certificate key usage lacks keyCertSign".to_string(),
            ));
        }
    }
    let validity = issuer_cert.validity();
    if !validity.contains(at) {
        return Err(PkiError::SigningError(format!(
            "issuer certificate is not valid at {at} (valid {} to {})",
            validity.not_before, validity.not_after
        )));
    }
    Ok(())
}

/// A CA certificate and its key, borrowed for one signing operation.
#[derive(Debug, Clone, Copy)]
pub struct BorrowedIssuer<'a> {
    pub cert: &'a Certificate,
    pub key: &'a KeyPair,
}

impl Issuer for BorrowedIssuer<'_> {
    fn issuer_certificate(&self) -> Option<&Certificate> {
        Some(self.cert)
    }

    fn signing_key(&self) -> &KeyPair {
        self.key
    }
}

/// A key signing its own certificate.
#[derive(Debug, Clone, Copy)]
pub struct SelfIssuer<'a> {
    pub key: &'a KeyPair,
}

impl Issuer for SelfIssuer<'_> {
    fn issuer_certificate(&self) -> Option<&Certificate> {
        None
    }

    fn signing_key(&self) -> &KeyPair {
        self.key
    }
}

/// Signs `template` for `subject_key` as the CA `issuer_cert`, using `issuer_key`.
pub fn sign(
    template: &CertificateTemplate,
    issuer_cert: &Certificate,
    issuer_key: &KeyPair,
    subject_key: &PublicKey,
) -> Result<Certificate> {
    BorrowedIssuer {
        cert: issuer_cert,
        key: issuer_key,
    }
    .sign_template(template, subject_key)
}

/// Signs `template` with `key` for its own public key. Issuer and subject are the same name.
pub fn sign_self_signed(template: &CertificateTemplate, key: &KeyPair) -> Result<Certificate> {
    SelfIssuer { key }.sign_template(template, &key.public_key())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::extensions::{AuthorityKeyIdentifier, KeyUsage, SubjectKeyIdentifier};
    use crate::cert::params::{Identity, Validity, ValidityPolicy, find_extension};
    use crate::template::RandomSerial;
    use time::Duration;

    fn ca_template() -> CertificateTemplate {
        CertificateTemplate::for_ca(
            &Identity::from_common_name("SELF-CA"),
            &RandomSerial,
            &ValidityPolicy::ca_default(),
        )
        .unwrap()
    }

    fn leaf_template() -> CertificateTemplate {
        let mut template = ca_template();
        template.subject = crate::cert::params::DistinguishedName::from_common_name("leaf")
            .as_x509_name()
            .unwrap();
        template.is_ca = false;
        template.key_usage = KeyUsage(KeyUsages::DigitalSignature.into());
        template
    }

    #[test]
    fn self_signed_has_no_authority_key_id() {
        let key = KeyPair::generate_ecdsa_p256();
        let cert = sign_self_signed(&ca_template(), &key).unwrap();
        assert_eq!(cert.issuer(), cert.subject());
        let extensions = cert.extensions();
        assert!(
            find_extension::<AuthorityKeyIdentifier>(&extensions)
                .unwrap()
                .is_none()
        );
        assert_eq!(
            find_extension::<SubjectKeyIdentifier>(&extensions).unwrap(),
            Some(SubjectKeyIdentifier(
                key.public_key().key_identifier().unwrap()
            ))
        );
        cert.verify_signature(&key.public_key()).unwrap();
    }

    #[test]
    fn self_signed_refuses_foreign_subject_key() {
        let key = KeyPair::generate_ecdsa_p256();
        let other = KeyPair::generate_ecdsa_p256();
        let err = SelfIssuer { key: &key }
            .sign_template(&ca_template(), &other.public_key())
            .unwrap_err();
        assert!(matches!(err, PkiError::SigningError(_)));
    }

    #[test]
    fn signed_leaf_names_its_issuer() {
        let ca_key = KeyPair::generate_ecdsa_p384();
        let ca = sign_self_signed(&ca_template(), &ca_key).unwrap();
        let leaf_key = KeyPair::generate_ecdsa_p256();
        let template = leaf_template();
        let leaf = sign(&template, &ca, &ca_key, &leaf_key.public_key()).unwrap();

        assert_eq!(leaf.issuer(), ca.subject());
        assert_eq!(leaf.public_key().unwrap(), leaf_key.public_key());
        assert_eq!(
            find_extension::<AuthorityKeyIdentifier>(&leaf.extensions()).unwrap(),
            Some(AuthorityKeyIdentifier {
                key_identifier: ca_key.public_key().key_identifier().unwrap()
            })
        );
        leaf.verify_signature(&ca_key.public_key()).unwrap();
    }

    #[test]
    fn refuses_empty_validity_window() {
        let key = KeyPair::generate_ecdsa_p256();
        let mut template = ca_template();
        template.validity.not_after = template.validity.not_before;
        assert!(matches!(
            sign_self_signed(&template, &key),
            Err(PkiError::SigningError(_))
        ));
    }

    #[test]
    fn refuses_issuer_without_cert_sign() {
        let ca_key = KeyPair::generate_ecdsa_p256();
        let mut template = ca_template();
        template.key_usage = KeyUsage(KeyUsages::DigitalSignature.into());
        let ca = sign_self_signed(&template, &ca_key).unwrap();

        let leaf_key = KeyPair::generate_ecdsa_p256();
        let err = sign(&leaf_template(), &ca, &ca_key, &leaf_key.public_key()).unwrap_err();
        assert!(matches!(err, PkiError::SigningError(_)));
    }

    #[test]
    fn refuses_expired_issuer() {
        let ca_key = KeyPair::generate_ecdsa_p256();
        let now = OffsetDateTime::now_utc();
        let mut template = ca_template();
        template.validity = Validity {
            not_before: now - Duration::days(30),
            not_after: now - Duration::days(1),
        };
        let ca = sign_self_signed(&template, &ca_key).unwrap();

        let leaf_key = KeyPair::generate_ecdsa_p256();
        let err = sign(&leaf_template(), &ca, &ca_key, &leaf_key.public_key()).unwrap_err();
        assert!(matches!(err, PkiError::SigningError(_)));
    }

    #[test]
    fn refuses_weak_rsa_keys() {
        let weak = KeyPair::generate_rsa_unchecked(1024);
        let weak_ca = sign_self_signed(&ca_template(), &weak).unwrap();
        let leaf_key = KeyPair::generate_ecdsa_p256();
        let err = sign(&leaf_template(), &weak_ca, &weak, &leaf_key.public_key()).unwrap_err();
        assert!(matches!(err, PkiError::SigningError(_)));

        let ca_key = KeyPair::generate_ecdsa_p256();
        let ca = sign_self_signed(&ca_template(), &ca_key).unwrap();
        let err = sign(&leaf_template(), &ca, &ca_key, &weak.public_key()).unwrap_err();
        assert!(matches!(err, PkiError::SigningError(_)));
    }

    #[test]
    fn refuses_non_ca_issuer_and_mismatched_key() {
        let ca_key = KeyPair::generate_ecdsa_p256();
        let ca = sign_self_signed(&ca_template(), &ca_key).unwrap();
        let leaf_key = KeyPair::generate_ecdsa_p256();
        let leaf = sign(&leaf_template(), &ca, &ca_key, &leaf_key.public_key()).unwrap();

        let err = sign(&leaf_template(), &leaf, &leaf_key, &ca_key.public_key()).unwrap_err();
        assert!(matches!(err, PkiError::SigningError(_)));

        let stranger = KeyPair::generate_ecdsa_p256();
        let err = sign(&leaf_template(), &ca, &stranger, &leaf_key.public_key()).unwrap_err();
        assert!(matches!(err, PkiError::SigningError(_)));
    }
}
