//! A private certificate authority: a CA certificate, its key, and an issuance policy.

use bon::Builder;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::cert::params::{Identity, ValidityPolicy};
use crate::cert::{Certificate, CertificateWithPrivateKey};
use crate::csr::{self, VerifiedRequest};
use crate::error::{PkiError, Result};
use crate::issuer::{self, Issuer};
use crate::key::{KeyAlgorithm, KeyPair};
use crate::template::{
    CertificateTemplate, MonotonicSerial, RandomSerial, SerialNumberAllocator, serial_value,
};
use crate::verify;

/// Which serial number allocator an authority uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SerialStrategy {
    /// 128-bit random serials.
    #[default]
    Random,
    /// Counting up from `start`.
    Monotonic { start: u64 },
}

impl SerialStrategy {
    pub fn allocator(&self) -> Box<dyn SerialNumberAllocator> {
        match self {
            SerialStrategy::Random => Box::new(RandomSerial),
            SerialStrategy::Monotonic { start } => Box::new(MonotonicSerial::new(*start)),
        }
    }
}

/// How an authority issues certificates.
///
/// ```rust
/// use certsign::authority::{AuthorityPolicy, SerialStrategy};
/// use certsign::cert::params::ValidityPolicy;
///
/// let policy = AuthorityPolicy::builder()
///     .leaf_validity(ValidityPolicy::for_days(90))
///     .serials(SerialStrategy::Monotonic { start: 1000 })
///     .build();
/// assert_eq!(policy.ca_validity, ValidityPolicy::ca_default());
/// ```
#[derive(Clone, Debug, Builder, PartialEq, Eq)]
pub struct AuthorityPolicy {
    #[builder(default = ValidityPolicy::ca_default())]
    pub ca_validity: ValidityPolicy,
    #[builder(default = ValidityPolicy::leaf_default())]
    pub leaf_validity: ValidityPolicy,
    #[builder(default)]
    pub serials: SerialStrategy,
}

impl Default for AuthorityPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// The outcome of an issuance, ready to hand to the requester.
#[derive(Clone, Debug)]
pub struct IssuedCertificate {
    pub certificate: Certificate,
    pub certificate_pem: String,
    /// Set only when the authority generated the subject key itself.
    pub private_key_pem: Option<String>,
}

impl IssuedCertificate {
    fn new(certificate: Certificate, private_key_pem: Option<String>) -> Result<Self> {
        Ok(Self {
            certificate_pem: certificate.to_pem()?,
            certificate,
            private_key_pem,
        })
    }
}

/// A certificate authority able to sign server certificates.
///
/// Issuance takes `&self`; the serial allocator is the only shared state, so an authority
/// can be shared across threads.
#[derive(Debug)]
pub struct CertificateAuthority {
    identity: CertificateWithPrivateKey,
    serials: Box<dyn SerialNumberAllocator>,
    policy: AuthorityPolicy,
}

impl CertificateAuthority {
    /// Generates a key and a self-signed CA certificate for `identity`.
    pub fn generate(
        identity: &Identity,
        algorithm: KeyAlgorithm,
        policy: AuthorityPolicy,
    ) -> Result<Self> {
        let key = KeyPair::generate(algorithm)?;
        let serials = policy.serials.allocator();
        let template = CertificateTemplate::for_ca(identity, serials.as_ref(), &policy.ca_validity)?;
        let cert = issuer::sign_self_signed(&template, &key)?;
        info!(
            subject = %identity.subject.common_name,
            algorithm = %algorithm,
            not_after = %template.validity.not_after,
            "generated certificate authority"
        );
        Ok(Self {
            identity: CertificateWithPrivateKey { cert, key },
            serials,
            policy,
        })
    }

    /// Wraps an existing CA certificate and key.
    ///
    /// The pair is checked up front: the key must match and the certificate must be a CA
    /// that may sign certificates now.
    ///
    /// A monotonic counter does not survive a reload, so `start` must be the persisted next
    /// serial. It has to lie above the CA certificate's own serial; anything lower would
    /// hand out serials this CA has already used, and is a `ConfigError`.
    pub fn from_parts(identity: CertificateWithPrivateKey, policy: AuthorityPolicy) -> Result<Self> {
        issuer::check_issuer_certificate(&identity.cert, &identity.key, OffsetDateTime::now_utc())?;
        if let SerialStrategy::Monotonic { start } = policy.serials {
            let ca_serial = identity.cert.serial_number();
            if serial_value(ca_serial).is_none_or(|used| start <= used) {
                return Err(PkiError::ConfigError(format!(
                    "monotonic serial start {start} does not exceed CA serial {}",
                    hex::encode(ca_serial)
                )));
            }
        }
        debug!(
            subject = %identity.cert.subject(),
            serials = ?policy.serials,
            "loaded certificate authority"
        );
        Ok(Self {
            serials: policy.serials.allocator(),
            identity,
            policy,
        })
    }

    /// Loads a CA from a `CERTIFICATE` PEM and an RSA or EC private key PEM.
    pub fn from_pem(cert_pem: &str, key_pem: &str, policy: AuthorityPolicy) -> Result<Self> {
        Self::from_parts(CertificateWithPrivateKey::from_pem(cert_pem, key_pem)?, policy)
    }

    pub fn certificate(&self) -> &Certificate {
        &self.identity.cert
    }

    pub fn policy(&self) -> &AuthorityPolicy {
        &self.policy
    }

    pub fn certificate_pem(&self) -> Result<String> {
        self.identity.cert_pem()
    }

    pub fn private_key_pem(&self) -> Result<String> {
        self.identity.key_pem()
    }

    /// Validates a DER request and, if it verifies, issues a server certificate for it.
    ///
    /// A request that fails validation produces no certificate.
    pub fn issue_from_csr(&self, der: &[u8]) -> Result<IssuedCertificate> {
        let request = csr::parse_and_verify(der)?;
        let certificate = self.issue_for_request(&request)?;
        IssuedCertificate::new(certificate, None)
    }

    /// Issues a server certificate for an already verified request.
    pub fn issue_for_request(&self, request: &VerifiedRequest) -> Result<Certificate> {
        let template =
            CertificateTemplate::for_leaf(request, self.serials.as_ref(), &self.policy.leaf_validity)?;
        self.identity
            .sign_template(&template, request.public_key())
            .inspect_err(|error| {
                warn!(
                    serial = %hex::encode(&template.serial_number),
                    %error,
                    "refused to issue certificate"
                )
            })
    }

    /// Generates a fresh key for `identity`, requests and issues a certificate for it.
    ///
    /// The generated private key is returned alongside the certificate.
    pub fn issue_server_certificate(
        &self,
        identity: &Identity,
        algorithm: KeyAlgorithm,
    ) -> Result<IssuedCertificate> {
        if identity.dns_names.is_empty() && identity.ip_addresses.is_empty() {
            return Err(PkiError::InvalidInput(
                "server certificate needs at least one DNS name or IP address".to_string(),
            ));
        }
        let key = KeyPair::generate(algorithm)?;
        let request = csr::parse_and_verify(&csr::build_request(&key, identity)?)?;
        let certificate = self.issue_for_request(&request)?;
        IssuedCertificate::new(certificate, Some(key.to_pem()?))
    }

    /// Checks that `certificate` was issued by this authority and is valid now.
    pub fn verify(&self, certificate: &Certificate) -> Result<()> {
        verify::verify_issued(certificate, &self.identity.cert, OffsetDateTime::now_utc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn authority_is_shareable() {
        assert_send_sync::<CertificateAuthority>();
    }

    #[test]
    fn default_policy_uses_standard_lifetimes() {
        let policy = AuthorityPolicy::default();
        assert_eq!(policy.ca_validity, ValidityPolicy::ca_default());
        assert_eq!(policy.leaf_validity, ValidityPolicy::leaf_default());
        assert_eq!(policy.serials, SerialStrategy::Random);
    }

    #[test]
    fn monotonic_authority_counts_serials() {
        let policy = AuthorityPolicy::builder()
            .serials(SerialStrategy::Monotonic { start: 1988 })
            .build();
        let ca = CertificateAuthority::generate(
            &Identity::from_common_name("SELF-CA"),
            KeyAlgorithm::EcdsaP256,
            policy,
        )
        .unwrap();
        assert_eq!(ca.certificate().serial_number(), 1988u64.to_be_bytes()[6..].to_vec());

        let identity = Identity::builder()
            .subject(Identity::from_common_name("svc").subject)
            .dns_names(vec!["svc.internal".to_string()])
            .build();
        let issued = ca
            .issue_server_certificate(&identity, KeyAlgorithm::EcdsaP256)
            .unwrap();
        assert_eq!(issued.certificate.serial_number(), 1989u64.to_be_bytes()[6..].to_vec());
        assert!(issued.private_key_pem.is_some());
        ca.verify(&issued.certificate).unwrap();
    }

    #[test]
    fn reloaded_monotonic_authority_never_reuses_serials() {
        let policy = AuthorityPolicy::builder()
            .serials(SerialStrategy::Monotonic { start: 1 })
            .build();
        let ca = CertificateAuthority::generate(
            &Identity::from_common_name("SELF-CA"),
            KeyAlgorithm::EcdsaP256,
            policy.clone(),
        )
        .unwrap();
        let cert_pem = ca.certificate_pem().unwrap();
        let key_pem = ca.private_key_pem().unwrap();

        let err = CertificateAuthority::from_pem(&cert_pem, &key_pem, policy).unwrap_err();
        assert!(matches!(err, PkiError::ConfigError(_)));

        let resumed = AuthorityPolicy::builder()
            .serials(SerialStrategy::Monotonic { start: 2 })
            .build();
        let reloaded = CertificateAuthority::from_pem(&cert_pem, &key_pem, resumed).unwrap();
        let identity = Identity::builder()
            .subject(Identity::from_common_name("svc").subject)
            .dns_names(vec!["svc.internal".to_string()])
            .build();
        let issued = reloaded
            .issue_server_certificate(&identity, KeyAlgorithm::EcdsaP256)
            .unwrap();
        assert_ne!(issued.certificate.serial_number(), ca.certificate().serial_number());
        assert_eq!(issued.certificate.serial_number(), [2u8].as_slice());
    }

    #[test]
    fn monotonic_reload_refuses_random_ca_serial() {
        let ca = CertificateAuthority::generate(
            &Identity::from_common_name("SELF-CA"),
            KeyAlgorithm::EcdsaP256,
            AuthorityPolicy::default(),
        )
        .unwrap();
        let policy = AuthorityPolicy::builder()
            .serials(SerialStrategy::Monotonic { start: u64::MAX })
            .build();
        assert!(matches!(
            CertificateAuthority::from_pem(
                &ca.certificate_pem().unwrap(),
                &ca.private_key_pem().unwrap(),
                policy
            ),
            Err(PkiError::ConfigError(_))
        ));
    }

    #[test]
    fn weak_rsa_authority_is_not_loaded() {
        let weak = KeyPair::generate_rsa_unchecked(1024);
        let template = CertificateTemplate::for_ca(
            &Identity::from_common_name("SELF-CA"),
            &RandomSerial,
            &ValidityPolicy::ca_default(),
        )
        .unwrap();
        let cert = issuer::sign_self_signed(&template, &weak).unwrap();
        assert!(matches!(
            CertificateAuthority::from_pem(
                &cert.to_pem().unwrap(),
                &weak.to_pem().unwrap(),
                AuthorityPolicy::default()
            ),
            Err(PkiError::SigningError(_))
        ));
    }

    #[test]
    fn weak_rsa_request_gets_no_certificate() {
        let ca = CertificateAuthority::generate(
            &Identity::from_common_name("SELF-CA"),
            KeyAlgorithm::EcdsaP256,
            AuthorityPolicy::default(),
        )
        .unwrap();
        let weak = KeyPair::generate_rsa_unchecked(1024);
        let identity = Identity::builder()
            .subject(Identity::from_common_name("svc").subject)
            .dns_names(vec!["svc.internal".to_string()])
            .build();
        let request = csr::build_request(&weak, &identity).unwrap();
        assert!(matches!(
            ca.issue_from_csr(&request),
            Err(PkiError::SignatureVerificationError(_))
        ));
    }

    #[test]
    fn server_certificate_needs_a_name() {
        let ca = CertificateAuthority::generate(
            &Identity::from_common_name("SELF-CA"),
            KeyAlgorithm::EcdsaP256,
            AuthorityPolicy::default(),
        )
        .unwrap();
        assert!(matches!(
            ca.issue_server_certificate(&Identity::from_common_name("svc"), KeyAlgorithm::EcdsaP256),
            Err(PkiError::InvalidInput(_))
        ));
    }

    #[test]
    fn from_parts_rejects_leaf_as_authority() {
        let ca = CertificateAuthority::generate(
            &Identity::from_common_name("SELF-CA"),
            KeyAlgorithm::EcdsaP256,
            AuthorityPolicy::default(),
        )
        .unwrap();
        let identity = Identity::builder()
            .subject(Identity::from_common_name("svc").subject)
            .dns_names(vec!["svc.internal".to_string()])
            .build();
        let issued = ca
            .issue_server_certificate(&identity, KeyAlgorithm::EcdsaP256)
            .unwrap();
        let key_pem = issued.private_key_pem.unwrap();
        assert!(matches!(
            CertificateAuthority::from_pem(&issued.certificate_pem, &key_pem, AuthorityPolicy::default()),
            Err(PkiError::SigningError(_))
        ));
    }
}
