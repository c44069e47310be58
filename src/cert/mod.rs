pub mod extensions;
pub mod params;

use crate::error::{PkiError, Result};
use der::asn1::{Any, AnyRef};
use der::{Decode, Encode};
use extensions::{
    BasicConstraints, ExtendedKeyUsage, ExtendedKeyUsageOption, KeyUsage, SubjectAltName,
};
use params::{DistinguishedName, ExtensionParam, Validity, find_extension};
use x509_cert::certificate::CertificateInner;
use x509_cert::name::Name;

use crate::issuer::Issuer;
use crate::key::{KeyPair, PublicKey};
use crate::pem_utils::{self, PemKind};
use crate::tbs_certificate;

/// Represents the supported signature algorithms for certificates and requests.
///
/// This enum provides a mapping to the corresponding OIDs for each algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// SHA-256 with RSA encryption (PKCS#1 v1.5).
    Sha256WithRSA,
    /// SHA-256 with ECDSA.
    Sha256WithECDSA,
    /// SHA-384 with ECDSA.
    Sha384WithECDSA,
}

impl From<SignatureAlgorithm> for x509_cert::spki::AlgorithmIdentifierOwned {
    /// Converts a `SignatureAlgorithm` into an `AlgorithmIdentifierOwned`.
    ///
    /// RSA carries explicit NULL parameters; ECDSA omits them (RFC 5758).
    fn from(value: SignatureAlgorithm) -> Self {
        match value {
            SignatureAlgorithm::Sha256WithRSA => x509_cert::spki::AlgorithmIdentifierOwned {
                oid: const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
                parameters: Some(Any::from(AnyRef::NULL)),
            },
            SignatureAlgorithm::Sha256WithECDSA => x509_cert::spki::AlgorithmIdentifierOwned {
                oid: const_oid::db::rfc5912::ECDSA_WITH_SHA_256,
                parameters: None,
            },
            SignatureAlgorithm::Sha384WithECDSA => x509_cert::spki::AlgorithmIdentifierOwned {
                oid: const_oid::db::rfc5912::ECDSA_WITH_SHA_384,
                parameters: None,
            },
        }
    }
}

impl TryFrom<&x509_cert::spki::AlgorithmIdentifierOwned> for SignatureAlgorithm {
    type Error = PkiError;

    fn try_from(value: &x509_cert::spki::AlgorithmIdentifierOwned) -> Result<Self> {
        match value.oid {
            const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION => {
                Ok(SignatureAlgorithm::Sha256WithRSA)
            }
            const_oid::db::rfc5912::ECDSA_WITH_SHA_256 => Ok(SignatureAlgorithm::Sha256WithECDSA),
            const_oid::db::rfc5912::ECDSA_WITH_SHA_384 => Ok(SignatureAlgorithm::Sha384WithECDSA),
            other => Err(PkiError::ParseError(format!(
                "Unsupported signature algorithm {other}"
            ))),
        }
    }
}

/// Represents an X.509 certificate.
///
/// A certificate is immutable once signed; changing anything means issuing a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// The inner representation of the certificate.
    pub inner: CertificateInner,
}

impl Certificate {
    /// Encodes the certificate into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| PkiError::EncodingError(e.to_string()))
    }

    /// Encodes the certificate into a `CERTIFICATE` PEM block.
    pub fn to_pem(&self) -> Result<String> {
        Ok(pem_utils::encode(PemKind::Certificate, &self.to_der()?))
    }

    /// Parses a DER certificate. Trailing bytes are rejected.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let inner = CertificateInner::from_der(der).map_err(PkiError::parse)?;
        Ok(Self { inner })
    }

    /// Parses the first block of `armored`, which must be a `CERTIFICATE`.
    pub fn from_pem(armored: &str) -> Result<Self> {
        Self::from_der(&pem_utils::decode_expecting(armored, PemKind::Certificate)?)
    }

    pub fn subject(&self) -> &Name {
        &self.inner.tbs_certificate.subject
    }

    pub fn issuer(&self) -> &Name {
        &self.inner.tbs_certificate.issuer
    }

    pub fn subject_dn(&self) -> Result<DistinguishedName> {
        DistinguishedName::from_x509_name(self.subject())
    }

    /// Whether issuer and subject names are the same.
    pub fn is_self_issued(&self) -> bool {
        self.subject() == self.issuer()
    }

    pub fn serial_number(&self) -> &[u8] {
        self.inner.tbs_certificate.serial_number.as_bytes()
    }

    pub fn validity(&self) -> Validity {
        tbs_certificate::from_x509_validity(&self.inner.tbs_certificate.validity)
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_x509spki(&self.inner.tbs_certificate.subject_public_key_info)
    }

    pub fn signature_algorithm(&self) -> Result<SignatureAlgorithm> {
        SignatureAlgorithm::try_from(&self.inner.signature_algorithm)
    }

    pub fn extensions(&self) -> Vec<ExtensionParam> {
        self.inner
            .tbs_certificate
            .extensions
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(ExtensionParam::from_x509_extension)
            .collect()
    }

    pub fn basic_constraints(&self) -> Result<Option<BasicConstraints>> {
        find_extension(&self.extensions())
    }

    /// A certificate is a CA only if it carries basicConstraints with cA set.
    pub fn is_ca(&self) -> Result<bool> {
        Ok(self.basic_constraints()?.is_some_and(|bc| bc.is_ca))
    }

    pub fn key_usage(&self) -> Result<Option<KeyUsage>> {
        find_extension(&self.extensions())
    }

    pub fn extended_key_usage(&self) -> Result<Vec<ExtendedKeyUsageOption>> {
        Ok(find_extension::<ExtendedKeyUsage>(&self.extensions())?
            .map(|eku| eku.usage)
            .unwrap_or_default())
    }

    /// The Subject Alternative Names, empty when the extension is absent.
    pub fn subject_alt_name(&self) -> Result<SubjectAltName> {
        Ok(find_extension(&self.extensions())?.unwrap_or_default())
    }

    /// Checks the certificate signature against `issuer_key`.
    ///
    /// The declared signature algorithm must be the one `issuer_key` signs with, and it
    /// must agree with the algorithm inside the signed portion.
    pub fn verify_signature(&self, issuer_key: &PublicKey) -> Result<()> {
        let outer = self.signature_algorithm()?;
        let inner = SignatureAlgorithm::try_from(&self.inner.tbs_certificate.signature)?;
        if outer != inner {
            return Err(PkiError::SignatureVerificationError(
                "signature algorithm differs between certificate and TBS".to_string(),
            ));
        }
        let tbs = self.inner.tbs_certificate.to_der()?;
        let signature = self.inner.signature.as_bytes().ok_or_else(|| {
            PkiError::ParseError("signature bit string has unused bits".to_string())
        })?;
        issuer_key.verify(&tbs, signature, &outer)
    }
}

/// A certificate together with the private key for its public key.
///
/// For a certificate authority this is its whole identity: every certificate it issues is
/// only as trustworthy as this key is secret.
#[derive(Debug, Clone)]
pub struct CertificateWithPrivateKey {
    pub cert: Certificate,
    pub key: KeyPair,
}

impl CertificateWithPrivateKey {
    /// Pairs a certificate with a key, refusing a key that does not belong to it.
    pub fn new(cert: Certificate, key: KeyPair) -> Result<Self> {
        if cert.public_key()? != key.public_key() {
            return Err(PkiError::InvalidInput(
                "private key does not match the certificate's public key".to_string(),
            ));
        }
        Ok(Self { cert, key })
    }

    /// Loads a certificate PEM and a private key PEM.
    pub fn from_pem(cert_pem: &str, key_pem: &str) -> Result<Self> {
        Self::new(Certificate::from_pem(cert_pem)?, KeyPair::from_pem(key_pem)?)
    }

    pub fn cert_pem(&self) -> Result<String> {
        self.cert.to_pem()
    }

    pub fn key_pem(&self) -> Result<String> {
        self.key.to_pem()
    }
}

impl Issuer for CertificateWithPrivateKey {
    fn issuer_certificate(&self) -> Option<&Certificate> {
        Some(&self.cert)
    }

    fn signing_key(&self) -> &KeyPair {
        &self.key
    }
}
