//! PKCS#10 certificate signing requests.
//!
//! [`build_request`] produces a signed request from a key and an identity.
//! [`parse_and_verify`] is the only way to obtain a [`VerifiedRequest`], which is what the
//! template builder accepts, so an unverified request can never reach the signer.

use const_oid::ObjectIdentifier;
use der::asn1::{Any, BitString, SetOfVec};
use der::{Decode, Encode};
use tracing::{debug, warn};
use x509_cert::attr::Attribute;
use x509_cert::ext::Extension;
use x509_cert::name::Name;
use x509_cert::request::{CertReq, CertReqInfo, Version};

use crate::cert::SignatureAlgorithm;
use crate::cert::extensions::{SubjectAltName, ToAndFromX509Extension};
use crate::cert::params::{DistinguishedName, Identity};
use crate::error::{PkiError, Result};
use crate::key::{KeyPair, MIN_RSA_BITS, PublicKey};
use crate::pem_utils::{self, PemKind};

/// PKCS#9 extensionRequest attribute.
pub const EXTENSION_REQUEST: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.14");

/// A decoded, not yet verified, certification request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    pub inner: CertReq,
}

impl CertificateRequest {
    /// Builds and self-signs a request for `identity` with `key`.
    ///
    /// SANs travel in an extensionRequest attribute, which is left out when the identity
    /// has none.
    pub fn build(key: &KeyPair, identity: &Identity) -> Result<Self> {
        let mut attributes = Vec::new();
        let subject_alt_name = identity.subject_alt_name();
        if !subject_alt_name.is_empty() {
            let extension = Extension {
                extn_id: SubjectAltName::OID,
                critical: false,
                extn_value: der::asn1::OctetString::new(
                    subject_alt_name.to_x509_extension_value()?,
                )?,
            };
            attributes.push(Attribute {
                oid: EXTENSION_REQUEST,
                values: SetOfVec::try_from(vec![Any::encode_from(&vec![extension])?])?,
            });
        }

        let info = CertReqInfo {
            version: Version::V1,
            subject: identity.subject.as_x509_name()?,
            public_key: key.as_spki()?,
            attributes: SetOfVec::try_from(attributes)?,
        };

        let signature = key
            .sign_data(&info.to_der()?)
            .map_err(|e| PkiError::EncodingError(format!("failed to sign request: {e}")))?;

        Ok(Self {
            inner: CertReq {
                info,
                algorithm: key.signature_algorithm().into(),
                signature: BitString::from_bytes(&signature)?,
            },
        })
    }

    /// Decodes a DER request. Trailing bytes are rejected.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let inner = CertReq::from_der(der).map_err(PkiError::parse)?;
        Ok(Self { inner })
    }

    pub fn from_pem(armored: &str) -> Result<Self> {
        Self::from_der(&pem_utils::decode_expecting(
            armored,
            PemKind::CertificateRequest,
        )?)
    }

    pub fn to_der(&self) -> Result<Vec<u8>> {
        Ok(self.inner.to_der()?)
    }

    pub fn to_pem(&self) -> Result<String> {
        Ok(pem_utils::encode(PemKind::CertificateRequest, &self.to_der()?))
    }

    /// Checks the proof of possession and extracts what a certificate may be issued for.
    ///
    /// # Errors
    /// `SignatureVerificationError` when the key is too weak, the declared algorithm does
    /// not fit the key, or the signature is wrong; `ParseError` when the key or the
    /// requested SANs cannot be read.
    pub fn verify(&self) -> Result<VerifiedRequest> {
        let info = &self.inner.info;
        let public_key = PublicKey::from_x509spki(&info.public_key)?;
        if !public_key.meets_minimum_size() {
            return Err(PkiError::SignatureVerificationError(format!(
                "{} key is below the {MIN_RSA_BITS}-bit minimum",
                public_key.algorithm()
            )));
        }
        let algorithm = SignatureAlgorithm::try_from(&self.inner.algorithm)
            .map_err(|e| PkiError::SignatureVerificationError(e.to_string()))?;

        let signature = self.inner.signature.as_bytes().ok_or_else(|| {
            PkiError::SignatureVerificationError("signature has unused bits".to_string())
        })?;
        let signed = info.to_der()?;
        public_key.verify(&signed, signature, &algorithm)?;

        Ok(VerifiedRequest {
            subject: info.subject.clone(),
            subject_alt_name: requested_subject_alt_name(&info.attributes)?,
            public_key,
        })
    }
}

/// The SANs carried in the extensionRequest attribute, if any.
fn requested_subject_alt_name(attributes: &SetOfVec<Attribute>) -> Result<SubjectAltName> {
    for attribute in attributes.iter().filter(|a| a.oid == EXTENSION_REQUEST) {
        for value in attribute.values.iter() {
            let extensions =
                Vec::<Extension>::from_der(&value.to_der()?).map_err(PkiError::parse)?;
            if let Some(san) = extensions.iter().find(|e| e.extn_id == SubjectAltName::OID) {
                return SubjectAltName::from_x509_extension_value(san.extn_value.as_bytes());
            }
        }
    }
    Ok(SubjectAltName::default())
}

/// A request whose signature has been checked.
///
/// Only [`parse_and_verify`] and [`CertificateRequest::verify`] construct one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedRequest {
    subject: Name,
    subject_alt_name: SubjectAltName,
    public_key: PublicKey,
}

impl VerifiedRequest {
    /// The subject exactly as encoded in the request.
    pub fn subject(&self) -> &Name {
        &self.subject
    }

    pub fn subject_dn(&self) -> Result<DistinguishedName> {
        DistinguishedName::from_x509_name(&self.subject)
    }

    pub fn subject_alt_name(&self) -> &SubjectAltName {
        &self.subject_alt_name
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }
}

/// Builds a DER-encoded, self-signed PKCS#10 request.
///
/// # Errors
/// `EncodingError` when the identity cannot be encoded or the key fails to sign;
/// `InvalidInput` for SAN values that are not IA5 strings.
pub fn build_request(key: &KeyPair, identity: &Identity) -> Result<Vec<u8>> {
    let request = CertificateRequest::build(key, identity)?;
    debug!(
        subject = %identity.subject.common_name,
        algorithm = %key.algorithm(),
        "built certificate request"
    );
    request.to_der()
}

/// Decodes a DER request and verifies its self-signature.
pub fn parse_and_verify(der: &[u8]) -> Result<VerifiedRequest> {
    let verified = CertificateRequest::from_der(der).and_then(|request| request.verify());
    match &verified {
        Ok(request) => debug!(subject = %request.subject(), "verified certificate request"),
        Err(error) => warn!(%error, "rejected certificate request"),
    }
    verified
}
