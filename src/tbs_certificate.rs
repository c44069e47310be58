use crate::error::PkiError;
use der::Encode;
use der::asn1::{GeneralizedTime, UtcTime};
use x509_cert::Version;
use x509_cert::certificate::TbsCertificateInner;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;

use crate::cert::SignatureAlgorithm;
use crate::cert::params::{ExtensionParam, Validity};
use crate::key::PublicKey;

/// Represents the "To Be Signed" (TBS) portion of an X.509 certificate.
/// This struct contains all the fields required to generate a valid X.509 certificate.
///
/// # Fields
/// * `serial_number` - The unique identifier for the certificate.
/// * `signature_algorithm` - The algorithm used to sign the certificate.
/// * `issuer` - The distinguished name of the certificate issuer.
/// * `validity` - The certificate's validity period.
/// * `subject` - The distinguished name of the certificate subject.
/// * `subject_public_key` - The public key of the certificate subject.
/// * `extensions` - Additional X.509 extensions for the certificate.
#[derive(Debug, Clone)]
pub struct TbsCertificate {
    /// Certificate serial number
    pub serial_number: Vec<u8>,
    /// Certificate signature algorithm
    pub signature_algorithm: SignatureAlgorithm,
    /// Certificate issuer distinguished name
    pub issuer: Name,
    /// Not before / not after
    pub validity: Validity,
    /// Certificate subject distinguished name
    pub subject: Name,
    /// Subject's public key
    pub subject_public_key: PublicKey,
    /// Certificate extensions
    pub extensions: Vec<ExtensionParam>,
}

impl TbsCertificate {
    /// Converts the `TbsCertificate` into a `TbsCertificateInner` for DER encoding.
    pub fn to_tbs_certificate_inner(&self) -> Result<TbsCertificateInner, PkiError> {
        let algorithm_id: x509_cert::spki::AlgorithmIdentifierOwned =
            self.signature_algorithm.into();

        let extensions = self
            .extensions
            .iter()
            .map(ExtensionParam::to_x509_extension)
            .collect::<Result<Vec<_>, _>>()?;

        let validity = x509_cert::time::Validity {
            not_before: to_x509_time(self.validity.not_before)?,
            not_after: to_x509_time(self.validity.not_after)?,
        };

        let serial_number =
            SerialNumber::new(self.serial_number.as_slice()).map_err(PkiError::encoding)?;

        Ok(TbsCertificateInner {
            version: Version::V3,
            serial_number,
            signature: algorithm_id,
            issuer: self.issuer.clone(),
            validity,
            subject: self.subject.clone(),
            subject_public_key_info: self.subject_public_key.to_spki()?,
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: (!extensions.is_empty()).then_some(extensions),
        })
    }

    /// Creates a `TbsCertificate` from a `TbsCertificateInner`.
    pub fn from_tbs_certificate_inner(inner: &TbsCertificateInner) -> Result<Self, PkiError> {
        let subject_public_key = PublicKey::from_x509spki(&inner.subject_public_key_info)?;

        let extensions = inner
            .extensions
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(ExtensionParam::from_x509_extension)
            .collect::<Vec<_>>();

        Ok(Self {
            serial_number: inner.serial_number.as_bytes().into(),
            signature_algorithm: SignatureAlgorithm::try_from(&inner.signature)?,
            issuer: inner.issuer.clone(),
            validity: from_x509_validity(&inner.validity),
            subject: inner.subject.clone(),
            subject_public_key,
            extensions,
        })
    }

    /// Encodes the `TbsCertificate` into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>, PkiError> {
        Ok(self.to_tbs_certificate_inner()?.to_der()?)
    }
}

/// Encodes a timestamp as UTCTime through 2049 and GeneralizedTime afterwards, as RFC 5280
/// requires. Sub-second precision is dropped.
pub(crate) fn to_x509_time(at: time::OffsetDateTime) -> Result<x509_cert::time::Time, PkiError> {
    let system_time: std::time::SystemTime = at.into();
    if at.year() < 2050 {
        Ok(x509_cert::time::Time::UtcTime(
            UtcTime::from_system_time(system_time).map_err(PkiError::encoding)?,
        ))
    } else {
        Ok(x509_cert::time::Time::GeneralTime(
            GeneralizedTime::from_system_time(system_time).map_err(PkiError::encoding)?,
        ))
    }
}

pub(crate) fn from_x509_time(at: &x509_cert::time::Time) -> time::OffsetDateTime {
    match at {
        x509_cert::time::Time::UtcTime(ut) => time::OffsetDateTime::from(ut.to_system_time()),
        x509_cert::time::Time::GeneralTime(gt) => time::OffsetDateTime::from(gt.to_system_time()),
    }
}

pub(crate) fn from_x509_validity(validity: &x509_cert::time::Validity) -> Validity {
    Validity {
        not_before: from_x509_time(&validity.not_before),
        not_after: from_x509_time(&validity.not_after),
    }
}
