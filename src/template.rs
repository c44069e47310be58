//! Certificate templates: everything about a certificate that is decided before signing.
//!
//! A template is built fresh for every issuance. It draws its serial number from a
//! [`SerialNumberAllocator`] and its validity window from a [`ValidityPolicy`], so two
//! certificates never share either by accident.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use rand_core::RngCore;
use x509_cert::name::Name;

use crate::cert::extensions::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, ExtendedKeyUsageOption, KeyUsage,
    KeyUsages, SubjectAltName, SubjectKeyIdentifier,
};
use crate::cert::params::{ExtensionParam, Identity, Validity, ValidityPolicy};
use crate::csr::VerifiedRequest;
use crate::error::{PkiError, Result};
use crate::key::PublicKey;

/// Length of random serial numbers, in bytes.
pub const SERIAL_LEN: usize = 16;

/// Hands out serial numbers that are unique for the lifetime of an issuing CA.
///
/// Serials are returned as big-endian unsigned integers.
pub trait SerialNumberAllocator: Send + Sync + fmt::Debug {
    fn next_serial(&self) -> Result<Vec<u8>>;
}

/// 128-bit serial numbers from the operating system's CSPRNG.
///
/// The top bit is cleared so the DER INTEGER stays positive without a padding byte.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSerial;

impl SerialNumberAllocator for RandomSerial {
    fn next_serial(&self) -> Result<Vec<u8>> {
        let mut serial = [0u8; SERIAL_LEN];
        rand_core::OsRng
            .try_fill_bytes(&mut serial)
            .map_err(|e| PkiError::SigningError(format!("random source unavailable: {e}")))?;
        serial[0] &= 0x7f;
        if serial.iter().all(|b| *b == 0) {
            serial[SERIAL_LEN - 1] = 1;
        }
        Ok(serial.to_vec())
    }
}

/// Serial numbers from a counter, for deployments that want ordered serials.
#[derive(Debug)]
pub struct MonotonicSerial {
    next: AtomicU64,
}

impl MonotonicSerial {
    /// A counter whose first serial is `start` (or 1, if `start` is 0).
    pub fn new(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start.max(1)),
        }
    }
}

impl SerialNumberAllocator for MonotonicSerial {
    fn next_serial(&self) -> Result<Vec<u8>> {
        let value = self
            .next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_add(1))
            .map_err(|_| PkiError::SigningError("serial number counter exhausted".to_string()))?;
        Ok(trim_leading_zeros(&value.to_be_bytes()))
    }
}

fn trim_leading_zeros(bytes: &[u8]) -> Vec<u8> {
    let first = bytes
        .iter()
        .position(|b| *b != 0)
        .unwrap_or(bytes.len() - 1);
    bytes[first..].to_vec()
}

/// The value of a big-endian serial number, or `None` when it does not fit in 64 bits.
pub fn serial_value(serial: &[u8]) -> Option<u64> {
    let significant = &serial[serial.iter().position(|b| *b != 0).unwrap_or(serial.len())..];
    let mut buf = [0u8; 8];
    buf.get_mut(8usize.checked_sub(significant.len())?..)?
        .copy_from_slice(significant);
    Some(u64::from_be_bytes(buf))
}

/// The to-be-issued shape of a certificate, minus issuer and subject key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CertificateTemplate {
    pub subject: Name,
    pub serial_number: Vec<u8>,
    pub validity: Validity,
    pub key_usage: KeyUsage,
    pub extended_key_usage: Vec<ExtendedKeyUsageOption>,
    pub subject_alt_name: SubjectAltName,
    pub is_ca: bool,
    pub basic_constraints_valid: bool,
}

impl CertificateTemplate {
    /// Template for a self-signed certificate authority.
    ///
    /// Key usage is keyEncipherment, digitalSignature and keyCertSign.
    pub fn for_ca(
        identity: &Identity,
        serials: &dyn SerialNumberAllocator,
        validity: &ValidityPolicy,
    ) -> Result<Self> {
        Ok(Self {
            subject: identity.subject.as_x509_name()?,
            serial_number: serials.next_serial()?,
            validity: validity.window(time::OffsetDateTime::now_utc())?,
            key_usage: KeyUsage(
                KeyUsages::KeyEncipherment | KeyUsages::DigitalSignature | KeyUsages::KeyCertSign,
            ),
            extended_key_usage: Vec::new(),
            subject_alt_name: identity.subject_alt_name(),
            is_ca: true,
            basic_constraints_valid: true,
        })
    }

    /// Template for a server certificate answering a verified request.
    ///
    /// Subject and SANs are taken from the verified request unchanged.
    pub fn for_leaf(
        request: &VerifiedRequest,
        serials: &dyn SerialNumberAllocator,
        validity: &ValidityPolicy,
    ) -> Result<Self> {
        Ok(Self {
            subject: request.subject().clone(),
            serial_number: serials.next_serial()?,
            validity: validity.window(time::OffsetDateTime::now_utc())?,
            key_usage: KeyUsage(KeyUsages::KeyEncipherment | KeyUsages::DigitalSignature),
            extended_key_usage: vec![ExtendedKeyUsageOption::ServerAuth],
            subject_alt_name: request.subject_alt_name().clone(),
            is_ca: false,
            basic_constraints_valid: true,
        })
    }

    /// The extensions this template puts into a certificate for `subject_key`.
    ///
    /// `authority_key_id` is `None` for self-signed certificates.
    pub fn extensions(
        &self,
        subject_key: &PublicKey,
        authority_key_id: Option<Vec<u8>>,
    ) -> Result<Vec<ExtensionParam>> {
        let mut extensions = Vec::new();

        if self.basic_constraints_valid {
            let basic_constraints = BasicConstraints {
                is_ca: self.is_ca,
                max_path_length: self.is_ca.then_some(0),
            };
            extensions.push(ExtensionParam::from_extension(&basic_constraints, true)?);
        }

        extensions.push(ExtensionParam::from_extension(&self.key_usage, true)?);

        if !self.extended_key_usage.is_empty() {
            let extended_key_usage = ExtendedKeyUsage {
                usage: self.extended_key_usage.clone(),
            };
            extensions.push(ExtensionParam::from_extension(&extended_key_usage, false)?);
        }

        let subject_key_id = SubjectKeyIdentifier(subject_key.key_identifier()?);
        extensions.push(ExtensionParam::from_extension(&subject_key_id, false)?);

        if let Some(key_identifier) = authority_key_id {
            let authority_key_id = AuthorityKeyIdentifier { key_identifier };
            extensions.push(ExtensionParam::from_extension(&authority_key_id, false)?);
        }

        if !self.subject_alt_name.is_empty() {
            extensions.push(ExtensionParam::from_extension(
                &self.subject_alt_name,
                false,
            )?);
        }

        Ok(extensions)
    }
}
