use std::net::IpAddr;

use bon::Builder;
use const_oid::ObjectIdentifier;
use der::{Tag, Tagged};
use der::asn1::{Any, PrintableStringRef, SetOfVec};
use time::Duration;
use time::OffsetDateTime;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};

use super::extensions::SubjectAltName;
use super::extensions::ToAndFromX509Extension;
use crate::error::PkiError;

const COUNTRY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.6");
const ORGANIZATION: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");
const ORGANIZATIONAL_UNIT: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.11");
const LOCALITY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.7");
const PROVINCE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.8");
const STREET_ADDRESS: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.9");
const POSTAL_CODE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.17");
const COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");

/// The identity a requester asks to have certified, or a CA asserts for itself.
///
/// # Fields
/// * `subject` - The distinguished name of the subject.
/// * `dns_names` - DNS names for the Subject Alternative Name extension.
/// * `ip_addresses` - IP addresses for the Subject Alternative Name extension.
/// * `email_addresses` - Email addresses for the Subject Alternative Name extension.
#[derive(Clone, Debug, Builder, Default)]
pub struct Identity {
    pub subject: DistinguishedName,
    #[builder(default)]
    pub dns_names: Vec<String>,
    #[builder(default)]
    pub ip_addresses: Vec<IpAddr>,
    #[builder(default)]
    pub email_addresses: Vec<String>,
}

impl Identity {
    /// An identity with only a common name.
    pub fn from_common_name(common_name: impl Into<String>) -> Self {
        Self {
            subject: DistinguishedName::from_common_name(common_name),
            ..Self::default()
        }
    }

    pub fn subject_alt_name(&self) -> SubjectAltName {
        SubjectAltName {
            dns_names: self.dns_names.clone(),
            ip_addresses: self.ip_addresses.clone(),
            email_addresses: self.email_addresses.clone(),
        }
    }
}

/// Distinguished name parameters for building an X.509 certificate.
///
/// This struct represents the subject or issuer name in a certificate.
///
/// # Fields
/// * `common_name` - The common name (CN).
/// * `country` - The country (C).
/// * `organization` - The organization (O).
/// * `organization_unit` - The organizational unit (OU).
/// * `locality` - The locality or city (L).
/// * `state` - The state or province (ST).
/// * `street_address` - The street address (STREET).
/// * `postal_code` - The postal code.
#[derive(Clone, Debug, Builder, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    pub common_name: String,
    pub country: Option<String>,
    pub organization: Option<String>,
    pub organization_unit: Option<String>,
    pub locality: Option<String>,
    pub state: Option<String>,
    pub street_address: Option<String>,
    pub postal_code: Option<String>,
}

impl DistinguishedName {
    pub fn from_common_name(common_name: impl Into<String>) -> Self {
        Self {
            common_name: common_name.into(),
            ..Self::default()
        }
    }

    /// Converts the distinguished name to an X.509 name.
    ///
    /// Absent fields are omitted. Each present field is one relative distinguished name, in
    /// the order C, O, OU, L, ST, STREET, postalCode, CN. The country is a PrintableString
    /// and every other value a UTF8String.
    pub fn as_x509_name(&self) -> Result<Name, PkiError> {
        let fields = [
            (COUNTRY, self.country.as_deref()),
            (ORGANIZATION, self.organization.as_deref()),
            (ORGANIZATIONAL_UNIT, self.organization_unit.as_deref()),
            (LOCALITY, self.locality.as_deref()),
            (PROVINCE, self.state.as_deref()),
            (STREET_ADDRESS, self.street_address.as_deref()),
            (POSTAL_CODE, self.postal_code.as_deref()),
            (COMMON_NAME, Some(self.common_name.as_str())),
        ];

        let mut rdns = Vec::with_capacity(fields.len());
        for (oid, value) in fields {
            let Some(value) = value.filter(|v| !v.is_empty()) else {
                continue;
            };
            let value = if oid == COUNTRY {
                PrintableStringRef::new(value).map_err(|e| {
                    PkiError::InvalidInput(format!("country '{value}' is not printable: {e}"))
                })?;
                Any::new(Tag::PrintableString, value.as_bytes())?
            } else {
                Any::new(Tag::Utf8String, value.as_bytes())?
            };
            let attribute = AttributeTypeAndValue { oid, value };
            rdns.push(RelativeDistinguishedName(SetOfVec::try_from(vec![
                attribute,
            ])?));
        }
        Ok(RdnSequence(rdns))
    }

    /// Creates a `DistinguishedName` from an X.509 name.
    ///
    /// Attributes this type has no field for are skipped. When an attribute repeats, the
    /// last value wins.
    pub fn from_x509_name(x509dn: &Name) -> Result<Self, PkiError> {
        let mut dn = DistinguishedName::default();

        for rdn in x509dn.0.iter() {
            for attr in rdn.0.iter() {
                let slot = match attr.oid {
                    COMMON_NAME => {
                        dn.common_name = attribute_string(attr)?;
                        continue;
                    }
                    COUNTRY => &mut dn.country,
                    ORGANIZATION => &mut dn.organization,
                    ORGANIZATIONAL_UNIT => &mut dn.organization_unit,
                    LOCALITY => &mut dn.locality,
                    PROVINCE => &mut dn.state,
                    STREET_ADDRESS => &mut dn.street_address,
                    POSTAL_CODE => &mut dn.postal_code,
                    _ => continue,
                };
                *slot = Some(attribute_string(attr)?);
            }
        }

        Ok(dn)
    }
}

fn attribute_string(attr: &AttributeTypeAndValue) -> Result<String, PkiError> {
    match attr.value.tag() {
        Tag::Utf8String | Tag::PrintableString | Tag::Ia5String | Tag::TeletexString => {
            std::str::from_utf8(attr.value.value())
                .map(str::to_string)
                .map_err(PkiError::parse)
        }
        other => Err(PkiError::ParseError(format!(
            "attribute {} has non-string tag {other}",
            attr.oid
        ))),
    }
}

/// Certificate validity period.
///
/// This struct represents the `notBefore` and `notAfter` fields in a certificate.
///
/// # Fields
/// * `not_before` - The start of the validity period.
/// * `not_after` - The end of the validity period.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Validity {
    /// Whether `at` lies inside the window, bounds included.
    pub fn contains(&self, at: OffsetDateTime) -> bool {
        self.not_before <= at && at <= self.not_after
    }
}

/// Last year a GeneralizedTime can carry.
const MAX_ENCODABLE_YEAR: i32 = 9999;

/// How long issued certificates live.
///
/// `backdate` moves `notBefore` into the past to tolerate clock skew between the issuer
/// and relying parties.
#[derive(Clone, Debug, Builder, PartialEq, Eq)]
pub struct ValidityPolicy {
    pub lifetime: Duration,
    #[builder(default = Duration::ZERO)]
    pub backdate: Duration,
}

impl ValidityPolicy {
    pub const CA_DEFAULT_DAYS: i64 = 3650;
    pub const LEAF_DEFAULT_DAYS: i64 = 365;

    pub fn for_days(days: i64) -> Self {
        Self {
            lifetime: Duration::days(days),
            backdate: Duration::ZERO,
        }
    }

    /// Ten years, for a root CA.
    pub fn ca_default() -> Self {
        Self::for_days(Self::CA_DEFAULT_DAYS)
    }

    /// One year, for server certificates.
    pub fn leaf_default() -> Self {
        Self::for_days(Self::LEAF_DEFAULT_DAYS)
    }

    /// The validity window of a certificate issued at `now`.
    pub fn window(&self, now: OffsetDateTime) -> Result<Validity, PkiError> {
        if !self.lifetime.is_positive() {
            return Err(PkiError::EncodingError(format!(
                "validity lifetime must be positive, got {}",
                self.lifetime
            )));
        }
        if self.backdate.is_negative() {
            return Err(PkiError::EncodingError(
                "validity backdate must not be negative".to_string(),
            ));
        }
        let not_before = now.checked_sub(self.backdate).ok_or_else(|| {
            PkiError::EncodingError(format!("backdate {} underflows the calendar", self.backdate))
        })?;
        let not_after = now
            .checked_add(self.lifetime)
            .filter(|end| end.year() <= MAX_ENCODABLE_YEAR)
            .ok_or_else(|| {
                PkiError::EncodingError(format!(
                    "lifetime {} ends after year {MAX_ENCODABLE_YEAR}",
                    self.lifetime
                ))
            })?;
        Ok(Validity {
            not_before,
            not_after,
        })
    }
}

/// Represents an X.509 extension.
///
/// This struct contains the OID, criticality, and value of an extension.
///
/// # Fields
/// * `oid` - The object identifier of the extension.
/// * `critical` - Indicates if the extension is critical.
/// * `value` - The DER-encoded value of the extension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    /// DER-encoded extension value
    pub value: Vec<u8>,
}

impl ExtensionParam {
    /// Creates an `ExtensionParam` from a specific extension.
    ///
    /// # Arguments
    /// * `extension` - The extension to encode.
    /// * `critical` - Indicates if the extension is critical.
    pub fn from_extension<E: ToAndFromX509Extension>(
        extension: &E,
        critical: bool,
    ) -> Result<Self, PkiError> {
        Ok(Self {
            oid: E::OID,
            critical,
            value: extension.to_x509_extension_value()?,
        })
    }

    /// Decodes an `ExtensionParam` into a specific extension.
    pub fn to_extension<E: ToAndFromX509Extension>(&self) -> Result<E, PkiError> {
        E::from_x509_extension_value(&self.value)
    }

    pub fn from_x509_extension(ext: &x509_cert::ext::Extension) -> Self {
        Self {
            oid: ext.extn_id,
            critical: ext.critical,
            value: ext.extn_value.as_bytes().to_vec(),
        }
    }

    pub fn to_x509_extension(&self) -> Result<x509_cert::ext::Extension, PkiError> {
        Ok(x509_cert::ext::Extension {
            extn_id: self.oid,
            critical: self.critical,
            extn_value: der::asn1::OctetString::new(self.value.clone())?,
        })
    }
}

/// Finds and decodes extension `E` in a list of raw extensions.
pub fn find_extension<E: ToAndFromX509Extension>(
    extensions: &[ExtensionParam],
) -> Result<Option<E>, PkiError> {
    extensions
        .iter()
        .find(|ext| ext.oid == E::OID)
        .map(ExtensionParam::to_extension::<E>)
        .transpose()
}
