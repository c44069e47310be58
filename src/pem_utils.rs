//! PEM armoring for certificates, requests, and private keys.
//!
//! The codec is a byte-exact wrapper: it checks the block label but never looks at the DER
//! inside. Semantic validation is the caller's job.

use std::fmt;
use std::str::FromStr;

use crate::error::{PkiError, Result};

/// The block labels this crate reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PemKind {
    Certificate,
    CertificateRequest,
    RsaPrivateKey,
    EcPrivateKey,
}

impl PemKind {
    pub const ALL: [PemKind; 4] = [
        PemKind::Certificate,
        PemKind::CertificateRequest,
        PemKind::RsaPrivateKey,
        PemKind::EcPrivateKey,
    ];

    /// The label written between the `-----BEGIN ` and `-----` markers.
    pub fn label(&self) -> &'static str {
        match self {
            PemKind::Certificate => "CERTIFICATE",
            PemKind::CertificateRequest => "CERTIFICATE REQUEST",
            PemKind::RsaPrivateKey => "RSA PRIVATE KEY",
            PemKind::EcPrivateKey => "EC PRIVATE KEY",
        }
    }

    pub fn is_private_key(&self) -> bool {
        matches!(self, PemKind::RsaPrivateKey | PemKind::EcPrivateKey)
    }
}

impl fmt::Display for PemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PemKind {
    type Err = PkiError;

    fn from_str(label: &str) -> Result<Self> {
        PemKind::ALL
            .into_iter()
            .find(|kind| kind.label() == label)
            .ok_or_else(|| {
                PkiError::MalformedEncodingError(format!("unsupported PEM label '{label}'"))
            })
    }
}

/// Convert DER‑encoded data into a PEM‑encoded string of the given kind.
///
/// Lines are 64 columns wide and end with LF.
pub fn encode(kind: PemKind, der: &[u8]) -> String {
    let block = pem::Pem::new(kind.label(), der);
    pem::encode_config(
        &block,
        pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF),
    )
}

/// Convert the first PEM block of `armored` into its kind and DER bytes.
pub fn decode(armored: &str) -> Result<(PemKind, Vec<u8>)> {
    let block = pem::parse(armored)?;
    into_parts(block)
}

/// Decode the first block and require it to be of `expected` kind.
pub fn decode_expecting(armored: &str, expected: PemKind) -> Result<Vec<u8>> {
    let (kind, der) = decode(armored)?;
    if kind != expected {
        return Err(PkiError::MalformedEncodingError(format!(
            "expected a {expected} block, found {kind}"
        )));
    }
    Ok(der)
}

/// Decode every block of a bundle, such as a certificate followed by its key.
pub fn decode_all(armored: &str) -> Result<Vec<(PemKind, Vec<u8>)>> {
    let blocks = pem::parse_many(armored)?;
    if blocks.is_empty() {
        return Err(PkiError::MalformedEncodingError(
            "no PEM block found".to_string(),
        ));
    }
    blocks.into_iter().map(into_parts).collect()
}

fn into_parts(block: pem::Pem) -> Result<(PemKind, Vec<u8>)> {
    let kind = block.tag().parse::<PemKind>()?;
    Ok((kind, block.into_contents()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_kind() {
        let der = (0u8..=200).collect::<Vec<_>>();
        for kind in PemKind::ALL {
            let armored = encode(kind, &der);
            assert!(armored.starts_with(&format!("-----BEGIN {}-----\n", kind.label())));
            assert_eq!(decode(&armored).unwrap(), (kind, der.clone()));
        }
    }

    #[test]
    fn wraps_body_at_64_columns() {
        let armored = encode(PemKind::Certificate, &[0xAB; 120]);
        assert!(armored.lines().all(|line| line.len() <= 64));
    }

    #[test]
    fn rejects_unknown_label() {
        let armored = pem::encode(&pem::Pem::new("PUBLIC KEY", vec![1, 2, 3]));
        assert!(matches!(
            decode(&armored),
            Err(PkiError::MalformedEncodingError(_))
        ));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            decode("not a pem block"),
            Err(PkiError::MalformedEncodingError(_))
        ));
    }

    #[test]
    fn decode_expecting_checks_kind() {
        let armored = encode(PemKind::CertificateRequest, &[1, 2, 3]);
        assert!(decode_expecting(&armored, PemKind::CertificateRequest).is_ok());
        assert!(decode_expecting(&armored, PemKind::Certificate).is_err());
    }

    #[test]
    fn decodes_bundle_in_order() {
        let bundle = format!(
            "{}{}",
            encode(PemKind::Certificate, &[1]),
            encode(PemKind::EcPrivateKey, &[2])
        );
        let blocks = decode_all(&bundle).unwrap();
        assert_eq!(
            blocks,
            vec![
                (PemKind::Certificate, vec![1]),
                (PemKind::EcPrivateKey, vec![2])
            ]
        );
        assert!(decode_all("").is_err());
    }
}
