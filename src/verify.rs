use time::OffsetDateTime;

use crate::cert::Certificate;
use crate::error::{PkiError, Result};

/// Checks that `leaf` was issued by `ca` and that both are valid at `at`.
///
/// # Errors
/// `CertificateError` for a name mismatch, a non-CA issuer, or an instant outside either
/// validity window; `SignatureVerificationError` when the signature does not verify under
/// the CA key.
pub fn verify_issued(leaf: &Certificate, ca: &Certificate, at: OffsetDateTime) -> Result<()> {
    if leaf.issuer() != ca.subject() {
        return Err(PkiError::CertificateError(format!(
            "issuer {} does not match CA subject {}",
            leaf.issuer(),
            ca.subject()
        )));
    }
    if !ca.is_ca()? {
        return Err(PkiError::CertificateError(
            "issuing certificate is not a CA".to_string(),
        ));
    }

    leaf.verify_signature(&ca.public_key()?)?;

    for (role, cert) in [("leaf", leaf), ("CA", ca)] {
        let validity = cert.validity();
        if !validity.contains(at) {
            return Err(PkiError::CertificateError(format!(
                "{role} certificate is not valid at {at} (valid {} to {})",
                validity.not_before, validity.not_after
            )));
        }
    }
    Ok(())
}
