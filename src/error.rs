//! Error type shared by every stage of the issuance pipeline.

use thiserror::Error;

/// Represents errors that can occur while generating keys, handling requests, and issuing
/// certificates.
///
/// Parse and verification failures are per-request: a service should log them and reject
/// the input. Key generation, encoding, and signing failures point at the environment or at
/// a misconfigured authority and abort the operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PkiError {
    /// Entropy or parameter failure while generating a key pair.
    #[error("Key generation error: {0}")]
    KeyGenerationError(String),

    /// A template or field could not be encoded.
    #[error("Failed to encode data: {0}")]
    EncodingError(String),

    /// Malformed binary input.
    #[error("Failed to parse data: {0}")]
    ParseError(String),

    /// A request self-signature or certificate signature did not verify.
    #[error("Signature verification failed: {0}")]
    SignatureVerificationError(String),

    /// The issuer key, issuer certificate, or template do not fit together.
    #[error("Signing error: {0}")]
    SigningError(String),

    /// PEM armor could not be decoded.
    #[error("Malformed PEM encoding: {0}")]
    MalformedEncodingError(String),

    /// Error due to invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A certificate failed a policy check during verification.
    #[error("Certificate error: {0}")]
    CertificateError(String),

    /// Missing or invalid loader configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Reading CA material from disk failed.
    #[error("I/O error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, PkiError>;

impl PkiError {
    pub(crate) fn parse(err: impl std::fmt::Display) -> Self {
        PkiError::ParseError(err.to_string())
    }

    pub(crate) fn encoding(err: impl std::fmt::Display) -> Self {
        PkiError::EncodingError(err.to_string())
    }
}

impl From<der::Error> for PkiError {
    /// Converts a `der::Error` into a `PkiError`.
    ///
    /// Decoding paths map their errors explicitly, so a bare `?` on a `der` result is an
    /// encoding failure.
    fn from(err: der::Error) -> Self {
        PkiError::EncodingError(err.to_string())
    }
}

impl From<rsa::Error> for PkiError {
    fn from(err: rsa::Error) -> Self {
        PkiError::KeyGenerationError(err.to_string())
    }
}

impl From<rsa::pkcs1::Error> for PkiError {
    fn from(err: rsa::pkcs1::Error) -> Self {
        PkiError::ParseError(err.to_string())
    }
}

impl From<pem::PemError> for PkiError {
    fn from(err: pem::PemError) -> Self {
        PkiError::MalformedEncodingError(err.to_string())
    }
}

impl From<ecdsa::Error> for PkiError {
    fn from(err: ecdsa::Error) -> Self {
        PkiError::SignatureVerificationError(err.to_string())
    }
}

impl From<std::io::Error> for PkiError {
    fn from(err: std::io::Error) -> Self {
        PkiError::Io(err.to_string())
    }
}
