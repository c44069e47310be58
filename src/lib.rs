//! # certsign - A Pure Rust Private Certificate Authority
//!
//! certsign runs the issuance pipeline of a small private CA with rustcrypto libraries only:
//! it generates keys, builds and validates PKCS#10 certificate signing requests, and signs
//! X.509 v3 server certificates with a self-signed CA.
//!
//! ## Supported Key Types
//!
//! - **RSA**: 2048 bits and up, signing with SHA-256 and PKCS#1 v1.5
//! - **ECDSA**: P-256 (SHA-256) and P-384 (SHA-384)
//!
//! ## Pipeline
//!
//! 1. [`key::KeyPair::generate`] creates a key pair.
//! 2. [`csr::build_request`] turns a key and an [`cert::params::Identity`] into a signed
//!    DER request.
//! 3. [`csr::parse_and_verify`] checks the request's proof of possession and yields a
//!    [`csr::VerifiedRequest`].
//! 4. [`template::CertificateTemplate`] fixes subject, serial number, validity and usages.
//! 5. [`issuer::sign`] checks the CA and signs the template.
//! 6. [`pem_utils`] armors the results.
//!
//! [`authority::CertificateAuthority`] strings these together.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use certsign::{
//!     authority::{AuthorityPolicy, CertificateAuthority},
//!     cert::params::{DistinguishedName, Identity},
//!     csr,
//!     key::{KeyAlgorithm, KeyPair},
//! };
//!
//! # fn main() -> Result<(), certsign::error::PkiError> {
//! let ca = CertificateAuthority::generate(
//!     &Identity::from_common_name("SELF-CA"),
//!     KeyAlgorithm::EcdsaP256,
//!     AuthorityPolicy::default(),
//! )?;
//!
//! let service = Identity::builder()
//!     .subject(
//!         DistinguishedName::builder()
//!             .common_name("svc.example.com".to_string())
//!             .organization("Example Corp".to_string())
//!             .build(),
//!     )
//!     .dns_names(vec!["svc.example.com".to_string()])
//!     .build();
//!
//! let key = KeyPair::generate_ecdsa_p256();
//! let request = csr::build_request(&key, &service)?;
//! let issued = ca.issue_from_csr(&request)?;
//!
//! println!("{}", issued.certificate_pem);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`error::PkiError`]:
//!
//! ```rust
//! use certsign::{csr, error::PkiError};
//!
//! match csr::parse_and_verify(b"not a request") {
//!     Ok(_) => unreachable!(),
//!     Err(PkiError::ParseError(msg)) => println!("Malformed request: {}", msg),
//!     Err(e) => println!("Other error: {}", e),
//! }
//! ```
//!
//! ## Logging
//!
//! Issuance is reported through `tracing`; install a subscriber to see it.
//!
//! ## Module Organization
//!
//! - [`key`]: Key generation, import/export, and signing
//! - [`csr`]: Building and validating certificate signing requests
//! - [`template`]: Certificate templates and serial number allocation
//! - [`issuer`]: Signing templates with a CA
//! - [`cert`]: The certificate model and X.509 extensions
//! - [`verify`]: Checking that a certificate was issued by a CA
//! - [`authority`]: A ready-to-use private CA
//! - [`loader`]: Loading CA material from disk
//! - [`pem_utils`]: PEM armor
//! - [`error`]: The error type
//! - [`tbs_certificate`]: Low-level certificate structure manipulation

pub mod authority;
pub mod cert;
pub mod csr;
pub mod error;
pub mod issuer;
pub mod key;
pub mod loader;
pub mod pem_utils;
pub mod tbs_certificate;
pub mod template;
pub mod verify;
