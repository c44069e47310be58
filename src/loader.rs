//! Loading CA material from disk.
//!
//! This is the only place the crate touches the environment or the filesystem.

use std::ffi::OsString;
use std::path::PathBuf;

use bon::Builder;
use tracing::{debug, warn};

use crate::authority::{AuthorityPolicy, CertificateAuthority};
use crate::error::{PkiError, Result};

/// Variable naming the CA certificate PEM file.
pub const CA_CERT_ENV: &str = "CA_CERT";
/// Variable naming the CA private key PEM file.
pub const CA_KEY_ENV: &str = "CA_KEY";

/// Locations of a CA certificate and its private key.
#[derive(Clone, Debug, Builder, PartialEq, Eq)]
pub struct CaPaths {
    #[builder(into)]
    pub cert: PathBuf,
    #[builder(into)]
    pub key: PathBuf,
}

impl CaPaths {
    /// Reads the paths from `CA_CERT` and `CA_KEY`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var_os(name))
    }

    /// Reads the paths through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<OsString>) -> Result<Self> {
        let var = |name: &str| {
            lookup(name)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
                .ok_or_else(|| PkiError::ConfigError(format!("{name} is not set")))
        };
        Ok(Self {
            cert: var(CA_CERT_ENV)?,
            key: var(CA_KEY_ENV)?,
        })
    }

    /// Reads both files, returning the certificate PEM and the key PEM.
    pub fn read(&self) -> Result<(String, String)> {
        let read = |path: &PathBuf| -> Result<String> {
            let pem = std::fs::read_to_string(path).inspect_err(
                |error| warn!(path = %path.display(), %error, "failed to read CA material"),
            )?;
            Ok(pem)
        };
        Ok((read(&self.cert)?, read(&self.key)?))
    }

    /// Loads the CA these paths point at.
    pub fn load(&self, policy: AuthorityPolicy) -> Result<CertificateAuthority> {
        debug!(cert = %self.cert.display(), key = %self.key.display(), "loading certificate authority");
        let (cert_pem, key_pem) = self.read()?;
        CertificateAuthority::from_pem(&cert_pem, &key_pem, policy)
    }
}
