//! Error types for the licensing crate.

use std::fmt;
use std::sync::Arc;

use licensor_crypto::CryptoError;
use licensor_keystore::KeyStoreError;
use thiserror::Error;

use crate::messages;
use crate::policy::ValidationError;

/// Coarse classification of every failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The signature does not match the artifact: tampering or corruption.
    Integrity,
    /// Misconfiguration: algorithms, aliases, key entries, formats.
    Configuration,
    /// Weak password, failed license validation or refused authorization.
    Policy,
    /// No license key is installed.
    NotFound,
    /// Store or key store I/O, or malformed content.
    Io,
}

/// Licensing-specific errors.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// Signature verification failed for the repository record.
    #[error("license key signature does not match its content")]
    RepositoryIntegrity,

    /// The engine's algorithm differs from the one recorded in the repository.
    #[error("signature algorithm mismatch: repository uses {actual}, engine uses {expected}")]
    AlgorithmMismatch { expected: String, actual: String },

    #[error("no private key entry for alias {0}")]
    NoPrivateKey(String),

    #[error("no certificate for alias {0}")]
    NoCertificate(String),

    #[error("no key store entry for alias {0}")]
    NoSuchEntry(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("license validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("no license key installed")]
    NotInstalled,

    #[error("operation not authorized: {0}")]
    Unauthorized(String),

    /// The artifact cannot be represented in the negotiated charset.
    #[error("charset error: {0}")]
    Charset(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("key store error: {0}")]
    KeyStore(#[from] KeyStoreError),
}

impl LicenseError {
    /// Classifies the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RepositoryIntegrity => ErrorKind::Integrity,
            Self::AlgorithmMismatch { .. }
            | Self::NoPrivateKey(_)
            | Self::NoCertificate(_)
            | Self::NoSuchEntry(_)
            | Self::Configuration(_) => ErrorKind::Configuration,
            Self::Validation(_) | Self::Unauthorized(_) => ErrorKind::Policy,
            Self::NotInstalled => ErrorKind::NotFound,
            Self::Charset(_) | Self::Io(_) | Self::Serialization(_) => ErrorKind::Io,
            Self::Crypto(CryptoError::WeakPassword(_)) => ErrorKind::Policy,
            Self::Crypto(e) if e.is_configuration() => ErrorKind::Configuration,
            Self::Crypto(_) => ErrorKind::Io,
            Self::KeyStore(KeyStoreError::Crypto(CryptoError::WeakPassword(_))) => {
                ErrorKind::Policy
            }
            Self::KeyStore(e) if e.is_configuration() => ErrorKind::Configuration,
            Self::KeyStore(_) => ErrorKind::Io,
        }
    }
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;

/// The single error type returned by license managers.
///
/// Displays an end-user message and keeps the underlying [`LicenseError`] as
/// its source.
#[derive(Debug, Clone)]
pub struct LicenseManagementError {
    kind: ErrorKind,
    message: String,
    cause: Arc<LicenseError>,
}

impl LicenseManagementError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the end-user message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn cause(&self) -> &LicenseError {
        &self.cause
    }
}

impl From<Arc<LicenseError>> for LicenseManagementError {
    fn from(cause: Arc<LicenseError>) -> Self {
        Self {
            kind: cause.kind(),
            message: messages::user_message(&cause),
            cause,
        }
    }
}

impl From<LicenseError> for LicenseManagementError {
    fn from(cause: LicenseError) -> Self {
        Arc::new(cause).into()
    }
}

impl fmt::Display for LicenseManagementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for LicenseManagementError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.cause.as_ref())
    }
}

/// Result type for license manager operations.
pub type ManagementResult<T> = Result<T, LicenseManagementError>;
