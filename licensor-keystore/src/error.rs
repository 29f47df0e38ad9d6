//! Error types for the key store crate.

use licensor_crypto::CryptoError;
use thiserror::Error;

/// Result type for key store operations.
pub type KeyStoreResult<T> = Result<T, KeyStoreError>;

#[derive(Debug, Error)]
pub enum KeyStoreError {
    #[error("unsupported key store type: {0}")]
    UnsupportedStoreType(String),

    #[error("unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Wrong store password or a corrupted store document.
    #[error("key store integrity check failed")]
    IntegrityCheckFailed,

    /// Wrong key password or a corrupted sealed key.
    #[error("cannot recover private key: {0}")]
    UnrecoverableKey(String),

    #[error("key is incompatible with algorithm: expected {expected}, got {actual}")]
    IncompatibleKey { expected: String, actual: String },

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl KeyStoreError {
    /// Returns true if the error stems from configuration rather than the
    /// content of the store.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        match self {
            Self::UnsupportedStoreType(_)
            | Self::UnsupportedAlgorithm(_)
            | Self::UnrecoverableKey(_)
            | Self::IncompatibleKey { .. } => true,
            Self::Crypto(e) => e.is_configuration(),
            _ => false,
        }
    }
}
