//! Error types for the crypto layer.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur in cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key derivation failed.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Encryption failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Decryption failed (wrong password or tampered data).
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Invalid key length.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// The cipher parameter header in front of the ciphertext is malformed.
    #[error("invalid cipher parameters: {0}")]
    InvalidParameters(String),

    /// The algorithm name is not known to this build.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The legacy format only supports a single, fixed algorithm.
    #[error("legacy format license keys require the {required} algorithm, not {requested}")]
    LegacyAlgorithm { required: String, requested: String },

    /// The password was rejected by the password policy.
    #[error("weak password: {0}")]
    WeakPassword(String),

    /// Stream I/O failure inside a transformation.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CryptoError {
    /// Returns true if the error stems from configuration rather than data.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedAlgorithm(_) | Self::LegacyAlgorithm { .. }
        )
    }
}
