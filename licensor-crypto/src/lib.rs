//! Secrets, password-based encryption and stream transformations.
//!
//! - [`Password`] buffers are erased after use and handed out by a
//!   [`PasswordProtection`] for a specific [`PasswordUsage`]
//! - [`PasswordPolicy`] rejects weak passwords before new material is
//!   written
//! - [`Transformation`] decorates byte sinks and sources; compression and
//!   encryption both implement it and nest via [`Composite`]
//!
//! # Encryption Formats
//!
//! [`PbeEncryption`] draws a fresh salt and nonce for every write and stores
//! them in a length-prefixed header. [`LegacyPbeEncryption`] derives both key
//! and nonce from the password with fixed parameters.

mod cipher;
mod compression;
mod encryption;
mod error;
mod key;
mod policy;
mod secret;
mod transform;

pub use cipher::{
    AES_256_GCM, CHACHA20_POLY1305, CipherAlgorithm, NONCE_SIZE, TAG_SIZE, random_nonce,
};
pub use compression::{DeflateCompression, GzipCompression};
pub use encryption::{
    CipherParameters, EncryptionFactory, EncryptionParameters, LEGACY_KDF, LEGACY_SALT,
    LegacyPbeEncryption, LegacyPbeEncryptionFactory, PARAMETERS_SIZE, PbeEncryption,
    PbeEncryptionFactory,
};
pub use error::{CryptoError, CryptoResult};
pub use key::{
    DerivedKey, KEY_SIZE, KdfParams, MAX_MEMORY_COST, MAX_PARALLELISM, MAX_TIME_COST,
    MIN_MEMORY_COST_PER_LANE, SALT_SIZE, Salt, derive_key, derive_key_material,
};
pub use policy::{MIN_PASSWORD_LENGTH, MinimumPasswordPolicy, PasswordPolicy, PermissivePasswordPolicy};
pub use secret::{
    CheckedPasswordProtection, Password, PasswordProtection, PasswordUsage,
    StaticPasswordProtection, with_password,
};
pub use transform::{Composite, Identity, Sink, Transformation, transform, untransform};
