//! Key derivation and management.
//!
//! Uses Argon2id for deriving encryption keys from passwords.

use crate::error::{CryptoError, CryptoResult};
use crate::secret::Password;
use argon2::{Argon2, Params, Version};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Size of encryption keys in bytes (256 bits).
pub const KEY_SIZE: usize = 32;

/// Size of salt in bytes.
pub const SALT_SIZE: usize = 16;

/// Upper bound for the memory cost accepted from untrusted parameters (256 MiB).
pub const MAX_MEMORY_COST: u32 = 256 * 1024;

/// Upper bound for the time cost accepted from untrusted parameters.
pub const MAX_TIME_COST: u32 = 8;

/// Upper bound for the parallelism accepted from untrusted parameters.
pub const MAX_PARALLELISM: u32 = 8;

/// Argon2 needs at least this many KiB of memory per lane.
pub const MIN_MEMORY_COST_PER_LANE: u32 = 8;

/// A derived encryption key with automatic zeroization on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    bytes: [u8; KEY_SIZE],
}

impl DerivedKey {
    /// Creates a new derived key from raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Returns the key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Salt for key derivation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Salt {
    bytes: [u8; SALT_SIZE],
}

impl Salt {
    /// Generates a random salt.
    pub fn random() -> Self {
        let mut bytes = [0u8; SALT_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Creates a salt from raw bytes.
    pub fn from_bytes(bytes: [u8; SALT_SIZE]) -> Self {
        Self { bytes }
    }

    /// Returns the salt bytes.
    pub fn as_bytes(&self) -> &[u8; SALT_SIZE] {
        &self.bytes
    }
}

/// Key derivation parameters.
///
/// Default values are tuned for a balance of security and performance
/// on modern hardware.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_cost: u32,
    /// Time cost (iterations).
    pub time_cost: u32,
    /// Parallelism factor.
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        // OWASP recommendations for Argon2id (2023)
        Self {
            memory_cost: 19 * 1024, // 19 MiB
            time_cost: 2,
            parallelism: 1,
        }
    }
}

impl KdfParams {
    /// Cheap parameters for tests (1 MiB, one pass).
    pub const fn fast() -> Self {
        Self {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
        }
    }

    /// Rejects parameters outside the bounds accepted from untrusted input.
    pub fn check_bounds(&self) -> CryptoResult<()> {
        if self.memory_cost > MAX_MEMORY_COST
            || self.memory_cost < MIN_MEMORY_COST_PER_LANE.saturating_mul(self.parallelism)
            || self.time_cost == 0
            || self.time_cost > MAX_TIME_COST
            || self.parallelism == 0
            || self.parallelism > MAX_PARALLELISM
        {
            return Err(CryptoError::InvalidParameters(format!(
                "key derivation parameters out of bounds: {self:?}"
            )));
        }
        Ok(())
    }
}

/// Fills `out` with key material derived from a password using Argon2id.
///
/// The UTF-8 encoding of the password is zeroized before returning.
pub fn derive_key_material(
    password: &Password,
    salt: &[u8],
    params: &KdfParams,
    out: &mut [u8],
) -> CryptoResult<()> {
    let argon2_params = Params::new(
        params.memory_cost,
        params.time_cost,
        params.parallelism,
        Some(out.len()),
    )
    .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, argon2_params);

    let input = password.utf8();
    argon2
        .hash_password_into(&input, salt, out)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))
}

/// Derives an encryption key from a password using Argon2id.
pub fn derive_key(password: &Password, salt: &Salt, params: &KdfParams) -> CryptoResult<DerivedKey> {
    let mut key_bytes = Zeroizing::new([0u8; KEY_SIZE]);
    derive_key_material(password, salt.as_bytes(), params, &mut key_bytes[..])?;
    Ok(DerivedKey::from_bytes(*key_bytes))
}
