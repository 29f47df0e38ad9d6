//! Password-based encryption transformations.
//!
//! # Current format
//!
//! Every write draws a fresh salt and nonce. The cipher parameters are
//! serialized in front of the ciphertext:
//!
//! ```text
//! [u16 BE length][salt 16][nonce 12][memory u32 BE][time u32 BE][parallelism u32 BE][ciphertext...]
//! ```
//!
//! # Legacy format
//!
//! The salt and key derivation parameters are fixed by the protocol, and the
//! nonce is derived from the password along with the key. There is no
//! header. Only [`CHACHA20_POLY1305`] is accepted.

use std::fmt;
use std::io::{self, Cursor, Read, Write};
use std::sync::Arc;

use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::cipher::{CHACHA20_POLY1305, CipherAlgorithm, NONCE_SIZE, random_nonce};
use crate::error::{CryptoError, CryptoResult};
use crate::key::{DerivedKey, KEY_SIZE, KdfParams, SALT_SIZE, Salt, derive_key, derive_key_material};
use crate::secret::{PasswordProtection, PasswordUsage, with_password};
use crate::transform::{Sink, Transformation, closed_error};

/// Length of the serialized cipher parameters of the current format.
pub const PARAMETERS_SIZE: usize = SALT_SIZE + NONCE_SIZE + 3 * 4;

/// Salt hard coded into the legacy format.
pub const LEGACY_SALT: [u8; 8] = [0xce, 0xfb, 0xde, 0xac, 0x05, 0x02, 0x19, 0x71];

/// Key derivation parameters hard coded into the legacy format.
///
/// With the salt fixed as well, the key and nonce depend on the password
/// alone. Every legacy key written with one password reuses the same
/// ChaCha20 keystream, so the format is only fit for reading existing keys.
pub const LEGACY_KDF: KdfParams = KdfParams {
    memory_cost: 4096,
    time_cost: 2,
    parallelism: 1,
};

/// Everything needed to build an encryption transformation.
#[derive(Clone)]
pub struct EncryptionParameters {
    /// Password-based encryption algorithm name.
    pub algorithm: String,
    /// Source of the password.
    pub protection: Arc<dyn PasswordProtection>,
    /// Key derivation parameters used when writing.
    pub kdf: KdfParams,
}

impl fmt::Debug for EncryptionParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionParameters")
            .field("algorithm", &self.algorithm)
            .field("kdf", &self.kdf)
            .finish_non_exhaustive()
    }
}

/// Creates encryption transformations from parameters.
pub trait EncryptionFactory: Send + Sync {
    fn encryption(&self, parameters: EncryptionParameters)
    -> CryptoResult<Arc<dyn Transformation>>;
}

/// Factory for [`PbeEncryption`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PbeEncryptionFactory;

impl EncryptionFactory for PbeEncryptionFactory {
    fn encryption(
        &self,
        parameters: EncryptionParameters,
    ) -> CryptoResult<Arc<dyn Transformation>> {
        Ok(Arc::new(PbeEncryption::new(parameters)?))
    }
}

/// Factory for [`LegacyPbeEncryption`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyPbeEncryptionFactory;

impl EncryptionFactory for LegacyPbeEncryptionFactory {
    fn encryption(
        &self,
        parameters: EncryptionParameters,
    ) -> CryptoResult<Arc<dyn Transformation>> {
        Ok(Arc::new(LegacyPbeEncryption::new(parameters)?))
    }
}

/// Cipher parameters drawn fresh for every write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CipherParameters {
    pub salt: Salt,
    pub nonce: [u8; NONCE_SIZE],
    pub kdf: KdfParams,
}

impl CipherParameters {
    /// Draws a random salt and nonce.
    pub fn random(kdf: KdfParams) -> Self {
        Self {
            salt: Salt::random(),
            nonce: random_nonce(),
            kdf,
        }
    }

    /// Serializes the parameters without the length prefix.
    pub fn encode(&self) -> [u8; PARAMETERS_SIZE] {
        let mut out = [0u8; PARAMETERS_SIZE];
        let (salt, rest) = out.split_at_mut(SALT_SIZE);
        salt.copy_from_slice(self.salt.as_bytes());
        let (nonce, rest) = rest.split_at_mut(NONCE_SIZE);
        nonce.copy_from_slice(&self.nonce);
        rest[0..4].copy_from_slice(&self.kdf.memory_cost.to_be_bytes());
        rest[4..8].copy_from_slice(&self.kdf.time_cost.to_be_bytes());
        rest[8..12].copy_from_slice(&self.kdf.parallelism.to_be_bytes());
        out
    }

    /// Parses parameters serialized by [`CipherParameters::encode`].
    pub fn decode(encoded: &[u8]) -> CryptoResult<Self> {
        if encoded.len() != PARAMETERS_SIZE {
            return Err(CryptoError::InvalidParameters(format!(
                "expected {PARAMETERS_SIZE} bytes, got {}",
                encoded.len()
            )));
        }
        let mut salt = [0u8; SALT_SIZE];
        salt.copy_from_slice(&encoded[..SALT_SIZE]);
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&encoded[SALT_SIZE..SALT_SIZE + NONCE_SIZE]);
        let rest = &encoded[SALT_SIZE + NONCE_SIZE..];
        let word = |i: usize| u32::from_be_bytes([rest[i], rest[i + 1], rest[i + 2], rest[i + 3]]);
        let kdf = KdfParams {
            memory_cost: word(0),
            time_cost: word(4),
            parallelism: word(8),
        };
        kdf.check_bounds()?;
        Ok(Self {
            salt: Salt::from_bytes(salt),
            nonce,
            kdf,
        })
    }
}

/// Password-based encryption with random parameters per write.
pub struct PbeEncryption {
    cipher: CipherAlgorithm,
    protection: Arc<dyn PasswordProtection>,
    kdf: KdfParams,
}

impl PbeEncryption {
    pub fn new(parameters: EncryptionParameters) -> CryptoResult<Self> {
        Ok(Self {
            cipher: CipherAlgorithm::from_name(&parameters.algorithm)?,
            protection: parameters.protection,
            kdf: parameters.kdf,
        })
    }

    fn key(&self, usage: PasswordUsage, salt: &Salt, kdf: &KdfParams) -> CryptoResult<DerivedKey> {
        with_password(self.protection.as_ref(), usage, |password| {
            derive_key(password, salt, kdf)
        })
    }
}

impl Transformation for PbeEncryption {
    fn apply<'a>(&self, sink: Box<dyn Sink + 'a>) -> CryptoResult<Box<dyn Sink + 'a>> {
        self.kdf.check_bounds()?;
        let parameters = CipherParameters::random(self.kdf);
        let key = self.key(PasswordUsage::Write, &parameters.salt, &parameters.kdf)?;
        let encoded = parameters.encode();
        let mut header = Vec::with_capacity(2 + PARAMETERS_SIZE);
        header.extend_from_slice(&(PARAMETERS_SIZE as u16).to_be_bytes());
        header.extend_from_slice(&encoded);
        debug!(algorithm = %self.cipher, "encrypting with fresh cipher parameters");
        Ok(Box::new(EncryptingSink {
            cipher: self.cipher,
            key,
            nonce: parameters.nonce,
            header,
            plaintext: Zeroizing::new(Vec::new()),
            inner: Some(sink),
        }))
    }

    fn unapply<'a>(&self, mut source: Box<dyn Read + 'a>) -> CryptoResult<Box<dyn Read + 'a>> {
        let mut prefix = [0u8; 2];
        source
            .read_exact(&mut prefix)
            .map_err(|e| CryptoError::InvalidParameters(format!("missing header: {e}")))?;
        let len = u16::from_be_bytes(prefix) as usize;
        let mut encoded = vec![0u8; len];
        source
            .read_exact(&mut encoded)
            .map_err(|e| CryptoError::InvalidParameters(format!("truncated header: {e}")))?;
        let parameters = CipherParameters::decode(&encoded)?;

        let mut ciphertext = Vec::new();
        source.read_to_end(&mut ciphertext)?;

        let key = self.key(PasswordUsage::Read, &parameters.salt, &parameters.kdf)?;
        let plaintext = self.cipher.decrypt(&key, &parameters.nonce, &ciphertext)?;
        Ok(Box::new(Cursor::new(Zeroizing::new(plaintext))))
    }
}

/// Password-based encryption with the parameters fixed by the legacy format.
///
/// Writes are deterministic per password; see [`LEGACY_KDF`].
pub struct LegacyPbeEncryption {
    protection: Arc<dyn PasswordProtection>,
}

impl LegacyPbeEncryption {
    /// Fails unless the requested algorithm is the one the legacy format fixes.
    pub fn new(parameters: EncryptionParameters) -> CryptoResult<Self> {
        if !parameters.algorithm.eq_ignore_ascii_case(CHACHA20_POLY1305) {
            return Err(CryptoError::LegacyAlgorithm {
                required: CHACHA20_POLY1305.to_string(),
                requested: parameters.algorithm,
            });
        }
        Ok(Self {
            protection: parameters.protection,
        })
    }

    fn key_and_nonce(&self, usage: PasswordUsage) -> CryptoResult<(DerivedKey, [u8; NONCE_SIZE])> {
        let mut material = Zeroizing::new([0u8; KEY_SIZE + NONCE_SIZE]);
        with_password(self.protection.as_ref(), usage, |password| {
            derive_key_material(password, &LEGACY_SALT, &LEGACY_KDF, &mut material[..])
        })?;
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(&material[..KEY_SIZE]);
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&material[KEY_SIZE..]);
        Ok((DerivedKey::from_bytes(key), nonce))
    }
}

impl Transformation for LegacyPbeEncryption {
    fn apply<'a>(&self, sink: Box<dyn Sink + 'a>) -> CryptoResult<Box<dyn Sink + 'a>> {
        let (key, nonce) = self.key_and_nonce(PasswordUsage::Write)?;
        warn!("writing legacy format, which reuses the keystream of its password");
        Ok(Box::new(EncryptingSink {
            cipher: CipherAlgorithm::ChaCha20Poly1305,
            key,
            nonce,
            header: Vec::new(),
            plaintext: Zeroizing::new(Vec::new()),
            inner: Some(sink),
        }))
    }

    fn unapply<'a>(&self, mut source: Box<dyn Read + 'a>) -> CryptoResult<Box<dyn Read + 'a>> {
        let mut ciphertext = Vec::new();
        source.read_to_end(&mut ciphertext)?;
        let (key, nonce) = self.key_and_nonce(PasswordUsage::Read)?;
        let plaintext = CipherAlgorithm::ChaCha20Poly1305.decrypt(&key, &nonce, &ciphertext)?;
        Ok(Box::new(Cursor::new(Zeroizing::new(plaintext))))
    }
}

/// Buffers plaintext and writes header plus ciphertext on close.
struct EncryptingSink<'a> {
    cipher: CipherAlgorithm,
    key: DerivedKey,
    nonce: [u8; NONCE_SIZE],
    header: Vec<u8>,
    plaintext: Zeroizing<Vec<u8>>,
    inner: Option<Box<dyn Sink + 'a>>,
}

impl Write for EncryptingSink<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.inner.is_none() {
            return Err(closed_error());
        }
        self.plaintext.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Sink for EncryptingSink<'_> {
    fn close(&mut self) -> io::Result<()> {
        let Some(mut inner) = self.inner.take() else {
            return Ok(());
        };
        let ciphertext = self
            .cipher
            .encrypt(&self.key, &self.nonce, &self.plaintext)
            .map_err(io::Error::other)?;
        inner.write_all(&self.header)?;
        inner.write_all(&ciphertext)?;
        inner.close()
    }
}
