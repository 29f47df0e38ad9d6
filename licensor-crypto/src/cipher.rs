//! Authenticated encryption with a choice of AEAD cipher.
//!
//! Both ciphers take a 256-bit key and a 96-bit nonce and append a
//! 128-bit authentication tag to the ciphertext.

use std::fmt;

use crate::error::{CryptoError, CryptoResult};
use crate::key::DerivedKey;
use aes_gcm::Aes256Gcm;
use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit},
};
use rand::RngCore;

/// Size of nonce in bytes (96 bits).
pub const NONCE_SIZE: usize = 12;

/// Size of authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Password-based encryption algorithm name for Argon2id + ChaCha20-Poly1305.
pub const CHACHA20_POLY1305: &str = "PBEWithArgon2idAndChaCha20Poly1305";

/// Password-based encryption algorithm name for Argon2id + AES-256-GCM.
pub const AES_256_GCM: &str = "PBEWithArgon2idAndAES256GCM";

/// The AEAD cipher behind a password-based encryption algorithm name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CipherAlgorithm {
    ChaCha20Poly1305,
    Aes256Gcm,
}

impl CipherAlgorithm {
    /// Looks up an algorithm by name, ignoring case.
    pub fn from_name(name: &str) -> CryptoResult<Self> {
        if name.eq_ignore_ascii_case(CHACHA20_POLY1305) {
            Ok(Self::ChaCha20Poly1305)
        } else if name.eq_ignore_ascii_case(AES_256_GCM) {
            Ok(Self::Aes256Gcm)
        } else {
            Err(CryptoError::UnsupportedAlgorithm(name.to_string()))
        }
    }

    /// Returns the canonical algorithm name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ChaCha20Poly1305 => CHACHA20_POLY1305,
            Self::Aes256Gcm => AES_256_GCM,
        }
    }

    /// Encrypts plaintext with the given key and nonce.
    pub fn encrypt(
        &self,
        key: &DerivedKey,
        nonce: &[u8; NONCE_SIZE],
        plaintext: &[u8],
    ) -> CryptoResult<Vec<u8>> {
        let nonce = Nonce::from_slice(nonce);
        let result = match self {
            Self::ChaCha20Poly1305 => {
                ChaCha20Poly1305::new(key.as_bytes().into()).encrypt(nonce, plaintext)
            }
            Self::Aes256Gcm => Aes256Gcm::new(key.as_bytes().into()).encrypt(nonce, plaintext),
        };
        result.map_err(|e| CryptoError::Encryption(e.to_string()))
    }

    /// Decrypts ciphertext with the given key and nonce.
    pub fn decrypt(
        &self,
        key: &DerivedKey,
        nonce: &[u8; NONCE_SIZE],
        ciphertext: &[u8],
    ) -> CryptoResult<Vec<u8>> {
        if ciphertext.len() < TAG_SIZE {
            return Err(CryptoError::Decryption("data too short".to_string()));
        }
        let nonce = Nonce::from_slice(nonce);
        let result = match self {
            Self::ChaCha20Poly1305 => {
                ChaCha20Poly1305::new(key.as_bytes().into()).decrypt(nonce, ciphertext)
            }
            Self::Aes256Gcm => Aes256Gcm::new(key.as_bytes().into()).decrypt(nonce, ciphertext),
        };
        result.map_err(|_| {
            CryptoError::Decryption("decryption failed (wrong key or tampered data)".to_string())
        })
    }
}

impl fmt::Display for CipherAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Generates a random nonce.
pub fn random_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    nonce
}
