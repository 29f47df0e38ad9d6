//! Signature algorithms, keys and engines.
//!
//! Two algorithms are supported: Ed25519 (the default) and ECDSA over
//! secp256k1 with SHA-256. Keys carry their algorithm so that an engine can
//! refuse a key of the wrong kind.

use std::fmt;

use ed25519_dalek::{Signer as _, Verifier as _};
use k256::ecdsa::signature::{Signer as _, Verifier as _};
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::error::{KeyStoreError, KeyStoreResult};

/// Name of the Ed25519 signature algorithm.
pub const ED25519: &str = "Ed25519";

/// Name of the ECDSA secp256k1 signature algorithm.
pub const SHA256_WITH_ECDSA: &str = "SHA256withECDSA";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    #[default]
    Ed25519,
    EcdsaSecp256k1,
}

impl SignatureAlgorithm {
    /// Looks up an algorithm by name, ignoring case.
    pub fn from_name(name: &str) -> KeyStoreResult<Self> {
        if name.eq_ignore_ascii_case(ED25519) {
            Ok(Self::Ed25519)
        } else if name.eq_ignore_ascii_case(SHA256_WITH_ECDSA) {
            Ok(Self::EcdsaSecp256k1)
        } else {
            Err(KeyStoreError::UnsupportedAlgorithm(name.to_string()))
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ed25519 => ED25519,
            Self::EcdsaSecp256k1 => SHA256_WITH_ECDSA,
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A secret signing key.
pub enum PrivateKey {
    Ed25519(ed25519_dalek::SigningKey),
    EcdsaSecp256k1(k256::ecdsa::SigningKey),
}

impl PrivateKey {
    /// Generates a random key for the algorithm.
    pub fn generate(algorithm: SignatureAlgorithm) -> Self {
        match algorithm {
            SignatureAlgorithm::Ed25519 => {
                Self::Ed25519(ed25519_dalek::SigningKey::generate(&mut OsRng))
            }
            SignatureAlgorithm::EcdsaSecp256k1 => {
                Self::EcdsaSecp256k1(k256::ecdsa::SigningKey::random(&mut OsRng))
            }
        }
    }

    /// Restores a key from its raw 32-byte secret.
    pub fn from_bytes(algorithm: SignatureAlgorithm, bytes: &[u8]) -> KeyStoreResult<Self> {
        match algorithm {
            SignatureAlgorithm::Ed25519 => {
                let secret: [u8; 32] = bytes.try_into().map_err(|_| {
                    KeyStoreError::InvalidKey(format!("expected 32 bytes, got {}", bytes.len()))
                })?;
                Ok(Self::Ed25519(ed25519_dalek::SigningKey::from_bytes(&secret)))
            }
            SignatureAlgorithm::EcdsaSecp256k1 => k256::ecdsa::SigningKey::from_slice(bytes)
                .map(Self::EcdsaSecp256k1)
                .map_err(|e| KeyStoreError::InvalidKey(e.to_string())),
        }
    }

    /// Returns the raw secret in a buffer which is zeroized on drop.
    pub fn to_bytes(&self) -> Zeroizing<Vec<u8>> {
        match self {
            Self::Ed25519(key) => Zeroizing::new(key.to_bytes().to_vec()),
            Self::EcdsaSecp256k1(key) => Zeroizing::new(key.to_bytes().to_vec()),
        }
    }

    #[must_use]
    pub fn algorithm(&self) -> SignatureAlgorithm {
        match self {
            Self::Ed25519(_) => SignatureAlgorithm::Ed25519,
            Self::EcdsaSecp256k1(_) => SignatureAlgorithm::EcdsaSecp256k1,
        }
    }

    /// Returns the matching public key.
    pub fn public_key(&self) -> PublicKey {
        match self {
            Self::Ed25519(key) => PublicKey::Ed25519(key.verifying_key()),
            Self::EcdsaSecp256k1(key) => PublicKey::EcdsaSecp256k1(*key.verifying_key()),
        }
    }

    fn sign(&self, message: &[u8]) -> Vec<u8> {
        match self {
            Self::Ed25519(key) => key.sign(message).to_bytes().to_vec(),
            Self::EcdsaSecp256k1(key) => {
                let signature: k256::ecdsa::Signature = key.sign(message);
                signature.to_bytes().to_vec()
            }
        }
    }
}

impl Clone for PrivateKey {
    fn clone(&self) -> Self {
        match self {
            Self::Ed25519(key) => Self::Ed25519(key.clone()),
            Self::EcdsaSecp256k1(key) => Self::EcdsaSecp256k1(key.clone()),
        }
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("algorithm", &self.algorithm())
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// A public verification key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PublicKey {
    Ed25519(ed25519_dalek::VerifyingKey),
    EcdsaSecp256k1(k256::ecdsa::VerifyingKey),
}

impl PublicKey {
    /// Restores a key from its encoded form (raw Ed25519 or compressed SEC1).
    pub fn from_bytes(algorithm: SignatureAlgorithm, bytes: &[u8]) -> KeyStoreResult<Self> {
        match algorithm {
            SignatureAlgorithm::Ed25519 => {
                let raw: [u8; 32] = bytes.try_into().map_err(|_| {
                    KeyStoreError::InvalidKey(format!("expected 32 bytes, got {}", bytes.len()))
                })?;
                ed25519_dalek::VerifyingKey::from_bytes(&raw)
                    .map(Self::Ed25519)
                    .map_err(|e| KeyStoreError::InvalidKey(e.to_string()))
            }
            SignatureAlgorithm::EcdsaSecp256k1 => {
                k256::ecdsa::VerifyingKey::from_sec1_bytes(bytes)
                    .map(Self::EcdsaSecp256k1)
                    .map_err(|e| KeyStoreError::InvalidKey(e.to_string()))
            }
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Ed25519(key) => key.to_bytes().to_vec(),
            Self::EcdsaSecp256k1(key) => key.to_encoded_point(true).as_bytes().to_vec(),
        }
    }

    #[must_use]
    pub fn algorithm(&self) -> SignatureAlgorithm {
        match self {
            Self::Ed25519(_) => SignatureAlgorithm::Ed25519,
            Self::EcdsaSecp256k1(_) => SignatureAlgorithm::EcdsaSecp256k1,
        }
    }

    /// Returns true if `signature` is valid for `message`. Malformed
    /// signatures are simply invalid.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        match self {
            Self::Ed25519(key) => ed25519_dalek::Signature::from_slice(signature)
                .map(|sig| key.verify(message, &sig).is_ok())
                .unwrap_or(false),
            Self::EcdsaSecp256k1(key) => k256::ecdsa::Signature::from_slice(signature)
                .map(|sig| key.verify(message, &sig).is_ok())
                .unwrap_or(false),
        }
    }
}

/// A keypair for signing and verification.
#[derive(Clone, Debug)]
pub struct KeyPair {
    pub private_key: PrivateKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generates a new random keypair.
    pub fn generate(algorithm: SignatureAlgorithm) -> Self {
        let private_key = PrivateKey::generate(algorithm);
        let public_key = private_key.public_key();
        Self {
            private_key,
            public_key,
        }
    }
}

fn check_algorithm(expected: SignatureAlgorithm, actual: SignatureAlgorithm) -> KeyStoreResult<()> {
    if expected != actual {
        return Err(KeyStoreError::IncompatibleKey {
            expected: expected.name().to_string(),
            actual: actual.name().to_string(),
        });
    }
    Ok(())
}

/// A signature engine initialized for signing.
#[derive(Debug)]
pub struct SigningEngine {
    algorithm: SignatureAlgorithm,
    key: PrivateKey,
}

impl SigningEngine {
    /// Fails if the key does not belong to the algorithm.
    pub fn new(algorithm: SignatureAlgorithm, key: PrivateKey) -> KeyStoreResult<Self> {
        check_algorithm(algorithm, key.algorithm())?;
        Ok(Self { algorithm, key })
    }

    #[must_use]
    pub fn algorithm(&self) -> &'static str {
        self.algorithm.name()
    }

    pub fn sign(&self, data: &[u8]) -> Vec<u8> {
        self.key.sign(data)
    }
}

/// A signature engine initialized for verification.
#[derive(Debug, Clone)]
pub struct VerifyingEngine {
    algorithm: SignatureAlgorithm,
    key: PublicKey,
}

impl VerifyingEngine {
    /// Fails if the key does not belong to the algorithm.
    pub fn new(algorithm: SignatureAlgorithm, key: PublicKey) -> KeyStoreResult<Self> {
        check_algorithm(algorithm, key.algorithm())?;
        Ok(Self { algorithm, key })
    }

    #[must_use]
    pub fn algorithm(&self) -> &'static str {
        self.algorithm.name()
    }

    pub fn verify(&self, data: &[u8], signature: &[u8]) -> bool {
        self.key.verify(data, signature)
    }
}
