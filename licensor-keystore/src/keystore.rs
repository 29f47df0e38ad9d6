//! Password-protected key store.
//!
//! The store is a JSON document mapping aliases to entries. Private keys are
//! sealed with a key derived from their own password; the document as a whole
//! is authenticated with HMAC-SHA256 keyed from the store password.
//!
//! ```text
//! { "type": "LKS", "entries": { "<alias>": { "kind": "private_key", ... } }, "mac": "<base64>" }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use licensor_crypto::{
    CipherAlgorithm, KdfParams, NONCE_SIZE, Password, SALT_SIZE, Salt, derive_key, random_nonce,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;
use zeroize::Zeroizing;

use crate::certificate::Certificate;
use crate::error::{KeyStoreError, KeyStoreResult};
use crate::signing::{PrivateKey, SignatureAlgorithm};

/// Type name of the key store format.
pub const STORE_TYPE: &str = "LKS";

const MAC_CONTEXT: &[u8] = b"licensor-keystore";

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct SealedKey {
    algorithm: String,
    salt: String,
    nonce: String,
    memory_cost: u32,
    time_cost: u32,
    parallelism: u32,
    ciphertext: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum StoredEntry {
    PrivateKey {
        key: SealedKey,
        certificate: Certificate,
    },
    TrustedCertificate {
        certificate: Certificate,
    },
}

impl StoredEntry {
    fn certificate(&self) -> &Certificate {
        match self {
            Self::PrivateKey { certificate, .. } | Self::TrustedCertificate { certificate } => {
                certificate
            }
        }
    }
}

#[derive(Serialize, Deserialize)]
struct StoreDocument {
    #[serde(rename = "type")]
    store_type: String,
    entries: BTreeMap<String, StoredEntry>,
    mac: String,
}

/// A resolved key store entry.
#[derive(Debug)]
pub enum Entry {
    PrivateKey {
        key: PrivateKey,
        certificate: Certificate,
    },
    TrustedCertificate(Certificate),
}

impl Entry {
    /// Returns the certificate of either kind of entry.
    pub fn certificate(&self) -> &Certificate {
        match self {
            Self::PrivateKey { certificate, .. } | Self::TrustedCertificate(certificate) => {
                certificate
            }
        }
    }
}

/// An in-memory key store which can be loaded from and saved to bytes.
pub struct KeyStore {
    entries: BTreeMap<String, StoredEntry>,
    kdf: KdfParams,
}

impl KeyStore {
    /// Creates a store without entries.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
            kdf: KdfParams::default(),
        }
    }

    /// Sets the key derivation parameters used when sealing new keys.
    #[must_use]
    pub fn with_kdf(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    /// Loads a store of the given type. `None` yields an empty store.
    pub fn load(store_type: &str, bytes: Option<&[u8]>, password: &Password) -> KeyStoreResult<Self> {
        if !store_type.eq_ignore_ascii_case(STORE_TYPE) {
            return Err(KeyStoreError::UnsupportedStoreType(store_type.to_string()));
        }
        let Some(bytes) = bytes else {
            return Ok(Self::empty());
        };
        let document: StoreDocument =
            serde_json::from_slice(bytes).map_err(|_| KeyStoreError::IntegrityCheckFailed)?;
        if !document.store_type.eq_ignore_ascii_case(STORE_TYPE) {
            return Err(KeyStoreError::UnsupportedStoreType(document.store_type));
        }
        let expected = STANDARD
            .decode(&document.mac)
            .map_err(|_| KeyStoreError::IntegrityCheckFailed)?;
        mac(&document.entries, password)?
            .verify_slice(&expected)
            .map_err(|_| KeyStoreError::IntegrityCheckFailed)?;
        debug!(entries = document.entries.len(), "Loaded key store");
        Ok(Self {
            entries: document.entries,
            kdf: KdfParams::default(),
        })
    }

    /// Serializes the store, authenticated with the store password.
    pub fn to_bytes(&self, password: &Password) -> KeyStoreResult<Vec<u8>> {
        let tag = mac(&self.entries, password)?.finalize().into_bytes();
        let document = StoreDocument {
            store_type: STORE_TYPE.to_string(),
            entries: self.entries.clone(),
            mac: STANDARD.encode(tag),
        };
        Ok(serde_json::to_vec_pretty(&document)?)
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn contains_alias(&self, alias: &str) -> bool {
        self.entries.contains_key(alias)
    }

    /// Returns true if the alias names a private key entry.
    pub fn is_key_entry(&self, alias: &str) -> bool {
        matches!(self.entries.get(alias), Some(StoredEntry::PrivateKey { .. }))
    }

    /// Returns true if the alias names a trusted certificate entry.
    pub fn is_certificate_entry(&self, alias: &str) -> bool {
        matches!(
            self.entries.get(alias),
            Some(StoredEntry::TrustedCertificate { .. })
        )
    }

    /// Returns the certificate of the entry, whatever its kind.
    pub fn certificate(&self, alias: &str) -> Option<&Certificate> {
        self.entries.get(alias).map(StoredEntry::certificate)
    }

    /// Resolves an entry. Private key entries need the key password.
    pub fn entry(&self, alias: &str, key_password: Option<&Password>) -> KeyStoreResult<Option<Entry>> {
        match self.entries.get(alias) {
            None => Ok(None),
            Some(StoredEntry::TrustedCertificate { certificate }) => {
                Ok(Some(Entry::TrustedCertificate(certificate.clone())))
            }
            Some(StoredEntry::PrivateKey { key, certificate }) => {
                let password = key_password.ok_or_else(|| {
                    KeyStoreError::UnrecoverableKey(format!("no password for alias {alias}"))
                })?;
                Ok(Some(Entry::PrivateKey {
                    key: unseal(key, password)?,
                    certificate: certificate.clone(),
                }))
            }
        }
    }

    /// Adds or replaces a private key entry.
    pub fn set_key_entry(
        &mut self,
        alias: &str,
        key: &PrivateKey,
        certificate: Certificate,
        key_password: &Password,
    ) -> KeyStoreResult<()> {
        if certificate.public_key()? != key.public_key() {
            return Err(KeyStoreError::InvalidCertificate(format!(
                "certificate of {} does not match the private key",
                certificate.subject
            )));
        }
        let sealed = seal(key, key_password, &self.kdf)?;
        self.entries.insert(
            alias.to_string(),
            StoredEntry::PrivateKey {
                key: sealed,
                certificate,
            },
        );
        Ok(())
    }

    /// Adds or replaces a trusted certificate entry.
    pub fn set_certificate_entry(&mut self, alias: &str, certificate: Certificate) -> KeyStoreResult<()> {
        certificate.verify()?;
        self.entries.insert(
            alias.to_string(),
            StoredEntry::TrustedCertificate { certificate },
        );
        Ok(())
    }

    /// Removes an entry, returning true if it existed.
    pub fn delete_entry(&mut self, alias: &str) -> bool {
        self.entries.remove(alias).is_some()
    }
}

impl Default for KeyStore {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyStore")
            .field("aliases", &self.entries.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

fn mac(entries: &BTreeMap<String, StoredEntry>, password: &Password) -> KeyStoreResult<HmacSha256> {
    let mut key = Zeroizing::new([0u8; 32]);
    let digest = Sha256::new()
        .chain_update(MAC_CONTEXT)
        .chain_update(password.utf8().as_slice())
        .finalize();
    key.copy_from_slice(&digest);
    let mut mac = HmacSha256::new_from_slice(&key[..])
        .map_err(|_| KeyStoreError::IntegrityCheckFailed)?;
    mac.update(&serde_json::to_vec(entries)?);
    Ok(mac)
}

fn seal(key: &PrivateKey, password: &Password, kdf: &KdfParams) -> KeyStoreResult<SealedKey> {
    let salt = Salt::random();
    let nonce = random_nonce();
    let derived = derive_key(password, &salt, kdf)?;
    let ciphertext = CipherAlgorithm::ChaCha20Poly1305.encrypt(&derived, &nonce, &key.to_bytes())?;
    Ok(SealedKey {
        algorithm: key.algorithm().name().to_string(),
        salt: STANDARD.encode(salt.as_bytes()),
        nonce: STANDARD.encode(nonce),
        memory_cost: kdf.memory_cost,
        time_cost: kdf.time_cost,
        parallelism: kdf.parallelism,
        ciphertext: STANDARD.encode(ciphertext),
    })
}

fn unseal(sealed: &SealedKey, password: &Password) -> KeyStoreResult<PrivateKey> {
    let algorithm = SignatureAlgorithm::from_name(&sealed.algorithm)?;
    let kdf = KdfParams {
        memory_cost: sealed.memory_cost,
        time_cost: sealed.time_cost,
        parallelism: sealed.parallelism,
    };
    kdf.check_bounds()?;
    let salt: [u8; SALT_SIZE] = STANDARD
        .decode(&sealed.salt)?
        .try_into()
        .map_err(|_| KeyStoreError::InvalidKey("malformed salt".into()))?;
    let nonce: [u8; NONCE_SIZE] = STANDARD
        .decode(&sealed.nonce)?
        .try_into()
        .map_err(|_| KeyStoreError::InvalidKey("malformed nonce".into()))?;
    let ciphertext = STANDARD.decode(&sealed.ciphertext)?;

    let derived = derive_key(password, &Salt::from_bytes(salt), &kdf)?;
    let secret = Zeroizing::new(
        CipherAlgorithm::ChaCha20Poly1305
            .decrypt(&derived, &nonce, &ciphertext)
            .map_err(|_| KeyStoreError::UnrecoverableKey("wrong key password".into()))?,
    );
    PrivateKey::from_bytes(algorithm, &secret)
}
