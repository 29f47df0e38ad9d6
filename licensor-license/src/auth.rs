//! Authentication of repository records with keys from a key store.

use std::fmt;
use std::sync::{Arc, OnceLock};

use licensor_crypto::{
    CheckedPasswordProtection, MinimumPasswordPolicy, PasswordPolicy, PasswordProtection,
    PasswordUsage, with_password,
};
use licensor_keystore::{
    Certificate, Entry, KeyStore, PrivateKey, STORE_TYPE, SignatureAlgorithm, SigningEngine,
    VerifyingEngine,
};
use serde_json::Value;
use tracing::debug;

use crate::codec::Decoder;
use crate::error::{ErrorKind, LicenseError, LicenseResult};
use crate::repository::RepositoryController;
use crate::store::Source;

/// Signs and verifies repository records.
pub trait Authentication: Send + Sync {
    /// Signs `artifact` into the controller's record.
    fn sign(&self, controller: &mut RepositoryController, artifact: &Value) -> LicenseResult<Decoder>;

    /// Verifies the controller's record.
    fn verify(&self, controller: &RepositoryController) -> LicenseResult<Decoder>;
}

/// Resolves keys from a password protected key store.
///
/// The key store and the private key are loaded on first use and kept for
/// the life of the notary.
pub struct Notary {
    alias: String,
    algorithm: Option<String>,
    store_type: String,
    source: Option<Arc<dyn Source>>,
    store_protection: Arc<dyn PasswordProtection>,
    key_protection: Arc<dyn PasswordProtection>,
    keystore: OnceLock<KeyStore>,
    private_key: OnceLock<PrivateKey>,
}

impl Notary {
    pub fn builder() -> NotaryBuilder {
        NotaryBuilder::default()
    }

    #[must_use]
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Returns the key store, loading it on first use.
    pub fn keystore(&self) -> LicenseResult<&KeyStore> {
        if let Some(keystore) = self.keystore.get() {
            return Ok(keystore);
        }
        let bytes = match &self.source {
            Some(source) => Some(source.content().map_err(|e| match e.kind() {
                ErrorKind::NotFound => {
                    LicenseError::Configuration(format!("no key store for alias {}", self.alias))
                }
                _ => e,
            })?),
            None => None,
        };
        let keystore = with_password(
            self.store_protection.as_ref(),
            PasswordUsage::Read,
            |password| -> LicenseResult<KeyStore> {
                Ok(KeyStore::load(&self.store_type, bytes.as_deref(), password)?)
            },
        )?;
        debug!(alias = %self.alias, store_type = %self.store_type, "Loaded key store");
        // A concurrent caller may have won the race; both loaded the same bytes.
        Ok(self.keystore.get_or_init(|| keystore))
    }

    /// Returns the private key of the configured entry.
    pub fn private_key(&self) -> LicenseResult<&PrivateKey> {
        if let Some(key) = self.private_key.get() {
            return Ok(key);
        }
        let keystore = self.keystore()?;
        if !keystore.contains_alias(&self.alias) {
            return Err(LicenseError::NoSuchEntry(self.alias.clone()));
        }
        if !keystore.is_key_entry(&self.alias) {
            return Err(LicenseError::NoPrivateKey(self.alias.clone()));
        }
        let entry = with_password(
            self.key_protection.as_ref(),
            PasswordUsage::Write,
            |password| -> LicenseResult<Option<Entry>> {
                Ok(keystore.entry(&self.alias, Some(password))?)
            },
        )?;
        match entry {
            Some(Entry::PrivateKey { key, .. }) => {
                debug!(alias = %self.alias, algorithm = %key.algorithm(), "Resolved private key");
                Ok(self.private_key.get_or_init(|| key))
            }
            _ => Err(LicenseError::NoPrivateKey(self.alias.clone())),
        }
    }

    /// Returns the certificate of the configured entry, whether it is a
    /// private key entry or a trusted certificate entry.
    pub fn certificate(&self) -> LicenseResult<&Certificate> {
        let keystore = self.keystore()?;
        if !keystore.contains_alias(&self.alias) {
            return Err(LicenseError::NoSuchEntry(self.alias.clone()));
        }
        keystore
            .certificate(&self.alias)
            .ok_or_else(|| LicenseError::NoCertificate(self.alias.clone()))
    }

    /// Returns the signature algorithm: the configured one, else the one of
    /// the certificate, else the default.
    pub fn algorithm(&self) -> LicenseResult<SignatureAlgorithm> {
        if let Some(name) = &self.algorithm {
            return Ok(SignatureAlgorithm::from_name(name)?);
        }
        Ok(self
            .certificate()
            .ok()
            .and_then(|cert| cert.signature_algorithm().ok())
            .unwrap_or_default())
    }
}

impl Authentication for Notary {
    fn sign(&self, controller: &mut RepositoryController, artifact: &Value) -> LicenseResult<Decoder> {
        let engine = SigningEngine::new(self.algorithm()?, self.private_key()?.clone())?;
        controller.sign(&engine, artifact)
    }

    fn verify(&self, controller: &RepositoryController) -> LicenseResult<Decoder> {
        let public_key = self.certificate()?.public_key()?;
        let engine = VerifyingEngine::new(self.algorithm()?, public_key)?;
        controller.verify(&engine)
    }
}

impl fmt::Debug for Notary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notary")
            .field("alias", &self.alias)
            .field("algorithm", &self.algorithm)
            .field("store_type", &self.store_type)
            .field("loaded", &self.keystore.get().is_some())
            .finish_non_exhaustive()
    }
}

/// Assembles a [`Notary`].
#[derive(Default)]
pub struct NotaryBuilder {
    alias: Option<String>,
    algorithm: Option<String>,
    store_type: Option<String>,
    source: Option<Arc<dyn Source>>,
    store_protection: Option<Arc<dyn PasswordProtection>>,
    key_protection: Option<Arc<dyn PasswordProtection>>,
    policy: Option<Arc<dyn PasswordPolicy>>,
}

impl NotaryBuilder {
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Overrides the signature algorithm otherwise taken from the certificate.
    pub fn algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.algorithm = Some(algorithm.into());
        self
    }

    pub fn store_type(mut self, store_type: impl Into<String>) -> Self {
        self.store_type = Some(store_type.into());
        self
    }

    /// The serialized key store. Without one the key store is empty.
    pub fn source(mut self, source: Arc<dyn Source>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn store_protection(mut self, protection: Arc<dyn PasswordProtection>) -> Self {
        self.store_protection = Some(protection);
        self
    }

    /// Protection of the private key entry. Defaults to the store protection.
    pub fn key_protection(mut self, protection: Arc<dyn PasswordProtection>) -> Self {
        self.key_protection = Some(protection);
        self
    }

    pub fn password_policy(mut self, policy: Arc<dyn PasswordPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn build(self) -> LicenseResult<Notary> {
        let alias = self
            .alias
            .filter(|a| !a.is_empty())
            .ok_or_else(|| LicenseError::Configuration("notary needs an alias".into()))?;
        let store_protection = self.store_protection.ok_or_else(|| {
            LicenseError::Configuration("notary needs a store protection".into())
        })?;
        let key_protection = self.key_protection.unwrap_or_else(|| store_protection.clone());
        let policy = self
            .policy
            .unwrap_or_else(|| Arc::new(MinimumPasswordPolicy));
        Ok(Notary {
            alias,
            algorithm: self.algorithm,
            store_type: self.store_type.unwrap_or_else(|| STORE_TYPE.to_string()),
            source: self.source,
            store_protection: Arc::new(CheckedPasswordProtection::new(
                store_protection,
                policy.clone(),
            )),
            key_protection: Arc::new(CheckedPasswordProtection::new(key_protection, policy)),
            keystore: OnceLock::new(),
            private_key: OnceLock::new(),
        })
    }
}
