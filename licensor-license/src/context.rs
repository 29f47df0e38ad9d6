//! Frozen configuration shared by the managers of one licensing subject.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use licensor_crypto::{
    CHACHA20_POLY1305, CheckedPasswordProtection, CipherAlgorithm, DeflateCompression,
    EncryptionFactory, EncryptionParameters, GzipCompression, KdfParams, LegacyPbeEncryptionFactory,
    MinimumPasswordPolicy, PasswordPolicy, PasswordProtection, PbeEncryptionFactory,
    Transformation,
};
use licensor_keystore::STORE_TYPE;

use crate::auth::NotaryBuilder;
use crate::clock::{Clock, SystemClock};
use crate::codec::{Codec, JsonCodec};
use crate::consumer::ConsumerManagerBuilder;
use crate::error::{LicenseError, LicenseResult};
use crate::license::License;
use crate::policy::{
    AllowAll, DefaultInitialization, DefaultValidation, LicenseFunctionComposition,
    LicenseInitialization, LicenseManagementAuthorization, LicenseValidation,
};
use crate::vendor::VendorManagerBuilder;

/// Default time a verification outcome is reused.
pub const DEFAULT_CACHE_PERIOD: Duration = Duration::from_secs(30 * 60);

/// License key format presets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    /// Raw deflate and encryption with fresh cipher parameters per key.
    #[default]
    Current,
    /// Gzip and encryption with fixed parameters, for keys issued by older
    /// releases.
    Legacy,
}

impl Format {
    #[must_use]
    pub fn compression(&self) -> Arc<dyn Transformation> {
        match self {
            Self::Current => Arc::new(DeflateCompression),
            Self::Legacy => Arc::new(GzipCompression),
        }
    }

    #[must_use]
    pub fn encryption_factory(&self) -> Arc<dyn EncryptionFactory> {
        match self {
            Self::Current => Arc::new(PbeEncryptionFactory),
            Self::Legacy => Arc::new(LegacyPbeEncryptionFactory),
        }
    }
}

/// Configuration for vendor and consumer managers.
///
/// Built once by [`LicenseManagementContextBuilder`] and then only read.
#[derive(Clone)]
pub struct LicenseManagementContext {
    subject: String,
    keystore_type: String,
    encryption_algorithm: String,
    codec: Arc<dyn Codec>,
    compression: Arc<dyn Transformation>,
    encryption_factory: Arc<dyn EncryptionFactory>,
    kdf: KdfParams,
    password_policy: Arc<dyn PasswordPolicy>,
    clock: Arc<dyn Clock>,
    cache_period: Duration,
    initialization: Arc<dyn LicenseInitialization>,
    validation: Arc<dyn LicenseValidation>,
    authorization: Arc<dyn LicenseManagementAuthorization>,
}

impl LicenseManagementContext {
    pub fn builder() -> LicenseManagementContextBuilder {
        LicenseManagementContextBuilder::default()
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    #[must_use]
    pub fn encryption_algorithm(&self) -> &str {
        &self.encryption_algorithm
    }

    #[must_use]
    pub fn codec(&self) -> &Arc<dyn Codec> {
        &self.codec
    }

    #[must_use]
    pub fn compression(&self) -> &Arc<dyn Transformation> {
        &self.compression
    }

    #[must_use]
    pub fn cache_period(&self) -> Duration {
        self.cache_period
    }

    #[must_use]
    pub fn authorization(&self) -> &dyn LicenseManagementAuthorization {
        self.authorization.as_ref()
    }

    #[must_use]
    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    pub fn initialize(&self, license: &mut License) -> LicenseResult<()> {
        self.initialization.initialize(license)
    }

    pub fn validate(&self, license: &License) -> LicenseResult<()> {
        Ok(self.validation.validate(license)?)
    }

    /// Creates the encryption for license keys protected by `protection`.
    ///
    /// The password policy applies whenever the encryption writes.
    pub fn encryption(
        &self,
        protection: Arc<dyn PasswordProtection>,
    ) -> LicenseResult<Arc<dyn Transformation>> {
        let protection = Arc::new(CheckedPasswordProtection::new(
            protection,
            self.password_policy.clone(),
        ));
        Ok(self.encryption_factory.encryption(EncryptionParameters {
            algorithm: self.encryption_algorithm.clone(),
            protection,
            kdf: self.kdf,
        })?)
    }

    /// A notary builder preset with this context's key store type and
    /// password policy.
    pub fn notary(&self) -> NotaryBuilder {
        NotaryBuilder::default()
            .store_type(self.keystore_type.clone())
            .password_policy(self.password_policy.clone())
    }

    pub fn vendor(&self) -> VendorManagerBuilder {
        VendorManagerBuilder::new(self.clone())
    }

    pub fn consumer(&self) -> ConsumerManagerBuilder {
        ConsumerManagerBuilder::new(self.clone())
    }
}

impl fmt::Debug for LicenseManagementContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LicenseManagementContext")
            .field("subject", &self.subject)
            .field("keystore_type", &self.keystore_type)
            .field("encryption_algorithm", &self.encryption_algorithm)
            .field("content_type", &self.codec.content_type())
            .field("cache_period", &self.cache_period)
            .finish_non_exhaustive()
    }
}

/// Assembles a [`LicenseManagementContext`].
///
/// Not meant to be shared between threads while building.
#[derive(Default)]
pub struct LicenseManagementContextBuilder {
    subject: Option<String>,
    format: Format,
    keystore_type: Option<String>,
    encryption_algorithm: Option<String>,
    codec: Option<Arc<dyn Codec>>,
    compression: Option<Arc<dyn Transformation>>,
    encryption_factory: Option<Arc<dyn EncryptionFactory>>,
    kdf: Option<KdfParams>,
    password_policy: Option<Arc<dyn PasswordPolicy>>,
    clock: Option<Arc<dyn Clock>>,
    cache_period: Option<Duration>,
    initialization: Option<Arc<dyn LicenseInitialization>>,
    validation: Option<Arc<dyn LicenseValidation>>,
    composition: LicenseFunctionComposition,
    authorization: Option<Arc<dyn LicenseManagementAuthorization>>,
}

impl LicenseManagementContextBuilder {
    /// The licensing subject, usually the product name and major version.
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Selects the compression and encryption presets.
    pub fn format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    pub fn keystore_type(mut self, keystore_type: impl Into<String>) -> Self {
        self.keystore_type = Some(keystore_type.into());
        self
    }

    pub fn encryption_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.encryption_algorithm = Some(algorithm.into());
        self
    }

    pub fn codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Overrides the compression of the selected format.
    pub fn compression(mut self, compression: Arc<dyn Transformation>) -> Self {
        self.compression = Some(compression);
        self
    }

    /// Overrides the encryption of the selected format.
    pub fn encryption_factory(mut self, factory: Arc<dyn EncryptionFactory>) -> Self {
        self.encryption_factory = Some(factory);
        self
    }

    /// Key derivation parameters for newly encrypted license keys.
    pub fn kdf(mut self, kdf: KdfParams) -> Self {
        self.kdf = Some(kdf);
        self
    }

    pub fn password_policy(mut self, policy: Arc<dyn PasswordPolicy>) -> Self {
        self.password_policy = Some(policy);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// How long a verification outcome is reused. Zero disables caching and
    /// [`Duration::MAX`] keeps the outcome for the life of the manager.
    pub fn cache_period(mut self, period: Duration) -> Self {
        self.cache_period = Some(period);
        self
    }

    pub fn initialization(mut self, initialization: Arc<dyn LicenseInitialization>) -> Self {
        self.initialization = Some(initialization);
        self
    }

    pub fn validation(mut self, validation: Arc<dyn LicenseValidation>) -> Self {
        self.validation = Some(validation);
        self
    }

    /// How custom initialization and validation combine with the defaults.
    pub fn composition(mut self, composition: LicenseFunctionComposition) -> Self {
        self.composition = composition;
        self
    }

    pub fn authorization(mut self, authorization: Arc<dyn LicenseManagementAuthorization>) -> Self {
        self.authorization = Some(authorization);
        self
    }

    pub fn build(self) -> LicenseResult<LicenseManagementContext> {
        let subject = self
            .subject
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| LicenseError::Configuration("subject must not be empty".into()))?;
        let encryption_algorithm = self
            .encryption_algorithm
            .unwrap_or_else(|| CHACHA20_POLY1305.to_string());
        CipherAlgorithm::from_name(&encryption_algorithm)?;
        let kdf = self.kdf.unwrap_or_default();
        kdf.check_bounds()
            .map_err(|e| LicenseError::Configuration(e.to_string()))?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let default_initialization: Arc<dyn LicenseInitialization> =
            Arc::new(DefaultInitialization::new(subject.clone(), clock.clone()));
        let default_validation: Arc<dyn LicenseValidation> =
            Arc::new(DefaultValidation::new(subject.clone(), clock.clone()));
        let initialization = match self.initialization {
            Some(custom) => self
                .composition
                .initialization(custom, default_initialization),
            None => default_initialization,
        };
        let validation = match self.validation {
            Some(custom) => self.composition.validation(custom, default_validation),
            None => default_validation,
        };

        Ok(LicenseManagementContext {
            subject,
            keystore_type: self.keystore_type.unwrap_or_else(|| STORE_TYPE.to_string()),
            encryption_algorithm,
            codec: self.codec.unwrap_or_else(|| Arc::new(JsonCodec)),
            compression: self
                .compression
                .unwrap_or_else(|| self.format.compression()),
            encryption_factory: self
                .encryption_factory
                .unwrap_or_else(|| self.format.encryption_factory()),
            kdf,
            password_policy: self
                .password_policy
                .unwrap_or_else(|| Arc::new(MinimumPasswordPolicy)),
            clock,
            cache_period: self.cache_period.unwrap_or(DEFAULT_CACHE_PERIOD),
            initialization,
            validation,
            authorization: self.authorization.unwrap_or_else(|| Arc::new(AllowAll)),
        })
    }
}
