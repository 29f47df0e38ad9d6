//! License key installation and verification.
//!
//! [`BasicConsumerLicenseManager`] runs the consumer pipeline: decrypt,
//! decompress, decode the repository record, authenticate and decode the
//! license. The outcome of the pipeline is cached for the configured period
//! while validation runs on every call, so an expired license is noticed
//! even when its key was decoded earlier.
//!
//! # Chaining
//!
//! A manager may have a parent. Each operation first runs against the
//! manager's own store and consults the parent only if the local failure
//! is of a delegating kind, [`ErrorKind::NotFound`] by default. Integrity
//! and validation failures are never delegated.
//!
//! # Free Trial
//!
//! A manager configured with `ftp_days` generates a trial license key into
//! its store the first time nothing is found locally or in the parent,
//! provided its authentication can sign. The trial never gets regenerated
//! once the store exists.

use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use licensor_crypto::{Composite, PasswordProtection, Transformation, untransform};
use tracing::{debug, info, warn};

use crate::auth::Authentication;
use crate::codec::{self, Decoder};
use crate::context::LicenseManagementContext;
use crate::error::{
    ErrorKind, LicenseError, LicenseManagementError, LicenseResult, ManagementResult,
};
use crate::license::License;
use crate::repository::{Repository, RepositoryController};
use crate::store::{MemoryStore, Source, Store};
use crate::vendor::{LicenseKeyGenerator, generate_key};

/// Decides from the kind of a local failure whether to consult the parent.
pub type DelegatePredicate = Arc<dyn Fn(ErrorKind) -> bool + Send + Sync>;

/// Operations of a license consumer.
pub trait ConsumerLicenseManager: Send + Sync {
    fn context(&self) -> &LicenseManagementContext;

    /// Authenticates and validates the key from `source`, then copies it to
    /// the store. Nothing is written on failure.
    fn install(&self, source: &dyn Source) -> ManagementResult<()>;

    /// Returns the installed license without validating it.
    fn view(&self) -> ManagementResult<License>;

    /// Returns the installed license after validating it.
    fn load(&self) -> ManagementResult<License>;

    /// Validates the installed license.
    fn verify(&self) -> ManagementResult<()>;

    /// Authenticates the installed key, then deletes it.
    fn uninstall(&self) -> ManagementResult<()>;

    /// The encryption of license keys.
    fn encryption(&self) -> Arc<dyn Transformation>;
}

struct CachedOutcome {
    outcome: Result<License, Arc<LicenseError>>,
    computed_at: DateTime<Utc>,
}

impl CachedOutcome {
    fn is_obsolete(&self, now: DateTime<Utc>, period: Duration) -> bool {
        match chrono::Duration::from_std(period) {
            Ok(period) => now - self.computed_at >= period,
            // Periods beyond the range of chrono never expire.
            Err(_) => false,
        }
    }
}

/// The standard consumer manager.
pub struct BasicConsumerLicenseManager {
    context: LicenseManagementContext,
    authentication: Arc<dyn Authentication>,
    encryption: Arc<dyn Transformation>,
    store: Arc<dyn Store>,
    parent: Option<Arc<dyn ConsumerLicenseManager>>,
    delegate: DelegatePredicate,
    ftp_days: u32,
    cache: RwLock<Option<CachedOutcome>>,
    can_generate: OnceLock<bool>,
    ftp_lock: Mutex<()>,
}

impl BasicConsumerLicenseManager {
    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    #[must_use]
    pub fn parent(&self) -> Option<&Arc<dyn ConsumerLicenseManager>> {
        self.parent.as_ref()
    }

    fn subject(&self) -> &str {
        self.context.subject()
    }

    // Pipeline

    fn authenticate(&self, source: &dyn Source) -> LicenseResult<Decoder> {
        let bytes = source.content()?;
        let pipeline = Composite::new(self.context.compression().clone(), self.encryption.clone());
        let encoded = untransform(&pipeline, &bytes)?;
        let codec = self.context.codec();
        let repository: Repository = codec::decode(codec.as_ref(), &encoded)?;
        self.authentication
            .verify(&RepositoryController::new(codec.clone(), repository))
    }

    fn decode_license(&self, source: &dyn Source) -> LicenseResult<License> {
        self.authenticate(source)?.decode()
    }

    /// Decodes the installed license, reusing a cached outcome while it is
    /// fresh.
    fn cached_license(&self) -> Result<License, Arc<LicenseError>> {
        let period = self.context.cache_period();
        let now = self.context.now();
        if let Some(cached) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|c| !c.is_obsolete(now, period))
        {
            debug!(subject = self.subject(), "License cache hit");
            return cached.outcome.clone();
        }

        debug!(subject = self.subject(), "License cache miss");
        let outcome = self.decode_license(self.store.as_ref()).map_err(Arc::new);
        if !period.is_zero() {
            self.set_cache(Some(CachedOutcome {
                outcome: outcome.clone(),
                computed_at: now,
            }));
        }
        outcome
    }

    fn set_cache(&self, outcome: Option<CachedOutcome>) {
        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = outcome;
    }

    fn validate(&self, license: &License) -> Result<(), Arc<LicenseError>> {
        self.context.validate(license).map_err(Arc::new)
    }

    // Local operations

    fn install_locally(&self, source: &dyn Source) -> LicenseResult<()> {
        self.context.authorization().clear_install(self.subject())?;
        let bytes = source.content()?;
        let license = self.decode_license(&bytes)?;
        self.context.validate(&license)?;
        self.store.set_content(&bytes)?;
        if !self.context.cache_period().is_zero() {
            self.set_cache(Some(CachedOutcome {
                outcome: Ok(license),
                computed_at: self.context.now(),
            }));
        } else {
            self.set_cache(None);
        }
        info!(subject = self.subject(), "Installed license key");
        Ok(())
    }

    fn view_locally(&self) -> Result<License, Arc<LicenseError>> {
        self.context
            .authorization()
            .clear_load(self.subject())
            .map_err(Arc::new)?;
        self.cached_license()
    }

    fn load_locally(&self) -> Result<License, Arc<LicenseError>> {
        self.context
            .authorization()
            .clear_load(self.subject())
            .map_err(Arc::new)?;
        let license = self.cached_license()?;
        self.validate(&license)?;
        Ok(license)
    }

    fn verify_locally(&self) -> Result<(), Arc<LicenseError>> {
        self.context
            .authorization()
            .clear_verify(self.subject())
            .map_err(Arc::new)?;
        let license = self.cached_license()?;
        self.validate(&license)
    }

    fn uninstall_locally(&self) -> LicenseResult<()> {
        self.context.authorization().clear_uninstall(self.subject())?;
        if self.ftp_days > 0 && self.can_generate() {
            return Err(LicenseError::Unauthorized(format!(
                "free trial license key of {} cannot be uninstalled",
                self.subject()
            )));
        }
        self.authenticate(self.store.as_ref())?;
        self.store.delete()?;
        self.set_cache(None);
        info!(subject = self.subject(), "Uninstalled license key");
        Ok(())
    }

    // Chaining and free trial

    fn delegates(&self, error: &LicenseError) -> bool {
        match error {
            LicenseError::RepositoryIntegrity | LicenseError::Validation(_) => false,
            _ => (self.delegate)(error.kind()),
        }
    }

    /// Runs `local`, falling back to `remote` on the parent and finally to
    /// the free trial.
    fn chain<T>(
        &self,
        operation: &'static str,
        local: impl Fn() -> Result<T, Arc<LicenseError>>,
        remote: impl FnOnce(&dyn ConsumerLicenseManager) -> ManagementResult<T>,
        trial: impl FnOnce(License) -> T,
    ) -> ManagementResult<T> {
        let first = match local() {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };
        if !self.delegates(&first) {
            return Err(first.into());
        }
        if let Some(parent) = &self.parent {
            debug!(subject = self.subject(), operation, "Delegating to parent manager");
            match remote(parent.as_ref()) {
                Ok(value) => return Ok(value),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        if first.kind() != ErrorKind::NotFound || self.ftp_days == 0 {
            return Err(first.into());
        }
        match self.generate_trial(&local)? {
            Trial::Existing(value) => Ok(value),
            Trial::Generated(license) => Ok(trial(license)),
            Trial::Refused => Err(first.into()),
        }
    }

    fn generate_trial<T>(
        &self,
        local: &impl Fn() -> Result<T, Arc<LicenseError>>,
    ) -> ManagementResult<Trial<T>> {
        let _guard = self.ftp_lock.lock().unwrap_or_else(PoisonError::into_inner);
        // Another thread may have generated the trial meanwhile.
        self.set_cache(None);
        match local() {
            Ok(value) => return Ok(Trial::Existing(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        if !self.can_generate() || self.store.exists()? {
            return Ok(Trial::Refused);
        }
        let generator = self.trial_key()?;
        generator.save_to(self.store.as_ref())?;
        let license = generator.license().clone();
        if !self.context.cache_period().is_zero() {
            self.set_cache(Some(CachedOutcome {
                outcome: Ok(license.clone()),
                computed_at: self.context.now(),
            }));
        }
        info!(
            subject = self.subject(),
            days = self.ftp_days,
            "Generated free trial license key"
        );
        Ok(Trial::Generated(license))
    }

    fn trial_key(&self) -> LicenseResult<LicenseKeyGenerator> {
        generate_key(
            &self.context,
            self.authentication.as_ref(),
            &self.encryption,
            &License::default(),
            Some(self.ftp_days),
        )
    }

    /// Probes once whether this manager can generate trial keys by
    /// generating one into memory.
    fn can_generate(&self) -> bool {
        *self.can_generate.get_or_init(|| {
            let probe = self
                .trial_key()
                .and_then(|generator| MemoryStore::new().set_content(&generator.to_bytes()));
            if let Err(e) = &probe {
                debug!(subject = self.subject(), error = %e, "Cannot generate free trial keys");
            }
            probe.is_ok()
        })
    }
}

enum Trial<T> {
    Existing(T),
    Generated(License),
    Refused,
}

impl ConsumerLicenseManager for BasicConsumerLicenseManager {
    fn context(&self) -> &LicenseManagementContext {
        &self.context
    }

    fn install(&self, source: &dyn Source) -> ManagementResult<()> {
        self.install_locally(source).map_err(|e| {
            warn!(subject = self.subject(), error = %e, "License key installation failed");
            LicenseManagementError::from(e)
        })
    }

    fn view(&self) -> ManagementResult<License> {
        self.chain("view", || self.view_locally(), |p| p.view(), |l| l)
    }

    fn load(&self) -> ManagementResult<License> {
        self.chain("load", || self.load_locally(), |p| p.load(), |l| l)
    }

    fn verify(&self) -> ManagementResult<()> {
        self.chain("verify", || self.verify_locally(), |p| p.verify(), |_| ())
    }

    fn uninstall(&self) -> ManagementResult<()> {
        let first = match self.uninstall_locally() {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        match &self.parent {
            Some(parent) if self.delegates(&first) => parent.uninstall(),
            _ => Err(first.into()),
        }
    }

    fn encryption(&self) -> Arc<dyn Transformation> {
        self.encryption.clone()
    }
}

impl fmt::Debug for BasicConsumerLicenseManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicConsumerLicenseManager")
            .field("subject", &self.subject())
            .field("ftp_days", &self.ftp_days)
            .field("chained", &self.parent.is_some())
            .finish_non_exhaustive()
    }
}

/// Assembles a [`BasicConsumerLicenseManager`].
pub struct ConsumerManagerBuilder {
    context: LicenseManagementContext,
    authentication: Option<Arc<dyn Authentication>>,
    encryption: Option<Arc<dyn Transformation>>,
    protection: Option<Arc<dyn PasswordProtection>>,
    store: Option<Arc<dyn Store>>,
    parent: Option<Arc<dyn ConsumerLicenseManager>>,
    delegate: Option<DelegatePredicate>,
    ftp_days: u32,
}

impl ConsumerManagerBuilder {
    pub fn new(context: LicenseManagementContext) -> Self {
        Self {
            context,
            authentication: None,
            encryption: None,
            protection: None,
            store: None,
            parent: None,
            delegate: None,
            ftp_days: 0,
        }
    }

    pub fn authentication(mut self, authentication: Arc<dyn Authentication>) -> Self {
        self.authentication = Some(authentication);
        self
    }

    /// The password for decrypting license keys with the context's encryption.
    pub fn encryption_protection(mut self, protection: Arc<dyn PasswordProtection>) -> Self {
        self.protection = Some(protection);
        self
    }

    /// A custom encryption, taking precedence over the protection.
    pub fn encryption(mut self, encryption: Arc<dyn Transformation>) -> Self {
        self.encryption = Some(encryption);
        self
    }

    pub fn store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    /// The manager consulted when nothing is found locally. Its encryption
    /// becomes the default of this manager.
    pub fn parent(mut self, parent: Arc<dyn ConsumerLicenseManager>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Replaces the default rule of delegating only on [`ErrorKind::NotFound`].
    pub fn delegate_when(mut self, predicate: DelegatePredicate) -> Self {
        self.delegate = Some(predicate);
        self
    }

    /// Length of the free trial period in days. Zero disables it.
    pub fn ftp_days(mut self, days: u32) -> Self {
        self.ftp_days = days;
        self
    }

    pub fn build(self) -> LicenseResult<BasicConsumerLicenseManager> {
        let authentication = self.authentication.ok_or_else(|| {
            LicenseError::Configuration("consumer manager needs an authentication".into())
        })?;
        let store = self
            .store
            .ok_or_else(|| LicenseError::Configuration("consumer manager needs a store".into()))?;
        let encryption = match (self.encryption, self.protection, &self.parent) {
            (Some(encryption), _, _) => encryption,
            (None, Some(protection), _) => self.context.encryption(protection)?,
            (None, None, Some(parent)) => parent.encryption(),
            (None, None, None) => {
                return Err(LicenseError::Configuration(
                    "consumer manager needs an encryption or a parent".into(),
                ));
            }
        };
        let delegate: DelegatePredicate = match self.delegate {
            Some(predicate) => predicate,
            None => Arc::new(|kind: ErrorKind| kind == ErrorKind::NotFound),
        };
        Ok(BasicConsumerLicenseManager {
            context: self.context,
            authentication,
            encryption,
            store,
            parent: self.parent,
            delegate,
            ftp_days: self.ftp_days,
            cache: RwLock::new(None),
            can_generate: OnceLock::new(),
            ftp_lock: Mutex::new(()),
        })
    }
}
