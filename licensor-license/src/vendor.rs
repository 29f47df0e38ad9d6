//! License key generation.

use std::fmt;
use std::sync::Arc;

use licensor_crypto::{Composite, PasswordProtection, Transformation, transform};
use tracing::info;

use crate::auth::Authentication;
use crate::codec;
use crate::context::LicenseManagementContext;
use crate::error::{LicenseError, LicenseResult, ManagementResult};
use crate::license::License;
use crate::repository::{Repository, RepositoryController};
use crate::store::Store;

/// A generated license key.
///
/// Generation happens entirely in memory, so a failure never leaves a
/// partial key in a store.
#[derive(Clone)]
pub struct LicenseKeyGenerator {
    license: License,
    bytes: Vec<u8>,
}

impl LicenseKeyGenerator {
    /// Returns the license as initialized, validated and signed.
    #[must_use]
    pub fn license(&self) -> &License {
        &self.license
    }

    /// Returns the encrypted license key.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    pub fn save_to(&self, store: &dyn Store) -> ManagementResult<&Self> {
        store.set_content(&self.bytes)?;
        Ok(self)
    }
}

impl fmt::Debug for LicenseKeyGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LicenseKeyGenerator")
            .field("subject", &self.license.subject)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Runs the generation pipeline: duplicate, initialize, validate, sign,
/// encode, compress and encrypt.
///
/// With `term_days` the validity window starts at the issue date and lasts
/// that many days.
pub(crate) fn generate_key(
    context: &LicenseManagementContext,
    authentication: &dyn Authentication,
    encryption: &Arc<dyn Transformation>,
    bean: &License,
    term_days: Option<u32>,
) -> LicenseResult<LicenseKeyGenerator> {
    let codec = context.codec();
    let mut license: License = codec::duplicate(codec.as_ref(), bean)?;
    context.initialize(&mut license)?;
    if let Some(days) = term_days {
        license.set_term(days, context.now());
    }
    context.validate(&license)?;

    let mut controller = RepositoryController::new(codec.clone(), Repository::default());
    let decoder = authentication.sign(&mut controller, &serde_json::to_value(&license)?)?;
    let license: License = decoder.decode()?;

    let encoded = codec::encode(codec.as_ref(), controller.model())?;
    let pipeline = Composite::new(context.compression().clone(), encryption.clone());
    let bytes = transform(&pipeline, &encoded)?;
    Ok(LicenseKeyGenerator { license, bytes })
}

/// Issues license keys.
pub struct VendorLicenseManager {
    context: LicenseManagementContext,
    authentication: Arc<dyn Authentication>,
    encryption: Arc<dyn Transformation>,
}

impl VendorLicenseManager {
    #[must_use]
    pub fn context(&self) -> &LicenseManagementContext {
        &self.context
    }

    /// Generates a license key from a template license. The template itself
    /// is left untouched.
    pub fn generate_key_from(&self, bean: &License) -> ManagementResult<LicenseKeyGenerator> {
        let subject = self.context.subject();
        self.context.authorization().clear_generate(subject)?;
        let generator = generate_key(
            &self.context,
            self.authentication.as_ref(),
            &self.encryption,
            bean,
            None,
        )?;
        info!(
            subject,
            holder = generator.license.holder.as_deref().unwrap_or_default(),
            "Generated license key"
        );
        Ok(generator)
    }
}

impl fmt::Debug for VendorLicenseManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VendorLicenseManager")
            .field("subject", &self.context.subject())
            .finish_non_exhaustive()
    }
}

/// Assembles a [`VendorLicenseManager`].
pub struct VendorManagerBuilder {
    context: LicenseManagementContext,
    authentication: Option<Arc<dyn Authentication>>,
    encryption: Option<Arc<dyn Transformation>>,
    protection: Option<Arc<dyn PasswordProtection>>,
}

impl VendorManagerBuilder {
    pub fn new(context: LicenseManagementContext) -> Self {
        Self {
            context,
            authentication: None,
            encryption: None,
            protection: None,
        }
    }

    pub fn authentication(mut self, authentication: Arc<dyn Authentication>) -> Self {
        self.authentication = Some(authentication);
        self
    }

    /// The password for encrypting license keys with the context's encryption.
    pub fn encryption_protection(mut self, protection: Arc<dyn PasswordProtection>) -> Self {
        self.protection = Some(protection);
        self
    }

    /// A custom encryption, taking precedence over the protection.
    pub fn encryption(mut self, encryption: Arc<dyn Transformation>) -> Self {
        self.encryption = Some(encryption);
        self
    }

    pub fn build(self) -> LicenseResult<VendorLicenseManager> {
        let authentication = self.authentication.ok_or_else(|| {
            LicenseError::Configuration("vendor manager needs an authentication".into())
        })?;
        let encryption = match (self.encryption, self.protection) {
            (Some(encryption), _) => encryption,
            (None, Some(protection)) => self.context.encryption(protection)?,
            (None, None) => {
                return Err(LicenseError::Configuration(
                    "vendor manager needs an encryption".into(),
                ));
            }
        };
        Ok(VendorLicenseManager {
            context: self.context,
            authentication,
            encryption,
        })
    }
}
