//! License initialization, validation and authorization policies.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::clock::Clock;
use crate::error::{LicenseError, LicenseResult};
use crate::license::License;

/// Reasons for rejecting a license record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("consumer amount is not positive")]
    ConsumerAmountNotPositive,

    #[error("consumer type is missing")]
    ConsumerTypeMissing,

    #[error("holder is missing")]
    HolderMissing,

    #[error("issue date is missing")]
    IssuedMissing,

    #[error("issuer is missing")]
    IssuerMissing,

    #[error("license expired at {not_after}")]
    Expired { not_after: DateTime<Utc> },

    #[error("license is not valid before {not_before}")]
    NotYetValid { not_before: DateTime<Utc> },

    #[error("license subject is {actual:?}, expected {expected:?}")]
    InvalidSubject {
        expected: String,
        actual: Option<String>,
    },

    /// Raised by application supplied validation.
    #[error("{0}")]
    Custom(String),
}

/// Fills in the computed properties of a new license.
pub trait LicenseInitialization: Send + Sync {
    fn initialize(&self, license: &mut License) -> LicenseResult<()>;
}

/// Checks a license before it gets issued, installed or used.
pub trait LicenseValidation: Send + Sync {
    fn validate(&self, license: &License) -> Result<(), ValidationError>;
}

pub const DEFAULT_CONSUMER_TYPE: &str = "User";

pub const UNKNOWN_HOLDER: &str = "CN=unknown";

/// Initializes absent properties from the licensing subject and the clock.
pub struct DefaultInitialization {
    subject: String,
    clock: Arc<dyn Clock>,
}

impl DefaultInitialization {
    pub fn new(subject: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            subject: subject.into(),
            clock,
        }
    }
}

impl LicenseInitialization for DefaultInitialization {
    fn initialize(&self, license: &mut License) -> LicenseResult<()> {
        if license.consumer_amount == 0 {
            license.consumer_amount = 1;
        }
        license
            .consumer_type
            .get_or_insert_with(|| DEFAULT_CONSUMER_TYPE.to_string());
        license
            .holder
            .get_or_insert_with(|| UNKNOWN_HOLDER.to_string());
        license.issued.get_or_insert_with(|| self.clock.now());
        license
            .issuer
            .get_or_insert_with(|| format!("CN={}", self.subject));
        license.subject.get_or_insert_with(|| self.subject.clone());
        Ok(())
    }
}

/// Checks mandatory properties, the validity window against the clock and
/// the subject.
pub struct DefaultValidation {
    subject: String,
    clock: Arc<dyn Clock>,
}

impl DefaultValidation {
    pub fn new(subject: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            subject: subject.into(),
            clock,
        }
    }
}

impl LicenseValidation for DefaultValidation {
    fn validate(&self, license: &License) -> Result<(), ValidationError> {
        if license.consumer_amount == 0 {
            return Err(ValidationError::ConsumerAmountNotPositive);
        }
        if license.consumer_type.is_none() {
            return Err(ValidationError::ConsumerTypeMissing);
        }
        if license.holder.is_none() {
            return Err(ValidationError::HolderMissing);
        }
        if license.issued.is_none() {
            return Err(ValidationError::IssuedMissing);
        }
        if license.issuer.is_none() {
            return Err(ValidationError::IssuerMissing);
        }
        let now = self.clock.now();
        if let Some(not_after) = license.not_after.filter(|_| license.is_expired_at(now)) {
            return Err(ValidationError::Expired { not_after });
        }
        if let Some(not_before) = license.not_before.filter(|_| license.is_premature_at(now)) {
            return Err(ValidationError::NotYetValid { not_before });
        }
        if license.subject.as_deref() != Some(self.subject.as_str()) {
            return Err(ValidationError::InvalidSubject {
                expected: self.subject.clone(),
                actual: license.subject.clone(),
            });
        }
        Ok(())
    }
}

/// How an application supplied policy combines with the default one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LicenseFunctionComposition {
    /// Runs the application policy first, then the default policy.
    #[default]
    Decorate,
    /// Runs only the application policy.
    Override,
}

struct ChainedInitialization {
    first: Arc<dyn LicenseInitialization>,
    second: Arc<dyn LicenseInitialization>,
}

impl LicenseInitialization for ChainedInitialization {
    fn initialize(&self, license: &mut License) -> LicenseResult<()> {
        self.first.initialize(license)?;
        self.second.initialize(license)
    }
}

struct ChainedValidation {
    first: Arc<dyn LicenseValidation>,
    second: Arc<dyn LicenseValidation>,
}

impl LicenseValidation for ChainedValidation {
    fn validate(&self, license: &License) -> Result<(), ValidationError> {
        self.first.validate(license)?;
        self.second.validate(license)
    }
}

impl LicenseFunctionComposition {
    pub fn initialization(
        self,
        custom: Arc<dyn LicenseInitialization>,
        default: Arc<dyn LicenseInitialization>,
    ) -> Arc<dyn LicenseInitialization> {
        match self {
            Self::Decorate => Arc::new(ChainedInitialization {
                first: custom,
                second: default,
            }),
            Self::Override => custom,
        }
    }

    pub fn validation(
        self,
        custom: Arc<dyn LicenseValidation>,
        default: Arc<dyn LicenseValidation>,
    ) -> Arc<dyn LicenseValidation> {
        match self {
            Self::Decorate => Arc::new(ChainedValidation {
                first: custom,
                second: default,
            }),
            Self::Override => custom,
        }
    }
}

/// Grants or refuses license management operations for a subject.
///
/// Every hook allows the operation unless overridden. A refusal should be
/// reported as [`LicenseError::Unauthorized`].
pub trait LicenseManagementAuthorization: Send + Sync {
    fn clear_generate(&self, _subject: &str) -> LicenseResult<()> {
        Ok(())
    }

    fn clear_install(&self, _subject: &str) -> LicenseResult<()> {
        Ok(())
    }

    fn clear_load(&self, _subject: &str) -> LicenseResult<()> {
        Ok(())
    }

    fn clear_verify(&self, _subject: &str) -> LicenseResult<()> {
        Ok(())
    }

    fn clear_uninstall(&self, _subject: &str) -> LicenseResult<()> {
        Ok(())
    }
}

/// Allows everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl LicenseManagementAuthorization for AllowAll {}

/// Refuses everything. Useful to lock down a manager handed to untrusted code.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

impl LicenseManagementAuthorization for DenyAll {
    fn clear_generate(&self, subject: &str) -> LicenseResult<()> {
        Err(LicenseError::Unauthorized(format!("generate {subject}")))
    }

    fn clear_install(&self, subject: &str) -> LicenseResult<()> {
        Err(LicenseError::Unauthorized(format!("install {subject}")))
    }

    fn clear_load(&self, subject: &str) -> LicenseResult<()> {
        Err(LicenseError::Unauthorized(format!("load {subject}")))
    }

    fn clear_verify(&self, subject: &str) -> LicenseResult<()> {
        Err(LicenseError::Unauthorized(format!("verify {subject}")))
    }

    fn clear_uninstall(&self, subject: &str) -> LicenseResult<()> {
        Err(LicenseError::Unauthorized(format!("uninstall {subject}")))
    }
}
