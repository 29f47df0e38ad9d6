//! End-user message catalogue.
//!
//! Managers translate every failure into one of these messages so that a
//! presentation layer can show it without matching on [`LicenseError`].

use crate::error::{ErrorKind, LicenseError};
use crate::policy::ValidationError;

/// Identifies a catalogue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKey {
    ConsumerAmountIsNotPositive,
    ConsumerTypeIsNull,
    HolderIsNull,
    IssuedIsNull,
    IssuerIsNull,
    LicenseHasExpired,
    LicenseIsNotYetValid,
    InvalidSubject,
    InvalidLicense,
    Tampered,
    Misconfigured,
    WeakPassword,
    Unauthorized,
    NotInstalled,
    Unreadable,
}

impl MessageKey {
    /// Returns the message text.
    #[must_use]
    pub fn text(&self) -> &'static str {
        match self {
            Self::ConsumerAmountIsNotPositive => "The consumer amount must be positive.",
            Self::ConsumerTypeIsNull => "The license key does not name a consumer type.",
            Self::HolderIsNull => "The license key does not name a holder.",
            Self::IssuedIsNull => "The license key has no issue date.",
            Self::IssuerIsNull => "The license key does not name an issuer.",
            Self::LicenseHasExpired => "The license key has expired.",
            Self::LicenseIsNotYetValid => "The license key is not valid yet.",
            Self::InvalidSubject => "The license key is for a different product.",
            Self::InvalidLicense => "The license key is not valid.",
            Self::Tampered => "The license key has been tampered with or is corrupt.",
            Self::Misconfigured => "License management is not configured correctly.",
            Self::WeakPassword => "The password is too weak.",
            Self::Unauthorized => "This license operation is not permitted.",
            Self::NotInstalled => "No license key is installed.",
            Self::Unreadable => "The license key could not be read.",
        }
    }
}

/// Picks the catalogue entry for a validation failure.
#[must_use]
pub fn validation_key(error: &ValidationError) -> MessageKey {
    match error {
        ValidationError::ConsumerAmountNotPositive => MessageKey::ConsumerAmountIsNotPositive,
        ValidationError::ConsumerTypeMissing => MessageKey::ConsumerTypeIsNull,
        ValidationError::HolderMissing => MessageKey::HolderIsNull,
        ValidationError::IssuedMissing => MessageKey::IssuedIsNull,
        ValidationError::IssuerMissing => MessageKey::IssuerIsNull,
        ValidationError::Expired { .. } => MessageKey::LicenseHasExpired,
        ValidationError::NotYetValid { .. } => MessageKey::LicenseIsNotYetValid,
        ValidationError::InvalidSubject { .. } => MessageKey::InvalidSubject,
        ValidationError::Custom(_) => MessageKey::InvalidLicense,
    }
}

/// Picks the catalogue entry for any failure.
#[must_use]
pub fn message_key(error: &LicenseError) -> MessageKey {
    match error {
        LicenseError::Validation(e) => validation_key(e),
        LicenseError::Unauthorized(_) => MessageKey::Unauthorized,
        _ => match error.kind() {
            ErrorKind::Integrity => MessageKey::Tampered,
            ErrorKind::Configuration => MessageKey::Misconfigured,
            ErrorKind::Policy => MessageKey::WeakPassword,
            ErrorKind::NotFound => MessageKey::NotInstalled,
            ErrorKind::Io => MessageKey::Unreadable,
        },
    }
}

/// Renders the end-user message for a failure.
#[must_use]
pub fn user_message(error: &LicenseError) -> String {
    match error {
        LicenseError::Validation(ValidationError::Custom(detail)) => {
            format!("{} {detail}", MessageKey::InvalidLicense.text())
        }
        _ => message_key(error).text().to_string(),
    }
}
