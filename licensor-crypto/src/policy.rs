//! Password strength policies.

use crate::error::{CryptoError, CryptoResult};
use crate::secret::Password;

/// Checks a password before it is used to protect new material.
pub trait PasswordPolicy: Send + Sync {
    /// Returns an error if the password is too weak.
    fn check(&self, password: &Password) -> CryptoResult<()>;
}

/// Minimum length of a password accepted by [`MinimumPasswordPolicy`].
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Requires at least eight characters including letters and digits.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinimumPasswordPolicy;

impl PasswordPolicy for MinimumPasswordPolicy {
    fn check(&self, password: &Password) -> CryptoResult<()> {
        let chars = password.characters();
        if chars.len() < MIN_PASSWORD_LENGTH {
            return Err(CryptoError::WeakPassword(format!(
                "must have at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }
        let has_letter = chars.iter().any(|c| c.is_alphabetic());
        let has_digit = chars.iter().any(|c| c.is_numeric());
        if !has_letter || !has_digit {
            return Err(CryptoError::WeakPassword(
                "must contain both letters and digits".to_string(),
            ));
        }
        Ok(())
    }
}

/// Accepts every password. Meant for tests and migration tooling.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissivePasswordPolicy;

impl PasswordPolicy for PermissivePasswordPolicy {
    fn check(&self, _password: &Password) -> CryptoResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(s: &str) -> CryptoResult<()> {
        MinimumPasswordPolicy.check(&Password::from(s))
    }

    #[test]
    fn accepts_letters_and_digits() {
        assert!(check("test1234").is_ok());
        assert!(check("Ünïcödé9").is_ok());
    }

    #[test]
    fn rejects_short() {
        assert!(check("abc123").is_err());
        assert!(check("").is_err());
    }

    #[test]
    fn rejects_letters_only() {
        assert!(check("abcdefghij").is_err());
    }

    #[test]
    fn rejects_digits_only() {
        assert!(check("1234567890").is_err());
    }

    #[test]
    fn permissive_accepts_anything() {
        assert!(PermissivePasswordPolicy.check(&Password::from("")).is_ok());
    }
}
