//! Scoped access to password characters.
//!
//! A [`Password`] owns a mutable character buffer which is zero-filled when
//! it is erased or dropped. Passwords are handed out by a
//! [`PasswordProtection`] for a single [`PasswordUsage`], so that policy
//! checks apply only where new protected material gets created.

use std::fmt;
use std::sync::Arc;

use zeroize::{Zeroize, Zeroizing};

use crate::error::{CryptoError, CryptoResult};
use crate::policy::PasswordPolicy;

/// What a password is about to be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PasswordUsage {
    /// Decrypting or verifying existing material.
    Read,
    /// Encrypting or signing new material.
    Write,
}

/// A mutable password buffer which gets erased on drop.
pub struct Password {
    chars: Vec<char>,
}

impl Password {
    /// Takes ownership of the given characters.
    pub fn new(chars: Vec<char>) -> Self {
        Self { chars }
    }

    /// Returns the password characters.
    pub fn characters(&self) -> &[char] {
        &self.chars
    }

    /// Returns the number of characters.
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    /// Returns true if the password has no characters.
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Returns the UTF-8 encoding of the password in a buffer which is
    /// zeroized on drop.
    pub fn utf8(&self) -> Zeroizing<Vec<u8>> {
        let mut bytes = Zeroizing::new(Vec::with_capacity(self.chars.len() * 4));
        let mut buf = [0u8; 4];
        for c in &self.chars {
            bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
        }
        buf.zeroize();
        bytes
    }

    /// Fills the buffer with zero characters. Calling this again is harmless.
    pub fn erase(&mut self) {
        self.chars.as_mut_slice().zeroize();
    }

    /// Returns true if every character of the buffer is zero.
    pub fn is_erased(&self) -> bool {
        self.chars.iter().all(|c| *c == '\0')
    }
}

impl From<&str> for Password {
    fn from(s: &str) -> Self {
        Self::new(s.chars().collect())
    }
}

impl Drop for Password {
    fn drop(&mut self) {
        self.erase();
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Password")
            .field("chars", &"[REDACTED]")
            .finish()
    }
}

/// Hands out passwords on demand.
pub trait PasswordProtection: Send + Sync {
    /// Returns a fresh password for the given usage.
    ///
    /// The caller owns the returned buffer and must let it drop (or erase
    /// it) as soon as it is no longer needed.
    fn password(&self, usage: PasswordUsage) -> CryptoResult<Password>;
}

impl<P: PasswordProtection + ?Sized> PasswordProtection for Arc<P> {
    fn password(&self, usage: PasswordUsage) -> CryptoResult<Password> {
        (**self).password(usage)
    }
}

/// Runs `f` with a password obtained from `protection` and erases the
/// password afterwards, whatever the outcome.
pub fn with_password<P, T, E, F>(protection: &P, usage: PasswordUsage, f: F) -> Result<T, E>
where
    P: PasswordProtection + ?Sized,
    E: From<CryptoError>,
    F: FnOnce(&Password) -> Result<T, E>,
{
    let mut password = protection.password(usage)?;
    use_then_erase(&mut password, f)
}

fn use_then_erase<T, E, F>(password: &mut Password, f: F) -> Result<T, E>
where
    F: FnOnce(&Password) -> Result<T, E>,
{
    let result = f(password);
    password.erase();
    result
}

/// A protection which keeps a copy of a fixed secret in memory.
#[derive(Clone)]
pub struct StaticPasswordProtection {
    secret: Zeroizing<Vec<char>>,
}

impl StaticPasswordProtection {
    /// Creates a protection for the given secret.
    pub fn new(secret: &str) -> Self {
        Self {
            secret: Zeroizing::new(secret.chars().collect()),
        }
    }
}

impl PasswordProtection for StaticPasswordProtection {
    fn password(&self, _usage: PasswordUsage) -> CryptoResult<Password> {
        Ok(Password::new(self.secret.to_vec()))
    }
}

impl fmt::Debug for StaticPasswordProtection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticPasswordProtection")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Decorates a protection with a password policy which gets checked
/// whenever a password is requested for [`PasswordUsage::Write`].
pub struct CheckedPasswordProtection {
    inner: Arc<dyn PasswordProtection>,
    policy: Arc<dyn PasswordPolicy>,
}

impl CheckedPasswordProtection {
    pub fn new(inner: Arc<dyn PasswordProtection>, policy: Arc<dyn PasswordPolicy>) -> Self {
        Self { inner, policy }
    }
}

impl PasswordProtection for CheckedPasswordProtection {
    fn password(&self, usage: PasswordUsage) -> CryptoResult<Password> {
        let password = self.inner.password(usage)?;
        if usage == PasswordUsage::Write {
            // On rejection the password drops here and gets erased.
            self.policy.check(&password)?;
        }
        Ok(password)
    }
}
