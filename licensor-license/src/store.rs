//! Persistence of license keys.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{LicenseError, LicenseResult};

/// A readable blob of bytes.
pub trait Source: Send + Sync {
    /// Reads the whole content. Fails with [`LicenseError::NotInstalled`] if
    /// there is none.
    fn content(&self) -> LicenseResult<Vec<u8>>;
}

/// A readable and writable blob of bytes.
pub trait Store: Source {
    /// Replaces the content. Readers observe either the old or the new
    /// content, never a mix.
    fn set_content(&self, content: &[u8]) -> LicenseResult<()>;

    /// Deletes the content. Fails with [`LicenseError::NotInstalled`] if
    /// there is none.
    fn delete(&self) -> LicenseResult<()>;

    fn exists(&self) -> LicenseResult<bool>;

    /// Returns the content length, if known.
    fn size(&self) -> LicenseResult<Option<u64>> {
        Ok(None)
    }
}

impl<S: Source + ?Sized> Source for Arc<S> {
    fn content(&self) -> LicenseResult<Vec<u8>> {
        (**self).content()
    }
}

impl<S: Store + ?Sized> Store for Arc<S> {
    fn set_content(&self, content: &[u8]) -> LicenseResult<()> {
        (**self).set_content(content)
    }

    fn delete(&self) -> LicenseResult<()> {
        (**self).delete()
    }

    fn exists(&self) -> LicenseResult<bool> {
        (**self).exists()
    }

    fn size(&self) -> LicenseResult<Option<u64>> {
        (**self).size()
    }
}

impl Source for [u8] {
    fn content(&self) -> LicenseResult<Vec<u8>> {
        Ok(self.to_vec())
    }
}

impl Source for Vec<u8> {
    fn content(&self) -> LicenseResult<Vec<u8>> {
        Ok(self.clone())
    }
}

/// Keeps the content in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    content: RwLock<Option<Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content(content: Vec<u8>) -> Self {
        Self {
            content: RwLock::new(Some(content)),
        }
    }
}

impl Source for MemoryStore {
    fn content(&self) -> LicenseResult<Vec<u8>> {
        self.content
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(LicenseError::NotInstalled)
    }
}

impl Store for MemoryStore {
    fn set_content(&self, content: &[u8]) -> LicenseResult<()> {
        *self.content.write().unwrap_or_else(PoisonError::into_inner) = Some(content.to_vec());
        Ok(())
    }

    fn delete(&self) -> LicenseResult<()> {
        self.content
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .map(|_| ())
            .ok_or(LicenseError::NotInstalled)
    }

    fn exists(&self) -> LicenseResult<bool> {
        Ok(self
            .content
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some())
    }

    fn size(&self) -> LicenseResult<Option<u64>> {
        Ok(self
            .content
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|c| c.len() as u64))
    }
}

/// Keeps the content in a file.
///
/// Writes go to a temporary file in the same directory which then replaces
/// the target, so a crash never leaves a half written key behind.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// A store for the given subject in the user's configuration directory.
    pub fn user_config(subject: &str) -> LicenseResult<Self> {
        let dir = dirs::config_dir().ok_or_else(|| {
            LicenseError::Configuration("no user configuration directory".into())
        })?;
        Ok(Self::new(dir.join("licensor").join(file_name(subject))))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn file_name(subject: &str) -> String {
    let stem: String = subject
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{stem}.lic")
}

fn not_found_as_not_installed(e: io::Error) -> LicenseError {
    if e.kind() == io::ErrorKind::NotFound {
        LicenseError::NotInstalled
    } else {
        LicenseError::Io(e)
    }
}

impl Source for FileStore {
    fn content(&self) -> LicenseResult<Vec<u8>> {
        fs::read(&self.path).map_err(not_found_as_not_installed)
    }
}

impl Store for FileStore {
    fn set_content(&self, content: &[u8]) -> LicenseResult<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;
        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(content)?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| LicenseError::Io(e.error))?;
        debug!(store = %self.path.display(), len = content.len(), "Wrote license key");
        Ok(())
    }

    fn delete(&self) -> LicenseResult<()> {
        fs::remove_file(&self.path).map_err(not_found_as_not_installed)?;
        debug!(store = %self.path.display(), "Deleted license key");
        Ok(())
    }

    fn exists(&self) -> LicenseResult<bool> {
        Ok(self.path.try_exists()?)
    }

    fn size(&self) -> LicenseResult<Option<u64>> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
