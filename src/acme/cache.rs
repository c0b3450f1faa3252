use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::AcmeError;

/// Persistent storage for issued certificate bundles, keyed by host name.
pub trait CertCache: Send + Sync + fmt::Debug {
    fn get(&self, name: &str) -> Result<Option<Vec<u8>>, AcmeError>;
    fn put(&self, name: &str, data: &[u8]) -> Result<(), AcmeError>;
    fn delete(&self, name: &str) -> Result<(), AcmeError>;
}

/// Certificate cache backed by one file per entry in a private directory.
#[derive(Debug, Clone)]
pub struct DirCache {
    dir: PathBuf,
}

impl DirCache {
    /// Open `dir`, creating it (mode 0700 on unix) if needed.
    pub fn create(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        builder.create(&dir)?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, name: &str) -> Result<PathBuf, AcmeError> {
        let valid = !name.is_empty()
            && !name.starts_with('.')
            && name
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_' | '+'));
        if !valid {
            return Err(AcmeError::InvalidCacheKey(name.to_string()));
        }
        Ok(self.dir.join(name))
    }
}

impl CertCache for DirCache {
    fn get(&self, name: &str) -> Result<Option<Vec<u8>>, AcmeError> {
        let path = self.entry_path(name)?;
        match fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Write through a private (0600) staging file in the cache directory and
    /// rename it into place. The staging file is removed if any step fails.
    fn put(&self, name: &str, data: &[u8]) -> Result<(), AcmeError> {
        let path = self.entry_path(name)?;

        let mut staging = tempfile::Builder::new()
            .prefix(&format!(".{name}."))
            .suffix(".tmp")
            .tempfile_in(&self.dir)?;
        staging.write_all(data)?;
        staging.as_file().sync_all()?;

        staging.persist(&path).map_err(|err| err.error)?;
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<(), AcmeError> {
        let path = self.entry_path(name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
