//! Sources of cryptographically secure random bytes.

use arc_swap::ArcSwap;
use getrandom::fill as fill_random;
use std::fmt;
use std::io::{self, Read};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Errors produced while drawing random bytes.
#[derive(Debug, Error)]
pub enum RandomError {
    #[error("platform entropy source unavailable: {0}")]
    Unavailable(String),
    #[error("random source read failed: {0}")]
    Read(#[from] io::Error),
}

/// A source of secure random bytes.
///
/// A failed fill is an ordinary, recoverable condition: callers must discard
/// whatever was written into `dest`.
pub trait RandomSource: Send + Sync + fmt::Debug {
    fn fill(&self, dest: &mut [u8]) -> Result<(), RandomError>;
}

/// The operating system CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill(&self, dest: &mut [u8]) -> Result<(), RandomError> {
        fill_random(dest).map_err(|err| RandomError::Unavailable(err.to_string()))
    }
}

/// Adapts any [`Read`] into a random source. Every fill must be satisfied
/// completely; a short read or EOF is reported as an error.
pub struct ReaderRandom<R> {
    reader: Mutex<R>,
}

impl<R> ReaderRandom<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: Mutex::new(reader),
        }
    }
}

impl<R> fmt::Debug for ReaderRandom<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderRandom").finish_non_exhaustive()
    }
}

impl<R: Read + Send> RandomSource for ReaderRandom<R> {
    fn fill(&self, dest: &mut [u8]) -> Result<(), RandomError> {
        let mut reader = self.reader.lock().unwrap_or_else(PoisonError::into_inner);
        reader.read_exact(dest)?;
        Ok(())
    }
}

/// Random source whose backing source can be replaced after it has been
/// handed out. Every fill reads the current override, falling back to
/// [`OsRandom`] when none is set.
pub struct ConfiguredRandom {
    source: ArcSwap<Option<Arc<dyn RandomSource>>>,
}

impl ConfiguredRandom {
    #[must_use]
    pub fn new() -> Self {
        Self {
            source: ArcSwap::from_pointee(None),
        }
    }

    pub fn set(&self, source: Arc<dyn RandomSource>) {
        self.source.store(Arc::new(Some(source)));
    }

    #[must_use]
    pub fn is_overridden(&self) -> bool {
        self.source.load().is_some()
    }
}

impl Default for ConfiguredRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConfiguredRandom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let current = self.source.load();
        match &**current {
            Some(source) => f.debug_tuple("ConfiguredRandom").field(source).finish(),
            None => f.debug_tuple("ConfiguredRandom").field(&OsRandom).finish(),
        }
    }
}

impl RandomSource for ConfiguredRandom {
    fn fill(&self, dest: &mut [u8]) -> Result<(), RandomError> {
        let current = self.source.load();
        match &**current {
            Some(source) => source.fill(dest),
            None => OsRandom.fill(dest),
        }
    }
}
