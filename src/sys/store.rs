use std::io;
use std::path::PathBuf;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store at {path:?} is unavailable: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("store is unavailable")]
    Unavailable,
}

/// Where repository snapshots live between runs.
pub trait PersistentStore: Send + Sync {
    fn write_snapshot(&self, bytes: &[u8]) -> Result<(), StoreError>;

    /// Returns `None` if nothing was ever written.
    fn read_snapshot(&self) -> Result<Option<Vec<u8>>, StoreError>;
}

/// Keeps the snapshot in a single file. Writes go through a temporary file
/// and a rename so a crash never leaves a half-written snapshot behind.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io { path: self.path.clone(), source }
    }
}

impl PersistentStore for FileStore {
    fn write_snapshot(&self, bytes: &[u8]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, bytes).map_err(|e| self.io_error(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;
        debug!(path = ?self.path, len = bytes.len(), "wrote snapshot");
        Ok(())
    }

    fn read_snapshot(&self) -> Result<Option<Vec<u8>>, StoreError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

/// An in-process store. Can be switched offline to simulate losing the
/// backing storage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    bytes: Mutex<Option<Vec<u8>>>,
    offline: Mutex<bool>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub fn set_offline(&self, offline: bool) { *self.offline.lock() = offline; }

    pub fn contents(&self) -> Option<Vec<u8>> { self.bytes.lock().clone() }
}

impl PersistentStore for MemoryStore {
    fn write_snapshot(&self, bytes: &[u8]) -> Result<(), StoreError> {
        if *self.offline.lock() {
            return Err(StoreError::Unavailable);
        }
        *self.bytes.lock() = Some(bytes.to_vec());
        Ok(())
    }

    fn read_snapshot(&self) -> Result<Option<Vec<u8>>, StoreError> {
        if *self.offline.lock() {
            return Err(StoreError::Unavailable);
        }
        Ok(self.bytes.lock().clone())
    }
}
