//! Exclusive lock on the user-data directory.
//!
//! Uses `fs2` for cross-platform file locking (flock on Unix, LockFile on
//! Windows). Every read-modify-write of the key or vault file happens while
//! a [`VaultLock`] is alive.

use crate::config::VaultConfig;
use crate::error::{Error, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Held lock on `<data_dir>/.lock`; released on drop.
#[derive(Debug)]
pub struct VaultLock {
    file: File,
    path: PathBuf,
}

impl VaultLock {
    /// Block until the directory lock is acquired, creating the directory
    /// if needed.
    pub fn acquire(config: &VaultConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir).map_err(|e| Error::io(&config.data_dir, e))?;
        let path = config.lock_path();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| Error::io(&path, e))?;
        file.lock_exclusive().map_err(|e| Error::io(&path, e))?;
        log::trace!("Acquired vault lock {}", path.display());
        Ok(Self { file, path })
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for VaultLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            log::warn!("Failed to release vault lock {}: {}", self.path.display(), e);
        }
    }
}
