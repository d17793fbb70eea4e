//! Whole-process run lock for batch runs.
//!
//! An advisory exclusive lock on a file. The lock is held for as long as
//! the [`RunLock`] lives and released when it is dropped, including on
//! early returns and errors. The file itself is left in place.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;

/// Errors from taking the run lock.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// The lock file could not be opened or locked.
    #[error("cannot lock {}: {source}", path.display())]
    Io {
        /// The lock file path.
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A held run lock.
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Try to take the lock without waiting.
    ///
    /// Returns `Ok(None)` when another process holds it.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Io`] if the lock file cannot be opened or
    /// locking fails for a reason other than contention.
    pub fn try_acquire(path: &Path) -> Result<Option<Self>, LockError> {
        let io_error = |source| LockError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(io_error)?;

        match file.try_lock_exclusive() {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                log::debug!("run lock {} is held by another process", path.display());
                return Ok(None);
            }
            Err(e) => return Err(io_error(e)),
        }

        // Informational only; the advisory lock is what excludes others.
        file.set_len(0).map_err(io_error)?;
        writeln!(
            file,
            "locked at {} by pid {}",
            chrono::Utc::now().to_rfc3339(),
            std::process::id()
        )
        .map_err(io_error)?;

        log::debug!("acquired run lock {}", path.display());
        Ok(Some(Self {
            file,
            path: path.to_path_buf(),
        }))
    }

    /// The lock file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            log::warn!("failed to release run lock {}: {e}", self.path.display());
        }
    }
}
