//! Advisory lock serializing access to the datastore file across processes.
//!
//! The lock lives in a sibling `<datastore>.lock` file so that the datastore
//! itself can be replaced by rename while the lock is held.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, warn};

/// Lock mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Readers; any number may hold it at once.
    Shared,
    /// The single writer.
    Exclusive,
}

/// A held lock on a datastore; released when dropped.
pub struct DatastoreLock {
    file: File,
    path: PathBuf,
    mode: LockMode,
}

impl DatastoreLock {
    /// Path of the lock file guarding `datastore`.
    pub fn lock_path(datastore: &Path) -> PathBuf {
        let mut name = datastore
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        datastore.with_file_name(name)
    }

    /// Blocks until the lock on `datastore` is held in `mode`.
    pub fn acquire(datastore: &Path, mode: LockMode) -> io::Result<Self> {
        let path = Self::lock_path(datastore);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        match mode {
            LockMode::Shared => file.lock_shared()?,
            LockMode::Exclusive => file.lock_exclusive()?,
        }
        debug!(path = %path.display(), ?mode, "Acquired datastore lock");
        Ok(Self { file, path, mode })
    }

    /// Like [`acquire`](Self::acquire), but logs and returns `None` when the
    /// lock cannot be taken, e.g. in a read-only directory.
    pub fn acquire_or_warn(datastore: &Path, mode: LockMode) -> Option<Self> {
        match Self::acquire(datastore, mode) {
            Ok(lock) => Some(lock),
            Err(e) => {
                warn!(
                    path = %datastore.display(),
                    error = %e,
                    "Could not lock the datastore, continuing without a lock"
                );
                None
            }
        }
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }
}

impl Drop for DatastoreLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            warn!(path = %self.path.display(), error = %e, "Failed to release datastore lock");
        } else {
            debug!(path = %self.path.display(), "Released datastore lock");
        }
    }
}
