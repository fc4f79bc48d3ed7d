//! Reading and atomically replacing the datastore file.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::codec;
use super::lock::{DatastoreLock, LockMode};
use crate::types::collection::BookmarkCollection;
use crate::types::errors::StoreError;

/// Reports free space on the volume holding a directory.
pub trait DiskSpaceTrait: Send + Sync {
    fn available(&self, dir: &Path) -> io::Result<u64>;
}

/// Free space as reported by the operating system.
pub struct Fs2DiskSpace;

impl DiskSpaceTrait for Fs2DiskSpace {
    fn available(&self, dir: &Path) -> io::Result<u64> {
        fs2::available_space(dir)
    }
}

/// Writes the encoded payload into the temporary file.
pub trait PayloadSinkTrait: Send + Sync {
    fn write_payload(&self, file: &mut File, bytes: &[u8]) -> io::Result<()>;
}

/// Writes everything and flushes it to the device.
pub struct SyncedSink;

impl PayloadSinkTrait for SyncedSink {
    fn write_payload(&self, file: &mut File, bytes: &[u8]) -> io::Result<()> {
        file.write_all(bytes)?;
        file.sync_all()
    }
}

/// The datastore file and the policy used to write it.
pub struct DatastoreFile {
    path: PathBuf,
    margin: u64,
    disk: Arc<dyn DiskSpaceTrait>,
    sink: Arc<dyn PayloadSinkTrait>,
}

impl DatastoreFile {
    /// `margin` is the number of bytes that must stay free beyond the payload.
    pub fn new<P: Into<PathBuf>>(path: P, margin: u64) -> Self {
        Self {
            path: path.into(),
            margin,
            disk: Arc::new(Fs2DiskSpace),
            sink: Arc::new(SyncedSink),
        }
    }

    pub fn with_disk_space(mut self, disk: Arc<dyn DiskSpaceTrait>) -> Self {
        self.disk = disk;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn PayloadSinkTrait>) -> Self {
        self.sink = sink;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Reads and decodes the whole collection.
    ///
    /// A missing file is a first run and yields an empty collection. Anything
    /// unreadable or undecodable fails with `NotWritableDataStore`.
    pub fn load(&self) -> Result<BookmarkCollection, StoreError> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "No datastore yet, starting empty");
            return Ok(BookmarkCollection::new());
        }
        let _lock = DatastoreLock::acquire_or_warn(&self.path, LockMode::Shared);
        let bytes = fs::read(&self.path).map_err(|e| self.not_writable(e.to_string()))?;
        if bytes.is_empty() {
            warn!(path = %self.path.display(), "Datastore file is empty, starting empty");
            return Ok(BookmarkCollection::new());
        }
        let collection = codec::decode(&bytes).map_err(|e| self.not_writable(e.to_string()))?;
        debug!(
            path = %self.path.display(),
            bookmarks = collection.len(),
            "Loaded datastore"
        );
        Ok(collection)
    }

    /// Encodes `collection` and atomically replaces the file with it.
    ///
    /// Nothing on disk changes unless every step succeeds: the payload goes to
    /// a temporary sibling which is renamed over the old file last.
    /// Returns the number of bytes written.
    pub fn save(&self, collection: &BookmarkCollection) -> Result<u64, StoreError> {
        let dir = self.parent_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| self.not_writable(e.to_string()))?;
        }
        let existing = fs::metadata(&self.path).ok();
        if let Some(meta) = &existing {
            if meta.permissions().readonly() {
                return Err(self.not_writable("file is read-only".to_string()));
            }
        }

        let bytes = codec::encode(collection)?;
        let _lock = DatastoreLock::acquire_or_warn(&self.path, LockMode::Exclusive);

        let required = bytes.len() as u64 + self.margin;
        let available = self
            .disk
            .available(&dir)
            .map_err(|e| self.not_writable(format!("cannot read free space: {}", e)))?;
        if available <= required {
            warn!(
                path = %self.path.display(),
                required,
                available,
                "Refusing to save datastore: not enough disk space"
            );
            return Err(StoreError::NotEnoughSpace {
                path: self.path.clone(),
                required,
                available,
            });
        }

        let tmp = self.temp_path();
        if let Err(e) = self.write_temp(&tmp, &bytes, existing.as_ref()) {
            let _ = fs::remove_file(&tmp);
            return Err(self.not_writable(e.to_string()));
        }
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(self.not_writable(e.to_string()));
        }
        sync_dir(&dir);

        debug!(
            path = %self.path.display(),
            bytes = bytes.len(),
            bookmarks = collection.len(),
            "Saved datastore"
        );
        Ok(bytes.len() as u64)
    }

    fn write_temp(&self, tmp: &Path, bytes: &[u8], existing: Option<&fs::Metadata>) -> io::Result<()> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(tmp)?;
        if let Some(meta) = existing {
            file.set_permissions(meta.permissions())?;
        }
        self.sink.write_payload(&mut file, bytes)
    }

    fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "datastore".to_string());
        self.parent_dir()
            .join(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()))
    }

    fn not_writable(&self, reason: String) -> StoreError {
        StoreError::NotWritableDataStore {
            path: self.path.clone(),
            reason,
        }
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        warn!(path = %dir.display(), error = %e, "Failed to sync datastore directory");
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}
