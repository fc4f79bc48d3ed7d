//! Unit tests for the datastore file layer: load, atomic save, preconditions
//! and corruption detection, against real files in a temporary directory.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use fs2::FileExt;
use tempfile::TempDir;

use shaare_store::datastore::{
    decode, encode, DatastoreFile, DatastoreLock, DiskSpaceTrait, PayloadSinkTrait,
};
use shaare_store::types::bookmark::BookmarkDraft;
use shaare_store::types::collection::BookmarkCollection;
use shaare_store::types::errors::StoreError;

struct FixedSpace(u64);

impl DiskSpaceTrait for FixedSpace {
    fn available(&self, _dir: &Path) -> io::Result<u64> {
        Ok(self.0)
    }
}

struct FailingSpace;

impl DiskSpaceTrait for FailingSpace {
    fn available(&self, _dir: &Path) -> io::Result<u64> {
        Err(io::Error::new(io::ErrorKind::Other, "statvfs failed"))
    }
}

/// Writes half of the payload, then fails as a full disk would.
struct DiskFullHalfway;

impl PayloadSinkTrait for DiskFullHalfway {
    fn write_payload(&self, file: &mut File, bytes: &[u8]) -> io::Result<()> {
        file.write_all(&bytes[..bytes.len() / 2])?;
        Err(io::Error::new(io::ErrorKind::Other, "No space left on device"))
    }
}

fn collection(n: usize) -> BookmarkCollection {
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
    let mut c = BookmarkCollection::new();
    for i in 0..n {
        c.insert_draft(
            BookmarkDraft::new(&format!("https://example.org/{}", i), &format!("Page {}", i))
                .with_tags(["web", "ref"]),
            now,
        );
    }
    c
}

fn store_path(dir: &TempDir) -> PathBuf {
    dir.path().join("datastore.json")
}

fn roomy(path: &Path) -> DatastoreFile {
    DatastoreFile::new(path, 500 * 1024).with_disk_space(Arc::new(FixedSpace(u64::MAX)))
}

fn temp_files(dir: &TempDir) -> Vec<String> {
    fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .filter(|n| n.ends_with(".tmp"))
        .collect()
}

/// A datastore that does not exist yet is a first run, not an error.
#[test]
fn test_missing_file_is_empty_collection() {
    let dir = TempDir::new().unwrap();
    let loaded = roomy(&store_path(&dir)).load().unwrap();
    assert!(loaded.is_empty());
    assert_eq!(loaded.next_id, 1);
}

#[test]
fn test_save_and_reload() {
    let dir = TempDir::new().unwrap();
    let file = roomy(&store_path(&dir));
    let c = collection(5);
    let written = file.save(&c).unwrap();
    assert_eq!(written, fs::metadata(file.path()).unwrap().len());
    assert_eq!(file.load().unwrap(), c);
}

/// Free space below payload plus margin fails before anything is written.
#[test]
fn test_not_enough_space_leaves_file_unchanged() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    roomy(&path).save(&collection(2)).unwrap();
    let before = fs::read(&path).unwrap();

    let cramped = DatastoreFile::new(&path, 500 * 1024).with_disk_space(Arc::new(FixedSpace(100)));
    let err = cramped.save(&collection(3)).unwrap_err();
    match err {
        StoreError::NotEnoughSpace { path: p, required, available } => {
            assert_eq!(p, path);
            assert!(required > 500 * 1024);
            assert_eq!(available, 100);
        }
        other => panic!("expected NotEnoughSpace, got {:?}", other),
    }
    assert_eq!(fs::read(&path).unwrap(), before);
    assert!(temp_files(&dir).is_empty());
}

#[test]
fn test_free_space_equal_to_requirement_is_not_enough() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    let c = collection(1);
    let required = encode(&c).unwrap().len() as u64 + 10;
    let exact = DatastoreFile::new(&path, 10).with_disk_space(Arc::new(FixedSpace(required)));
    assert!(matches!(exact.save(&c), Err(StoreError::NotEnoughSpace { .. })));
    let enough = DatastoreFile::new(&path, 10).with_disk_space(Arc::new(FixedSpace(required + 1)));
    assert!(enough.save(&c).is_ok());
}

#[test]
fn test_unknown_free_space_is_not_writable() {
    let dir = TempDir::new().unwrap();
    let file = DatastoreFile::new(store_path(&dir), 0).with_disk_space(Arc::new(FailingSpace));
    assert!(matches!(
        file.save(&collection(1)),
        Err(StoreError::NotWritableDataStore { .. })
    ));
}

/// A write that dies halfway leaves the previous file byte-identical.
#[test]
fn test_failure_mid_write_keeps_previous_file() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    roomy(&path).save(&collection(3)).unwrap();
    let before = fs::read(&path).unwrap();

    let failing = roomy(&path).with_sink(Arc::new(DiskFullHalfway));
    let err = failing.save(&collection(10)).unwrap_err();
    assert!(matches!(err, StoreError::NotWritableDataStore { .. }));
    assert_eq!(fs::read(&path).unwrap(), before);
    assert!(temp_files(&dir).is_empty());
    assert_eq!(roomy(&path).load().unwrap(), collection(3));
}

/// Dropping the trailing half of the file is detected on load.
#[test]
fn test_truncated_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    roomy(&path).save(&collection(4)).unwrap();
    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

    match roomy(&path).load() {
        Err(StoreError::NotWritableDataStore { path: p, .. }) => assert_eq!(p, path),
        other => panic!("expected NotWritableDataStore, got {:?}", other),
    }
}

#[test]
fn test_garbage_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    fs::write(&path, b"<?php /* not a datastore */ ?>\n").unwrap();
    assert!(matches!(
        roomy(&path).load(),
        Err(StoreError::NotWritableDataStore { .. })
    ));
}

#[test]
fn test_read_only_file_is_not_writable() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    roomy(&path).save(&collection(1)).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_readonly(true);
    fs::set_permissions(&path, perms).unwrap();

    assert!(matches!(
        roomy(&path).save(&collection(2)),
        Err(StoreError::NotWritableDataStore { .. })
    ));
}

/// The encode step refuses records that are not persistable.
#[test]
fn test_invalid_record_never_reaches_disk() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    let mut c = collection(2);
    if let Some(b) = c.bookmarks.get_mut(&2) {
        b.created = None;
    }
    assert!(matches!(roomy(&path).save(&c), Err(StoreError::InvalidBookmark(_))));
    assert!(!path.exists());
}

#[test]
fn test_lock_is_released_after_save() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    roomy(&path).save(&collection(1)).unwrap();

    let lock_file = File::open(DatastoreLock::lock_path(&path)).unwrap();
    assert!(lock_file.try_lock_exclusive().is_ok());
    lock_file.unlock().unwrap();
}

#[cfg(unix)]
#[test]
fn test_save_keeps_file_mode() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    roomy(&path).save(&collection(1)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();
    roomy(&path).save(&collection(2)).unwrap();
    assert_eq!(fs::metadata(&path).unwrap().permissions().mode() & 0o777, 0o600);
}

#[test]
fn test_codec_is_deterministic() {
    let c = collection(3);
    assert_eq!(encode(&c).unwrap(), encode(&c).unwrap());
    assert_eq!(decode(&encode(&c).unwrap()).unwrap(), c);
}
