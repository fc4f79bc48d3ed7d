use std::path::PathBuf;

use shaare_store::types::bookmark::Bookmark;
use shaare_store::types::errors::*;
use serde_json::json;

// === StoreError Tests ===

#[test]
fn store_error_not_found_display() {
    let err = StoreError::BookmarkNotFound("42".to_string());
    assert_eq!(err.to_string(), "Bookmark not found: 42");
    assert!(err.is_not_found());
}

#[test]
fn store_error_not_enough_space_names_path_and_sizes() {
    let err = StoreError::NotEnoughSpace {
        path: PathBuf::from("/data/datastore.json"),
        required: 600_000,
        available: 1_000,
    };
    let text = err.to_string();
    assert!(text.starts_with("Not enough available disk space to save the datastore"));
    assert!(text.contains("/data/datastore.json"));
    assert!(text.contains("600000 bytes required"));
    assert!(!err.is_not_found());
}

#[test]
fn store_error_not_writable_names_path() {
    let err = StoreError::NotWritableDataStore {
        path: PathBuf::from("/data/datastore.json"),
        reason: "checksum mismatch".to_string(),
    };
    let text = err.to_string();
    assert!(text.contains("Couldn't load data from the data store file \"/data/datastore.json\""));
    assert!(text.ends_with("(checksum mismatch)"));
}

#[test]
fn store_error_invalid_writable_data_display() {
    let err = StoreError::InvalidWritableData("empty".to_string());
    assert_eq!(
        err.to_string(),
        "Couldn't generate bookmark data to store in the datastore. Skipping file writing. (empty)"
    );
}

#[test]
fn store_error_duplicate_url_display() {
    let err = StoreError::DuplicateUrl {
        url: "https://x".to_string(),
        existing_id: 3,
    };
    assert_eq!(
        err.to_string(),
        "Duplicate bookmark URL: https://x (already stored as #3)"
    );
}

#[test]
fn store_error_implements_error_trait() {
    let err: Box<dyn std::error::Error> = Box::new(StoreError::Unauthorized("add".to_string()));
    assert!(err.source().is_none());
    assert_eq!(err.to_string(), "Unauthorized: add");
}

// === InvalidBookmarkReport Tests ===

#[test]
fn invalid_bookmark_report_is_verbatim() {
    let report = InvalidBookmarkReport::Record {
        id: Some(7),
        title: "Title".to_string(),
        url: "https://example.org".to_string(),
        short_code: "abcdef".to_string(),
        created: String::new(),
    };
    assert_eq!(
        StoreError::InvalidBookmark(report).to_string(),
        "This bookmark is not valid\n - ID: 7\n - Title: Title\n - Url: https://example.org\n - ShortUrl: abcdef\n - Created: \n"
    );
}

#[test]
fn invalid_bookmark_report_for_non_record_dumps_raw_input() {
    let err = Bookmark::from_value(&json!("just a string")).unwrap_err();
    assert_eq!(
        err.to_string(),
        "The provided data is not a bookmark\n\"just a string\""
    );
}

#[test]
fn invalid_bookmark_report_for_missing_created() {
    let err = Bookmark::from_value(&json!({"id": 1, "title": "T", "url": "https://t"})).unwrap_err();
    let text = err.to_string();
    assert!(text.contains(" - ID: 1\n"));
    assert!(text.contains(" - Url: https://t\n"));
    assert!(text.ends_with(" - Created: \n"));
}

// === SettingsError Tests ===

#[test]
fn settings_error_display_variants() {
    assert_eq!(
        SettingsError::IoError("disk".to_string()).to_string(),
        "Settings I/O error: disk"
    );
    assert_eq!(
        SettingsError::SerializationError("eof".to_string()).to_string(),
        "Settings serialization error: eof"
    );
    assert_eq!(
        SettingsError::InvalidKey("nope".to_string()).to_string(),
        "Invalid settings key: nope"
    );
    assert_eq!(
        SettingsError::InvalidValue("bad".to_string()).to_string(),
        "Invalid settings value: bad"
    );
}
