use std::fmt;
use std::path::PathBuf;

// === InvalidBookmarkReport ===

/// Operator-facing dump of a record that failed validation.
///
/// The rendered text is stable so that it can be compared against a
/// corrupted store when debugging.
#[derive(Debug, Clone, PartialEq)]
pub enum InvalidBookmarkReport {
    /// The value had the shape of a bookmark but failed a field check.
    Record {
        id: Option<u64>,
        title: String,
        url: String,
        short_code: String,
        /// RFC 3339 instant, empty when missing, or `Not a DateTime object`.
        created: String,
    },
    /// The value was not bookmark-shaped at all; holds a dump of the raw input.
    NotABookmark(String),
}

impl fmt::Display for InvalidBookmarkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidBookmarkReport::Record {
                id,
                title,
                url,
                short_code,
                created,
            } => {
                let id = id.map(|v| v.to_string()).unwrap_or_default();
                writeln!(f, "This bookmark is not valid")?;
                writeln!(f, " - ID: {}", id)?;
                writeln!(f, " - Title: {}", title)?;
                writeln!(f, " - Url: {}", url)?;
                writeln!(f, " - ShortUrl: {}", short_code)?;
                writeln!(f, " - Created: {}", created)
            }
            InvalidBookmarkReport::NotABookmark(raw) => {
                writeln!(f, "The provided data is not a bookmark")?;
                write!(f, "{}", raw)
            }
        }
    }
}

// === StoreError ===

/// Errors surfaced by the bookmark datastore.
#[derive(Debug)]
pub enum StoreError {
    /// No bookmark matches the given id or short code (or it is hidden from the caller).
    BookmarkNotFound(String),
    /// The record is not persistable.
    InvalidBookmark(InvalidBookmarkReport),
    /// Another bookmark already uses this URL.
    DuplicateUrl { url: String, existing_id: u64 },
    /// The request context is not allowed to perform the operation.
    Unauthorized(String),
    /// Free space at the destination does not cover the payload plus the safety margin.
    NotEnoughSpace {
        path: PathBuf,
        required: u64,
        available: u64,
    },
    /// The datastore file could not be read, parsed or written.
    NotWritableDataStore { path: PathBuf, reason: String },
    /// Encoding produced data that failed the pre-write self-check.
    InvalidWritableData(String),
    /// The request parameters are malformed.
    InvalidRequest(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::BookmarkNotFound(id) => write!(f, "Bookmark not found: {}", id),
            StoreError::InvalidBookmark(report) => write!(f, "{}", report),
            StoreError::DuplicateUrl { url, existing_id } => write!(
                f,
                "Duplicate bookmark URL: {} (already stored as #{})",
                url, existing_id
            ),
            StoreError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            StoreError::NotEnoughSpace {
                path,
                required,
                available,
            } => write!(
                f,
                "Not enough available disk space to save the datastore \"{}\" ({} bytes required, {} available).",
                path.display(),
                required,
                available
            ),
            StoreError::NotWritableDataStore { path, reason } => write!(
                f,
                "Couldn't load data from the data store file \"{}\". Your data might be corrupted, or your file isn't readable. ({})",
                path.display(),
                reason
            ),
            StoreError::InvalidWritableData(msg) => write!(
                f,
                "Couldn't generate bookmark data to store in the datastore. Skipping file writing. ({})",
                msg
            ),
            StoreError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl StoreError {
    /// True for the negative-lookup case, which callers usually recover from locally.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::BookmarkNotFound(_))
    }
}

// === SettingsError ===

/// Errors related to settings management.
#[derive(Debug)]
pub enum SettingsError {
    /// An I/O error occurred while reading or writing settings.
    IoError(String),
    /// Failed to serialize or deserialize settings.
    SerializationError(String),
    /// The provided settings key is invalid.
    InvalidKey(String),
    /// The provided settings value is invalid.
    InvalidValue(String),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::IoError(msg) => write!(f, "Settings I/O error: {}", msg),
            SettingsError::SerializationError(msg) => {
                write!(f, "Settings serialization error: {}", msg)
            }
            SettingsError::InvalidKey(key) => write!(f, "Invalid settings key: {}", key),
            SettingsError::InvalidValue(msg) => {
                write!(f, "Invalid settings value: {}", msg)
            }
        }
    }
}

impl std::error::Error for SettingsError {}
