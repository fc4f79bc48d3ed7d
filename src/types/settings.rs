use serde::{Deserialize, Serialize};

use crate::platform;

/// Default margin kept free on the datastore volume when saving (500 KiB).
pub const DEFAULT_DISK_SPACE_MARGIN: u64 = 500 * 1024;

/// Datastore configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreSettings {
    /// Path of the single datastore file.
    pub datastore_path: String,
    /// Bytes that must remain free beyond the payload size for a save to proceed.
    pub disk_space_margin_bytes: u64,
    /// Separator used when tags are exchanged as a single string.
    pub tags_separator: String,
    /// Hide every bookmark from logged-out callers.
    pub hide_public_links: bool,
    /// Default page size of listings.
    pub links_per_page: usize,
    /// Offset from UTC, in minutes, of the local day used by day listings.
    pub day_offset_minutes: i32,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            datastore_path: platform::get_data_dir()
                .join("datastore.json")
                .to_string_lossy()
                .to_string(),
            disk_space_margin_bytes: DEFAULT_DISK_SPACE_MARGIN,
            tags_separator: " ".to_string(),
            hide_public_links: false,
            links_per_page: 20,
            day_offset_minutes: 0,
        }
    }
}

impl StoreSettings {
    /// Settings pointing at the given datastore file, everything else default.
    pub fn with_datastore<P: Into<String>>(path: P) -> Self {
        Self {
            datastore_path: path.into(),
            ..Self::default()
        }
    }
}
