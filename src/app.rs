//! App core.
//!
//! Composition root holding the settings engine and the bookmark store built from it.

use tracing::info;

use crate::managers::bookmark_manager::BookmarkService;
use crate::services::settings_engine::{SettingsEngine, SettingsEngineTrait};
use crate::types::settings::StoreSettings;

/// Settings keys whose change requires reopening the store.
const STORE_KEYS: [&str; 5] = [
    "datastore_path",
    "disk_space_margin_bytes",
    "tags_separator",
    "hide_public_links",
    "day_offset_minutes",
];

/// Central application struct.
pub struct App {
    pub settings_engine: SettingsEngine,
    pub store: BookmarkService,
}

impl App {
    /// Loads settings and opens the datastore they point at.
    ///
    /// Fails when the config file is malformed or the datastore exists but
    /// cannot be decoded: starting empty on top of an unreadable store would
    /// overwrite it on the next save.
    pub fn new(config_path: Option<String>) -> Result<Self, Box<dyn std::error::Error>> {
        let mut settings_engine = SettingsEngine::new(config_path);
        let settings = settings_engine.load()?;
        let store = BookmarkService::open(&settings)?;
        info!(
            config = settings_engine.get_config_path(),
            datastore = %settings.datastore_path,
            "Application started"
        );
        Ok(Self {
            settings_engine,
            store,
        })
    }

    pub fn settings(&self) -> &StoreSettings {
        self.settings_engine.get_settings()
    }

    /// Whether changing `key` requires reopening the store.
    pub fn affects_store(key: &str) -> bool {
        STORE_KEYS.contains(&key)
    }

    /// Sets one setting, reopening the store when the key affects it.
    ///
    /// The store is opened from the candidate settings before anything is
    /// saved. If that fails, the settings, the config file and the running
    /// store are left as they were.
    pub fn update_setting(
        &mut self,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let candidate = self.settings_engine.preview_value(key, value)?;
        let reopened = if Self::affects_store(key) {
            Some(BookmarkService::open(&candidate)?)
        } else {
            None
        };
        self.settings_engine.apply(candidate)?;
        if let Some(store) = reopened {
            self.store = store;
            info!(datastore = %self.settings().datastore_path, "Store reopened");
        }
        Ok(())
    }
}
