// Settings Engine
// Loads, saves, updates and resets the datastore configuration.
// Settings are stored as a pretty JSON file at the platform-specific config path.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::platform;
use crate::types::errors::SettingsError;
use crate::types::settings::StoreSettings;

/// Trait defining the settings engine interface.
pub trait SettingsEngineTrait {
    fn load(&mut self) -> Result<StoreSettings, SettingsError>;
    fn save(&self) -> Result<(), SettingsError>;
    fn get_settings(&self) -> &StoreSettings;
    fn set_value(&mut self, key: &str, value: serde_json::Value) -> Result<(), SettingsError>;
    fn preview_value(
        &self,
        key: &str,
        value: serde_json::Value,
    ) -> Result<StoreSettings, SettingsError>;
    fn apply(&mut self, settings: StoreSettings) -> Result<(), SettingsError>;
    fn reset(&mut self) -> Result<(), SettingsError>;
    fn get_config_path(&self) -> &str;
}

/// Settings engine implementation that persists settings as JSON on disk.
pub struct SettingsEngine {
    config_path: String,
    settings: StoreSettings,
}

impl SettingsEngine {
    /// Creates a new SettingsEngine.
    ///
    /// If `path_override` is `Some`, uses that path for the config file.
    /// Otherwise uses `$SHAARE_STORE_CONFIG` or `<config dir>/config.json`.
    pub fn new(path_override: Option<String>) -> Self {
        let config_path = path_override
            .unwrap_or_else(|| platform::get_config_file().to_string_lossy().to_string());
        Self {
            config_path,
            settings: StoreSettings::default(),
        }
    }
}

impl SettingsEngineTrait for SettingsEngine {
    /// Loads settings from the JSON config file.
    ///
    /// If the file does not exist, returns default settings.
    /// If the file exists but is malformed, returns a serialization error.
    fn load(&mut self) -> Result<StoreSettings, SettingsError> {
        let path = Path::new(&self.config_path);

        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            self.settings = StoreSettings::default();
            return Ok(self.settings.clone());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| SettingsError::IoError(format!("Failed to read config file: {}", e)))?;

        let settings: StoreSettings = serde_json::from_str(&content).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to parse config file: {}", e))
        })?;

        self.settings = settings;
        Ok(self.settings.clone())
    }

    /// Saves the current settings, creating parent directories if needed.
    fn save(&self) -> Result<(), SettingsError> {
        let path = Path::new(&self.config_path);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SettingsError::IoError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let json = serde_json::to_string_pretty(&self.settings).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to serialize settings: {}", e))
        })?;

        fs::write(path, json)
            .map_err(|e| SettingsError::IoError(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    fn get_settings(&self) -> &StoreSettings {
        &self.settings
    }

    /// Updates one top-level setting, e.g. `"links_per_page"`, and saves.
    fn set_value(&mut self, key: &str, value: serde_json::Value) -> Result<(), SettingsError> {
        let candidate = self.preview_value(key, value)?;
        self.apply(candidate)
    }

    /// Settings as they would be after setting `key`, without touching
    /// the current settings or the config file.
    ///
    /// The new value is validated by deserializing the whole settings object.
    fn preview_value(
        &self,
        key: &str,
        value: serde_json::Value,
    ) -> Result<StoreSettings, SettingsError> {
        if key.is_empty() {
            return Err(SettingsError::InvalidKey("Key cannot be empty".to_string()));
        }

        let mut json_value = serde_json::to_value(&self.settings).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to serialize settings: {}", e))
        })?;

        match json_value.as_object_mut() {
            Some(map) if map.contains_key(key) => {
                map.insert(key.to_string(), value);
            }
            _ => {
                return Err(SettingsError::InvalidKey(format!(
                    "Key '{}' not found in settings",
                    key
                )))
            }
        }

        let new_settings: StoreSettings = serde_json::from_value(json_value).map_err(|e| {
            SettingsError::InvalidValue(format!("Invalid value for key '{}': {}", key, e))
        })?;
        if new_settings.links_per_page == 0 {
            return Err(SettingsError::InvalidValue(
                "links_per_page must be at least 1".to_string(),
            ));
        }
        if new_settings.day_offset_minutes.unsigned_abs() >= 24 * 60 {
            return Err(SettingsError::InvalidValue(
                "day_offset_minutes must be within a day of UTC".to_string(),
            ));
        }

        Ok(new_settings)
    }

    /// Replaces the current settings and saves them.
    fn apply(&mut self, settings: StoreSettings) -> Result<(), SettingsError> {
        let previous = std::mem::replace(&mut self.settings, settings);
        if let Err(e) = self.save() {
            self.settings = previous;
            return Err(e);
        }
        Ok(())
    }

    /// Resets all settings to defaults and saves to disk.
    fn reset(&mut self) -> Result<(), SettingsError> {
        self.settings = StoreSettings::default();
        self.save()
    }

    fn get_config_path(&self) -> &str {
        &self.config_path
    }
}
