// Platform paths
// Default locations of the config file and the datastore on Windows, macOS and Linux.
//
// Uses `cfg(target_os)` for conditional compilation to select the correct
// platform-specific implementation at compile time.

use std::env;
use std::path::PathBuf;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "windows")]
mod windows;

/// Overrides the config file location.
pub const CONFIG_ENV: &str = "SHAARE_STORE_CONFIG";
/// Overrides the data directory.
pub const DATA_DIR_ENV: &str = "SHAARE_STORE_DATA_DIR";

/// Returns the platform-specific configuration directory.
///
/// - **Linux**: `~/.config/shaare-store` (or `$XDG_CONFIG_HOME/shaare-store`)
/// - **macOS**: `~/Library/Application Support/ShaareStore`
/// - **Windows**: `%APPDATA%/ShaareStore`
pub fn get_config_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        linux::get_config_dir()
    }
    #[cfg(target_os = "macos")]
    {
        macos::get_config_dir()
    }
    #[cfg(target_os = "windows")]
    {
        windows::get_config_dir()
    }
}

/// Returns the directory holding the datastore.
///
/// `$SHAARE_STORE_DATA_DIR` wins when set, otherwise:
/// - **Linux**: `~/.local/share/shaare-store` (or `$XDG_DATA_HOME/shaare-store`)
/// - **macOS**: `~/Library/Application Support/ShaareStore`
/// - **Windows**: `%APPDATA%/ShaareStore`
pub fn get_data_dir() -> PathBuf {
    if let Some(dir) = env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    #[cfg(target_os = "linux")]
    {
        linux::get_data_dir()
    }
    #[cfg(target_os = "macos")]
    {
        macos::get_data_dir()
    }
    #[cfg(target_os = "windows")]
    {
        windows::get_data_dir()
    }
}

/// Returns the config file path: `$SHAARE_STORE_CONFIG` or `<config dir>/config.json`.
pub fn get_config_file() -> PathBuf {
    match env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
        Some(path) => PathBuf::from(path),
        None => get_config_dir().join("config.json"),
    }
}
