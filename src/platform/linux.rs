// Platform paths for Linux
// Config: ~/.config/shaare-store
// Data:   ~/.local/share/shaare-store

use std::env;
use std::path::PathBuf;

const APP_DIR: &str = "shaare-store";

fn home_dir() -> PathBuf {
    PathBuf::from(env::var("HOME").unwrap_or_else(|_| String::from("/tmp")))
}

/// `$XDG_CONFIG_HOME/shaare-store` if set, otherwise `~/.config/shaare-store`.
pub fn get_config_dir() -> PathBuf {
    config_dir_from(env::var("XDG_CONFIG_HOME").ok(), home_dir())
}

/// `$XDG_DATA_HOME/shaare-store` if set, otherwise `~/.local/share/shaare-store`.
pub fn get_data_dir() -> PathBuf {
    data_dir_from(env::var("XDG_DATA_HOME").ok(), home_dir())
}

fn config_dir_from(xdg: Option<String>, home: PathBuf) -> PathBuf {
    match xdg.filter(|v| !v.is_empty()) {
        Some(xdg) => PathBuf::from(xdg).join(APP_DIR),
        None => home.join(".config").join(APP_DIR),
    }
}

fn data_dir_from(xdg: Option<String>, home: PathBuf) -> PathBuf {
    match xdg.filter(|v| !v.is_empty()) {
        Some(xdg) => PathBuf::from(xdg).join(APP_DIR),
        None => home.join(".local").join("share").join(APP_DIR),
    }
}
