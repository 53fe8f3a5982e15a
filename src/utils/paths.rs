//! Path utilities for yt-resolve
//!
//! Respects XDG Base Directory Specification

use crate::error::Result;
use std::env;
use std::path::{Path, PathBuf};
use tokio::fs;

const APP_NAME: &str = "yt-resolve";

/// Get config directory path
/// Respects XDG_CONFIG_HOME, defaults to ~/.config/yt-resolve
pub fn get_config_dir() -> PathBuf {
    let base = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .ok()
        .or_else(dirs::config_dir)
        .unwrap_or_else(|| home_dir().join(".config"));

    base.join(APP_NAME)
}

/// Get cache directory path
/// Respects XDG_CACHE_HOME, defaults to ~/.cache/yt-resolve
pub fn get_cache_dir() -> PathBuf {
    let base = env::var("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .ok()
        .or_else(dirs::cache_dir)
        .unwrap_or_else(|| home_dir().join(".cache"));

    base.join(APP_NAME)
}

/// Where fetched player scripts are kept
pub fn get_player_cache_dir() -> PathBuf {
    get_cache_dir().join("player")
}

/// Get config file path
pub fn get_config_path() -> PathBuf {
    get_config_dir().join("config.json")
}

/// Default download directory, ~/Downloads when the platform knows none
pub fn default_download_dir() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| home_dir().join("Downloads"))
}

fn home_dir() -> PathBuf {
    PathBuf::from(env::var("HOME").unwrap_or_default())
}

/// Ensure a directory exists
pub async fn ensure_dir(path: impl AsRef<Path>) -> Result<()> {
    fs::create_dir_all(path).await?;
    Ok(())
}
