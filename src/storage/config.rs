//! Configuration management

use crate::error::Result;
use crate::types::Config;
use crate::utils::paths::{default_download_dir, ensure_dir, get_config_path};
use std::path::Path;
use tokio::fs;
use tracing::debug;

/// Load configuration from the default location, merging with defaults
pub async fn load_config() -> Result<Config> {
    load_config_from(&get_config_path()).await
}

/// Load configuration from `path`; a missing file yields the defaults.
///
/// Fields absent from the file keep their default values.
pub async fn load_config_from(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        let content = fs::read_to_string(path).await?;
        debug!("Loaded config from {}", path.display());
        serde_json::from_str::<Config>(&content)?
    } else {
        Config::default()
    };

    // Set download_dir with default if empty
    if config.download_dir.is_empty() {
        config.download_dir = default_download_dir().to_string_lossy().to_string();
    }

    Ok(config)
}

/// Save configuration to the default location
pub async fn save_config(config: &Config) -> Result<()> {
    save_config_to(&get_config_path(), config).await
}

pub async fn save_config_to(path: &Path, config: &Config) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent).await?;
    }
    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content).await?;
    Ok(())
}
