//! Player script caching
//!
//! Scripts are stored as `<key>.js` next to a `<key>.json` entry holding the
//! source URL and timestamp, so external decoders can read the raw file.

use crate::error::Result;
use crate::types::{CacheEntry, UNKNOWN_PLAYER_ID};
use crate::utils::paths::ensure_dir;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

pub const DEFAULT_TTL: u64 = 24 * 60 * 60; // 1 day

/// Generate cache key from a player URL and its id
pub fn get_cache_key(url: &str, player_id: &str) -> String {
    if player_id != UNKNOWN_PLAYER_ID && !player_id.is_empty() {
        return player_id.to_string();
    }
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Disk cache for player scripts
#[derive(Debug, Clone)]
pub struct PlayerCache {
    dir: PathBuf,
    ttl: u64,
}

impl PlayerCache {
    pub fn new(dir: impl Into<PathBuf>, ttl: u64) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the raw script for `key` lives
    pub fn script_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.js", key))
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// Get a cached script if present, unexpired and fetched from the same URL
    pub async fn get(&self, url: &str, player_id: &str) -> Option<(String, PathBuf)> {
        let key = get_cache_key(url, player_id);
        let entry_path = self.entry_path(&key);

        let content = fs::read_to_string(&entry_path).await.ok()?;
        let entry: CacheEntry<String> = serde_json::from_str(&content).ok()?;

        let now = Utc::now().timestamp();
        if now - entry.timestamp > entry.ttl as i64 || entry.data != url {
            // Expired or stale, remove both files
            let _ = fs::remove_file(&entry_path).await;
            let _ = fs::remove_file(self.script_path(&key)).await;
            return None;
        }

        let script_path = self.script_path(&key);
        let script = fs::read_to_string(&script_path).await.ok()?;
        debug!("Player script cache hit: {}", key);
        Some((script, script_path))
    }

    /// Store a script and return the path of the raw file
    pub async fn store(&self, url: &str, player_id: &str, script: &str) -> Result<PathBuf> {
        ensure_dir(&self.dir).await?;

        let key = get_cache_key(url, player_id);
        let script_path = self.script_path(&key);
        fs::write(&script_path, script).await?;

        let entry = CacheEntry {
            data: url,
            timestamp: Utc::now().timestamp(),
            ttl: self.ttl,
        };
        let content = serde_json::to_string(&entry)?;
        fs::write(self.entry_path(&key), content).await?;

        Ok(script_path)
    }

    /// Clear all cached scripts
    pub async fn clear(&self) -> Result<()> {
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir).await?;
        }
        Ok(())
    }
}
