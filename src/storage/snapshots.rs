//! Diagnostic snapshots of each pipeline stage
//!
//! Best effort: write failures are logged and never fail a run.

use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::utils::paths::ensure_dir;

pub const PAGE_FILE: &str = "page.html";
pub const CONFIG_FILE: &str = "config.json";
pub const PLAYER_FILE: &str = "player.json";
pub const METADATA_FILE: &str = "metadata.json";
pub const FORMATS_FILE: &str = "formats.json";

/// One run's snapshot directory, `<base>/<video_id>-<UTC timestamp>/`
#[derive(Debug, Clone)]
pub struct Snapshot {
    dir: PathBuf,
}

impl Snapshot {
    pub fn new(base: impl AsRef<Path>, video_id: &str) -> Self {
        let stamp = Utc::now().format("%Y%m%dT%H%M%SZ");
        Self {
            dir: base.as_ref().join(format!("{}-{}", video_id, stamp)),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn write_text(&self, name: &str, content: &str) {
        if let Err(e) = self.try_write(name, content.as_bytes()).await {
            warn!("Snapshot {} not written: {}", name, e);
        }
    }

    pub async fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) {
        match serde_json::to_vec_pretty(value) {
            Ok(bytes) => {
                if let Err(e) = self.try_write(name, &bytes).await {
                    warn!("Snapshot {} not written: {}", name, e);
                }
            }
            Err(e) => warn!("Snapshot {} not serialized: {}", name, e),
        }
    }

    async fn try_write(&self, name: &str, bytes: &[u8]) -> crate::error::Result<()> {
        ensure_dir(&self.dir).await?;
        let path = self.dir.join(name);
        fs::write(&path, bytes).await?;
        debug!("Snapshot written: {}", path.display());
        Ok(())
    }
}
