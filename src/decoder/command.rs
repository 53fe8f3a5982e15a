//! Subprocess decoder
//!
//! One process per token: the request goes to stdin as a single JSON object
//! and the answer is read back from stdout. The player script is always
//! handed over as a file path.

use async_trait::async_trait;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::Decoder;
use crate::error::{Result, YtResolveError};
use crate::types::{DecodeKind, DecodeRequest, DecodeResponse, PlayerScript};

#[derive(Debug, Serialize)]
struct CommandRequest<'a> {
    kind: DecodeKind,
    token: &'a str,
    player_url: &'a str,
    player_path: &'a Path,
}

pub struct CommandDecoder {
    program: String,
    args: Vec<String>,
    player_url: String,
    player_path: PathBuf,
    /// Uncached script written out for this decoder; deleted on drop
    _scratch: Option<NamedTempFile>,
}

impl CommandDecoder {
    /// Bind `program` to `player`, writing the script to a temporary file
    /// when it has no cached copy on disk
    pub fn new(program: String, args: Vec<String>, player: &PlayerScript) -> Result<Self> {
        let (player_path, scratch) = match &player.path {
            Some(path) => (path.clone(), None),
            None => {
                let mut file = tempfile::Builder::new()
                    .prefix(&format!("player-{}-", player.id))
                    .suffix(".js")
                    .tempfile()?;
                file.write_all(player.content.as_bytes())?;
                file.flush()?;
                debug!("Player script written to {}", file.path().display());
                (file.path().to_path_buf(), Some(file))
            }
        };

        Ok(Self {
            program,
            args,
            player_url: player.url.clone(),
            player_path,
            _scratch: scratch,
        })
    }

    pub fn player_path(&self) -> &Path {
        &self.player_path
    }

    fn failure(&self, kind: DecodeKind, reason: String) -> YtResolveError {
        YtResolveError::Decode { kind, reason }
    }
}

#[async_trait]
impl Decoder for CommandDecoder {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn decode(&self, request: &DecodeRequest) -> Result<DecodeResponse> {
        let payload = serde_json::to_vec(&CommandRequest {
            kind: request.kind,
            token: &request.token,
            player_url: &self.player_url,
            player_path: &self.player_path,
        })?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                self.failure(
                    request.kind,
                    format!("Failed to start {}: {}", self.program, e),
                )
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            let written = async {
                stdin.write_all(&payload).await?;
                stdin.write_all(b"\n").await
            }
            .await;
            // A decoder that exits early closes the pipe; its exit status decides
            if let Err(e) = written {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(e.into());
                }
                debug!("{} closed stdin early", self.program);
            }
            // Dropping stdin closes the pipe so the decoder sees EOF
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.failure(
                request.kind,
                format!(
                    "{} exited with code {:?}: {}",
                    self.program,
                    output.status.code(),
                    stderr.trim()
                ),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!("{} decoder replied with {} bytes", request.kind, stdout.len());
        let response: DecodeResponse = serde_json::from_str(stdout.trim())
            .map_err(|e| self.failure(request.kind, format!("Invalid decoder output: {}", e)))?;
        Ok(response)
    }
}
