//! Download engine: streams one resolved format to disk

use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, HeaderMap, HeaderValue, RANGE};
use reqwest::{Method, Url};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::core::transport::{Transport, is_redirect, parse_url, redirect_target};
use crate::error::{Result, YtResolveError};

/// Bytes written so far; `total` when the server announced it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    pub received: u64,
    pub total: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct DownloadReport {
    pub path: PathBuf,
    pub bytes: u64,
    pub total: Option<u64>,
    /// Where the bytes actually came from, after redirects
    pub final_url: String,
}

/// Total size from `Content-Range: bytes a-b/total`, then `Content-Length`
pub fn total_size(headers: &HeaderMap) -> Option<u64> {
    let from_range = headers
        .get(CONTENT_RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.rsplit_once('/'))
        .and_then(|(_, total)| total.trim().parse().ok());

    from_range.or_else(|| {
        headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    })
}

/// Sibling file the body is streamed into before it replaces `dest`
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

/// Download `url` into `dest`.
///
/// The body is written to [`partial_path`] and renamed over `dest` only
/// once complete, so a failed or cancelled download leaves any existing
/// `dest` untouched. `cancel` is checked between chunks.
pub async fn download<F>(
    transport: &Transport,
    url: &str,
    dest: &Path,
    cancel: Option<&AtomicBool>,
    on_progress: F,
) -> Result<DownloadReport>
where
    F: FnMut(DownloadProgress),
{
    let partial = partial_path(dest);
    let result = download_inner(transport, url, &partial, cancel, on_progress).await;
    if result.is_err() {
        remove_partial(&partial).await;
    }
    let mut report = result?;

    if let Err(e) = fs::rename(&partial, dest).await {
        remove_partial(&partial).await;
        return Err(e.into());
    }
    report.path = dest.to_path_buf();
    Ok(report)
}

async fn download_inner<F>(
    transport: &Transport,
    url: &str,
    partial: &Path,
    cancel: Option<&AtomicBool>,
    mut on_progress: F,
) -> Result<DownloadReport>
where
    F: FnMut(DownloadProgress),
{
    let mut current: Url = parse_url(url)?;
    let mut headers = HeaderMap::new();
    headers.insert(RANGE, HeaderValue::from_static("bytes=0-"));

    for hop in 0..=transport.max_redirects() {
        let response = transport.send(Method::GET, &current, &headers, None).await?;
        let status = response.status();

        if is_redirect(status) {
            let next = redirect_target(&current, status, response.headers())?;
            debug!("Download redirect {}: {} -> {}", hop + 1, current, next);
            remove_partial(partial).await;
            current = next;
            continue;
        }

        if !status.is_success() {
            return Err(YtResolveError::HttpStatus {
                status: status.as_u16(),
                url: current.to_string(),
            });
        }

        let total = total_size(response.headers());
        info!("Downloading {} ({:?} bytes)", partial.display(), total);

        let mut file = File::create(partial).await?;
        let mut received = 0u64;
        on_progress(DownloadProgress { received, total });

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
                return Err(YtResolveError::Cancelled);
            }

            let chunk =
                chunk.map_err(|e| YtResolveError::Network(format!("{}: {}", current, e)))?;
            file.write_all(&chunk).await?;
            received += chunk.len() as u64;
            on_progress(DownloadProgress { received, total });
        }

        file.flush().await?;

        return Ok(DownloadReport {
            path: partial.to_path_buf(),
            bytes: received,
            total,
            final_url: current.to_string(),
        });
    }

    Err(YtResolveError::RedirectLimit {
        url: url.to_string(),
        limit: transport.max_redirects(),
    })
}

async fn remove_partial(partial: &Path) {
    match fs::remove_file(partial).await {
        Ok(()) => debug!("Removed partial file {}", partial.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove partial file {}: {}", partial.display(), e),
    }
}

/// Progress bar for a download; a spinner until the size is known
pub fn progress_bar(label: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} {bytes}")
            .expect("valid progress template"),
    );
    bar.set_message(label.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// Feed a [`DownloadProgress`] into `bar`, switching to a sized bar once
pub fn update_progress_bar(bar: &ProgressBar, progress: DownloadProgress) {
    if let Some(total) = progress.total {
        if bar.length() != Some(total) {
            bar.set_length(total);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{msg} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                    .expect("valid progress template")
                    .progress_chars("=> "),
            );
        }
    }
    bar.set_position(progress.received);
}
