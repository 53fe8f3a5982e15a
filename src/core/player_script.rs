//! Player script fetching

use regex::Regex;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

use crate::core::transport::Transport;
use crate::error::{Result, YtResolveError};
use crate::storage::cache::PlayerCache;
use crate::types::{PlayerScript, UNKNOWN_PLAYER_ID};

static PLAYER_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/player/([A-Za-z0-9_-]+)/").expect("valid regex"));

static SIGNATURE_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:signatureTimestamp|sts)\s*:\s*(\d+)").expect("valid regex")
});

/// Player version from `/player/<id>/`, or the "unknown" sentinel
pub fn player_id_from_url(url: &str) -> String {
    PLAYER_ID
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| UNKNOWN_PLAYER_ID.to_string())
}

pub fn signature_timestamp(content: &str) -> Option<u32> {
    SIGNATURE_TIMESTAMP
        .captures(content)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Fetch the player script at `url`, going through `cache` when given.
///
/// Anything but a 200 is fatal.
pub async fn fetch_player_script(
    transport: &Transport,
    url: &str,
    cache: Option<&PlayerCache>,
) -> Result<PlayerScript> {
    let id = player_id_from_url(url);

    if let Some(cache) = cache {
        if let Some((content, path)) = cache.get(url, &id).await {
            return Ok(PlayerScript {
                url: url.to_string(),
                signature_timestamp: signature_timestamp(&content),
                content,
                id,
                path: Some(path),
            });
        }
    }

    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    let response = transport.fetch(Method::GET, url, headers, None).await?;
    if response.status != StatusCode::OK {
        return Err(YtResolveError::HttpStatus {
            status: response.status.as_u16(),
            url: url.to_string(),
        });
    }

    let content = response.body;
    let sts = signature_timestamp(&content);
    info!("Fetched player script {} ({} bytes)", id, content.len());
    if sts.is_none() {
        debug!("No signature timestamp in player {}", id);
    }

    let path = match cache {
        Some(cache) => match cache.store(url, &id, &content).await {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Failed to cache player script {}: {}", id, e);
                None
            }
        },
        None => None,
    };

    Ok(PlayerScript {
        url: url.to_string(),
        content,
        id,
        signature_timestamp: sts,
        path,
    })
}
