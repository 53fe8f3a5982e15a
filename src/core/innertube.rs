//! Playback metadata client for the internal player API.
//!
//! Always speaks as the Android app: its responses carry direct stream URLs
//! for most formats, which keeps decoder traffic low.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ORIGIN, USER_AGENT};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::transport::Transport;
use crate::error::{Result, YtResolveError};
use crate::types::{Configuration, PlaybackDescription};

/// A client identity the API accepts
#[derive(Debug, Clone, Copy)]
pub struct ClientProfile {
    pub name: &'static str,
    /// Numeric id for the `X-YouTube-Client-Name` header
    pub header_id: &'static str,
    pub version: &'static str,
    pub user_agent: &'static str,
    pub os_name: &'static str,
    pub os_version: &'static str,
    pub android_sdk_version: Option<u32>,
}

pub const ANDROID_CLIENT: ClientProfile = ClientProfile {
    name: "ANDROID",
    header_id: "3",
    version: "20.10.38",
    user_agent: "com.google.android.youtube/20.10.38 (Linux; U; Android 11) gzip",
    os_name: "Android",
    os_version: "11",
    android_sdk_version: Some(30),
};

/// Locale fields sent in the client context
#[derive(Debug, Clone)]
pub struct Locale {
    pub language: String,
    pub region: String,
    pub time_zone: String,
}

impl Default for Locale {
    fn default() -> Self {
        Self {
            language: "en".into(),
            region: "US".into(),
            time_zone: "UTC".into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRequest<'a> {
    video_id: &'a str,
    context: RequestContext<'a>,
    playback_context: PlaybackContext,
    content_check_ok: bool,
    racy_check_ok: bool,
}

#[derive(Debug, Serialize)]
struct RequestContext<'a> {
    client: ClientContext<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClientContext<'a> {
    client_name: &'a str,
    client_version: &'a str,
    user_agent: &'a str,
    os_name: &'a str,
    os_version: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    android_sdk_version: Option<u32>,
    hl: &'a str,
    gl: &'a str,
    time_zone: &'a str,
    utc_offset_minutes: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlaybackContext {
    content_playback_context: ContentPlaybackContext,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContentPlaybackContext {
    html5_preference: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature_timestamp: Option<u32>,
}

impl<'a> PlayerRequest<'a> {
    pub fn new(
        video_id: &'a str,
        client: &'a ClientProfile,
        locale: &'a Locale,
        signature_timestamp: Option<u32>,
    ) -> Self {
        Self {
            video_id,
            context: RequestContext {
                client: ClientContext {
                    client_name: client.name,
                    client_version: client.version,
                    user_agent: client.user_agent,
                    os_name: client.os_name,
                    os_version: client.os_version,
                    android_sdk_version: client.android_sdk_version,
                    hl: &locale.language,
                    gl: &locale.region,
                    time_zone: &locale.time_zone,
                    utc_offset_minutes: 0,
                },
            },
            playback_context: PlaybackContext {
                content_playback_context: ContentPlaybackContext {
                    html5_preference: "HTML5_PREF_WANTS",
                    signature_timestamp,
                },
            },
            content_check_ok: true,
            racy_check_ok: true,
        }
    }
}

/// Endpoint for the player API, with the key when one was harvested
pub fn player_endpoint(origin: &str, api_key: Option<&str>) -> String {
    let origin = origin.trim_end_matches('/');
    match api_key {
        Some(key) => format!(
            "{}/youtubei/v1/player?key={}&prettyPrint=false",
            origin,
            urlencoding::encode(key)
        ),
        None => format!("{}/youtubei/v1/player?prettyPrint=false", origin),
    }
}

fn request_headers(
    client: &ClientProfile,
    origin: &str,
    visitor_data: Option<&str>,
) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(client.user_agent));
    headers.insert(
        HeaderName::from_static("x-youtube-client-name"),
        HeaderValue::from_static(client.header_id),
    );
    headers.insert(
        HeaderName::from_static("x-youtube-client-version"),
        HeaderValue::from_static(client.version),
    );
    if let Ok(value) = HeaderValue::from_str(origin.trim_end_matches('/')) {
        headers.insert(ORIGIN, value);
    }
    if let Some(value) = visitor_data.and_then(|v| HeaderValue::from_str(v).ok()) {
        headers.insert(HeaderName::from_static("x-goog-visitor-id"), value);
    }
    headers
}

/// Fetch the playback description for `video_id`.
///
/// Transport and parse failures are returned as is; the playability status
/// is left for the caller to check with [`ensure_playable`].
pub async fn fetch_playback(
    transport: &Transport,
    origin: &str,
    video_id: &str,
    config: &Configuration,
    signature_timestamp: Option<u32>,
    locale: &Locale,
) -> Result<PlaybackDescription> {
    let client = &ANDROID_CLIENT;
    let api_key = config.api_key();
    if api_key.is_none() {
        warn!("No API key harvested, calling the player API without one");
    }

    let sts = signature_timestamp.or_else(|| config.sts());
    let endpoint = player_endpoint(origin, api_key);
    let body = PlayerRequest::new(video_id, client, locale, sts);
    let headers = request_headers(client, origin, config.visitor_data());

    debug!(
        "Player request for {} as {} {} (sts: {:?})",
        video_id, client.name, client.version, sts
    );
    let response = transport.post_json(&endpoint, &body, headers).await?;

    let description: PlaybackDescription = serde_json::from_str(&response.body)
        .map_err(|e| YtResolveError::parse("playback description", e.to_string()))?;

    if let Some(data) = &description.streaming_data {
        info!(
            "Playback description: {} muxed, {} adaptive formats",
            data.formats.len(),
            data.adaptive_formats.len()
        );
    }

    Ok(description)
}

/// Reject descriptions whose playability status is not `OK`.
///
/// A missing status is treated as playable.
pub fn ensure_playable(description: &PlaybackDescription) -> Result<()> {
    match &description.playability_status {
        Some(status) if !status.is_ok() => Err(YtResolveError::StatusNotOk {
            status: status.status.clone(),
            reason: status
                .reason
                .clone()
                .unwrap_or_else(|| "Unknown reason".into()),
        }),
        _ => Ok(()),
    }
}

impl PlaybackDescription {
    pub fn ensure_playable(&self) -> Result<()> {
        ensure_playable(self)
    }
}
