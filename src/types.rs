//! Type definitions for yt-resolve
//!
//! Source of truth for all data structures.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================
// Harvested page configuration
// ============================================

/// Key/value configuration harvested from `ytcfg.set(...)` calls and page patterns.
///
/// Only the harvester inserts; everything downstream reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Configuration {
    values: Map<String, Value>,
}

impl Configuration {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// String value for `key`; numbers are not coerced
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn api_key(&self) -> Option<&str> {
        self.get_str("INNERTUBE_API_KEY")
    }

    pub fn client_version(&self) -> Option<&str> {
        self.get_str("INNERTUBE_CLIENT_VERSION")
    }

    /// Visitor token, either top-level or nested in the innertube context
    pub fn visitor_data(&self) -> Option<&str> {
        self.get_str("VISITOR_DATA").or_else(|| {
            self.get("INNERTUBE_CONTEXT")
                .and_then(|c| c.get("client"))
                .and_then(|c| c.get("visitorData"))
                .and_then(Value::as_str)
        })
    }

    /// Player script location as written in the page (not normalized)
    pub fn player_js_url(&self) -> Option<&str> {
        self.get_str("PLAYER_JS_URL").or_else(|| {
            self.get("WEB_PLAYER_CONTEXT_CONFIGS")
                .and_then(Value::as_object)
                .and_then(|configs| {
                    configs
                        .values()
                        .find_map(|c| c.get("jsUrl").and_then(Value::as_str))
                })
        })
    }

    /// Signature timestamp if the page exposed one
    pub fn sts(&self) -> Option<u32> {
        match self.get("STS")? {
            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Last write wins
    pub(crate) fn merge(&mut self, other: Map<String, Value>) {
        for (key, value) in other {
            self.values.insert(key, value);
        }
    }

    pub(crate) fn insert(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_string(), value);
    }
}

// ============================================
// Player script
// ============================================

/// Sentinel id used when the player URL does not follow `/player/<id>/`
pub const UNKNOWN_PLAYER_ID: &str = "unknown";

/// The site's player script, as fetched
#[derive(Debug, Clone)]
pub struct PlayerScript {
    pub url: String,
    pub content: String,
    /// e.g. "6c5cb4f4", or "unknown"
    pub id: String,
    /// Scraped from the script body, sent along with the playback request
    pub signature_timestamp: Option<u32>,
    /// On-disk copy, for decoders that load the script themselves
    pub path: Option<PathBuf>,
}

// ============================================
// Playback description (internal API response)
// ============================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackDescription {
    #[serde(default)]
    pub playability_status: Option<PlayabilityStatus>,
    #[serde(default)]
    pub streaming_data: Option<StreamingData>,
    #[serde(default)]
    pub video_details: Option<VideoDetails>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayabilityStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
}

impl PlayabilityStatus {
    pub fn is_ok(&self) -> bool {
        self.status == "OK"
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingData {
    #[serde(default)]
    pub formats: Vec<RawFormat>,
    #[serde(default)]
    pub adaptive_formats: Vec<RawFormat>,
    #[serde(default)]
    pub expires_in_seconds: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetails {
    #[serde(default)]
    pub video_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub length_seconds: Option<String>,
}

/// A format descriptor exactly as the API returns it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFormat {
    pub itag: u32,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default)]
    pub quality_label: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub fps: Option<u32>,
    #[serde(default)]
    pub bitrate: Option<u64>,
    /// Decimal string on the wire
    #[serde(default)]
    pub content_length: Option<String>,
    #[serde(default)]
    pub audio_quality: Option<String>,
    #[serde(default)]
    pub approx_duration_ms: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, alias = "cipher", skip_serializing_if = "Option::is_none")]
    pub signature_cipher: Option<String>,
}

impl RawFormat {
    /// Neither a direct URL nor a cipher: nothing to resolve
    pub fn is_usable(&self) -> bool {
        self.url.is_some() || self.signature_cipher.is_some()
    }

    pub fn content_length_bytes(&self) -> Option<u64> {
        self.content_length.as_deref()?.trim().parse().ok()
    }
}

// ============================================
// Resolved catalog entries
// ============================================

/// Audio/video classification by MIME prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
    /// Neither `audio/` nor `video/`; still selectable
    Unclassified,
}

/// Which list of the streaming data a format came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatSource {
    /// `formats`: audio and video in one stream
    Muxed,
    /// `adaptiveFormats`: audio-only or video-only
    Adaptive,
}

/// Outcome of `n` parameter handling for a URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NParamStatus {
    Absent,
    Resolved,
    /// Decoder failed; original value kept (likely throttled)
    Unresolved,
}

/// A catalog entry with a playable URL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedFormat {
    pub itag: u32,
    pub mime_type: String,
    pub quality: Option<String>,
    pub quality_label: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<u32>,
    pub bitrate: Option<u64>,
    pub content_length: Option<u64>,
    pub audio_quality: Option<String>,
    pub url: String,
    /// "1.50 MB", or "Unknown"
    pub filesize_str: String,
    pub kind: MediaKind,
    pub source: FormatSource,
    pub n_param: NParamStatus,
}

impl ResolvedFormat {
    pub fn is_audio(&self) -> bool {
        self.kind == MediaKind::Audio
    }

    pub fn is_video(&self) -> bool {
        self.kind == MediaKind::Video
    }

    /// File extension derived from the MIME type
    pub fn extension(&self) -> &'static str {
        let essence = self.mime_type.split(';').next().unwrap_or("").trim();
        match essence {
            "audio/mp4" => "m4a",
            "video/mp4" => "mp4",
            "audio/webm" | "video/webm" => "webm",
            "video/3gpp" => "3gp",
            _ => "bin",
        }
    }
}

// ============================================
// Decoder contract
// ============================================

/// What kind of obfuscated token is being decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecodeKind {
    Signature,
    NParam,
}

impl fmt::Display for DecodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signature => f.write_str("signature"),
            Self::NParam => f.write_str("n-param"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeRequest {
    pub kind: DecodeKind,
    pub token: String,
}

/// `token: None` means the decoder could not handle this token
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeResponse {
    #[serde(default)]
    pub token: Option<String>,
}

// ============================================
// Config Types
// ============================================

/// External decoder settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Program speaking the JSON stdin/stdout protocol
    pub command: Option<String>,
    pub args: Vec<String>,
    /// Base URL of a remote decode service
    pub url: Option<String>,
    /// Sent as the Authorization header to the remote service
    pub token: Option<String>,
    /// Ceiling for a single decode call
    pub timeout_secs: u64,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            url: None,
            token: None,
            timeout_secs: 20,
        }
    }
}

/// User configuration, fixed for the lifetime of a resolver
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Scheme and host the watch page and API live on
    pub site_origin: String,
    pub language: String,
    pub region: String,
    pub time_zone: String,
    /// Send a pre-accepted consent cookie with the page fetch
    pub consent_cookie: bool,
    pub max_redirects: usize,
    pub decoder: DecoderConfig,
    /// Formats resolved in parallel
    pub decode_concurrency: usize,
    /// Download directory path
    pub download_dir: String,
    /// Where diagnostic snapshots go; disabled when unset
    pub snapshot_dir: Option<String>,
    pub cache_player_scripts: bool,
    pub player_cache_ttl_secs: u64,
    /// Overrides the default player cache location
    pub cache_dir: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site_origin: "https://www.youtube.com".into(),
            language: "en".into(),
            region: "US".into(),
            time_zone: "UTC".into(),
            consent_cookie: true,
            max_redirects: 10,
            decoder: DecoderConfig::default(),
            decode_concurrency: 4,
            download_dir: String::new(), // Set at runtime to ~/Downloads
            snapshot_dir: None,
            cache_player_scripts: true,
            player_cache_ttl_secs: 24 * 60 * 60,
            cache_dir: None,
        }
    }
}

// ============================================
// Selector Types
// ============================================

/// Item displayed in selector menu
#[derive(Debug, Clone)]
pub struct MenuItem<T> {
    /// Display text
    pub label: String,
    /// Underlying value
    pub value: T,
}

// ============================================
// Cache Types
// ============================================

/// Cached data with TTL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub data: T,
    pub timestamp: i64,
    /// Time-to-live in seconds
    pub ttl: u64,
}

// ============================================
// State Machine Types
// ============================================

/// Pipeline stage, used to attribute failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    PageFetch,
    ConfigHarvest,
    PlayerScript,
    Metadata,
    Catalog,
    Download,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PageFetch => "page fetch",
            Self::ConfigHarvest => "config harvest",
            Self::PlayerScript => "player script",
            Self::Metadata => "metadata",
            Self::Catalog => "catalog",
            Self::Download => "download",
        };
        f.write_str(name)
    }
}

/// Resolution pipeline state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Start,
    PageFetched,
    ConfigHarvested,
    PlayerScriptResolved,
    MetadataFetched,
    CatalogBuilt,
    /// Terminal
    Downloaded,
    /// Terminal
    Failed { stage: Stage, reason: String },
}
