//! Error types for yt-resolve

use thiserror::Error;

use crate::types::DecodeKind;

/// Coarse error classes used when reporting which part of the pipeline broke
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Network errors
    TransportError,

    // Data errors
    ParseError,
    NotFound,
    DecodeFailure,
    StatusNotOk,

    // User errors
    InvalidInput,

    // System errors
    FileError,
    Cancelled,
}

/// Main error type for yt-resolve
#[derive(Error, Debug)]
pub enum YtResolveError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Too many redirects (limit {limit}) while fetching {url}")]
    RedirectLimit { url: String, limit: usize },

    #[error("Failed to parse {what}: {reason}")]
    Parse { what: &'static str, reason: String },

    #[error("Player script URL not found in page")]
    PlayerScriptNotFound,

    #[error("No streamingData in playback response")]
    NoStreamingData,

    #[error("No format with itag {0}")]
    FormatNotFound(u32),

    #[error("Decoder failed on {kind} token: {reason}")]
    Decode { kind: DecodeKind, reason: String },

    #[error("Video is not playable ({status}): {reason}")]
    StatusNotOk { status: String, reason: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Download cancelled")]
    Cancelled,

    #[error("File error: {0}")]
    File(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl YtResolveError {
    pub fn parse(what: &'static str, reason: impl Into<String>) -> Self {
        Self::Parse {
            what,
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Network(_)
            | Self::HttpStatus { .. }
            | Self::RedirectLimit { .. }
            | Self::Http(_) => ErrorCode::TransportError,
            Self::Parse { .. } | Self::Json(_) => ErrorCode::ParseError,
            Self::PlayerScriptNotFound | Self::NoStreamingData | Self::FormatNotFound(_) => {
                ErrorCode::NotFound
            }
            Self::Decode { .. } => ErrorCode::DecodeFailure,
            Self::StatusNotOk { .. } => ErrorCode::StatusNotOk,
            Self::InvalidUrl(_) | Self::InvalidConfig(_) => ErrorCode::InvalidInput,
            Self::File(_) => ErrorCode::FileError,
            Self::Cancelled => ErrorCode::Cancelled,
        }
    }

    /// The response never arrived or could not be read
    pub fn is_transport_or_parse(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::TransportError | ErrorCode::ParseError
        )
    }
}

pub type Result<T> = std::result::Result<T, YtResolveError>;
