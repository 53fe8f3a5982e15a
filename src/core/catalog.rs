//! Format catalog: raw formats resolved into playable entries

use futures::stream::{self, StreamExt};
use tracing::{debug, info};

use crate::core::cipher::{CipherBridge, resolve_format_url};
use crate::error::{Result, YtResolveError};
use crate::types::{
    FormatSource, MediaKind, NParamStatus, PlaybackDescription, RawFormat, ResolvedFormat,
    VideoDetails,
};

const SIZE_UNITS: &[&str] = &["B", "KB", "MB", "GB"];

/// Human-readable size with binary prefixes, e.g. "1.50 MB"
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "Unknown".into();
    }

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    format!("{:.2} {}", size, SIZE_UNITS[unit])
}

pub fn classify(mime_type: &str) -> MediaKind {
    if mime_type.starts_with("audio/") {
        MediaKind::Audio
    } else if mime_type.starts_with("video/") {
        MediaKind::Video
    } else {
        MediaKind::Unclassified
    }
}

fn to_resolved(
    raw: &RawFormat,
    source: FormatSource,
    url: String,
    n_param: NParamStatus,
) -> ResolvedFormat {
    let content_length = raw.content_length_bytes();
    ResolvedFormat {
        itag: raw.itag,
        mime_type: raw.mime_type.clone(),
        quality: raw.quality.clone(),
        quality_label: raw.quality_label.clone(),
        width: raw.width,
        height: raw.height,
        fps: raw.fps,
        bitrate: raw.bitrate,
        content_length,
        audio_quality: raw.audio_quality.clone(),
        url,
        filesize_str: format_size(content_length.unwrap_or(0)),
        kind: classify(&raw.mime_type),
        source,
        n_param,
    }
}

/// Every playable format of one video, muxed first then adaptive
#[derive(Debug, Clone, Default)]
pub struct FormatCatalog {
    pub formats: Vec<ResolvedFormat>,
    pub details: Option<VideoDetails>,
}

impl FormatCatalog {
    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    pub fn audio(&self) -> impl Iterator<Item = &ResolvedFormat> {
        self.formats.iter().filter(|f| f.is_audio())
    }

    pub fn video(&self) -> impl Iterator<Item = &ResolvedFormat> {
        self.formats.iter().filter(|f| f.is_video())
    }

    /// Adaptive entries win when an itag appears in both lists
    pub fn by_itag(&self, itag: u32) -> Option<&ResolvedFormat> {
        self.formats
            .iter()
            .filter(|f| f.itag == itag)
            .max_by_key(|f| f.source == FormatSource::Adaptive)
    }

    /// [`by_itag`](Self::by_itag), failing with `FormatNotFound`
    pub fn require_itag(&self, itag: u32) -> Result<&ResolvedFormat> {
        self.by_itag(itag).ok_or(YtResolveError::FormatNotFound(itag))
    }

    /// Highest-bitrate audio-only format
    pub fn best_audio(&self) -> Option<&ResolvedFormat> {
        self.audio().max_by_key(|f| f.bitrate.unwrap_or(0))
    }

    /// Tallest muxed format, bitrate breaking ties
    pub fn best_muxed(&self) -> Option<&ResolvedFormat> {
        self.formats
            .iter()
            .filter(|f| f.source == FormatSource::Muxed)
            .max_by_key(|f| (f.height.unwrap_or(0), f.bitrate.unwrap_or(0)))
    }
}

/// Resolve every format of `description` through `bridge`.
///
/// Up to `concurrency` formats are resolved at once; input order is kept.
pub async fn build_catalog(
    description: &PlaybackDescription,
    bridge: &CipherBridge,
    concurrency: usize,
) -> Result<FormatCatalog> {
    let streaming = description
        .streaming_data
        .as_ref()
        .ok_or(YtResolveError::NoStreamingData)?;

    let raw: Vec<(&RawFormat, FormatSource)> = streaming
        .formats
        .iter()
        .map(|f| (f, FormatSource::Muxed))
        .chain(
            streaming
                .adaptive_formats
                .iter()
                .map(|f| (f, FormatSource::Adaptive)),
        )
        .filter(|(f, _)| {
            let usable = f.is_usable();
            if !usable {
                debug!("Skipping itag {}: no url or cipher", f.itag);
            }
            usable
        })
        .collect();

    let total = raw.len();
    let formats: Vec<ResolvedFormat> = stream::iter(raw)
        .map(|(format, source)| async move {
            resolve_format_url(format, bridge)
                .await
                .map(|(url, n_param)| to_resolved(format, source, url, n_param))
        })
        .buffered(concurrency.max(1))
        .filter_map(|resolved| async move { resolved })
        .collect()
        .await;

    info!(
        "Catalog: {} of {} formats playable ({} decoder)",
        formats.len(),
        total,
        bridge.decoder_name()
    );

    Ok(FormatCatalog {
        formats,
        details: description.video_details.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::NullDecoder;
    use crate::types::StreamingData;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "Unknown");
        assert_eq!(format_size(512), "512.00 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1_048_576), "1.00 MB");
        assert_eq!(format_size(1_073_741_824), "1.00 GB");
        // No unit past GB
        assert_eq!(format_size(2 * 1024 * 1_073_741_824), "2048.00 GB");
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("audio/mp4; codecs=\"mp4a.40.2\""), MediaKind::Audio);
        assert_eq!(classify("video/webm"), MediaKind::Video);
        assert_eq!(classify("text/vtt"), MediaKind::Unclassified);
    }

    fn format(
        itag: u32,
        mime: &str,
        url: Option<&str>,
        bitrate: u64,
        height: Option<u32>,
    ) -> RawFormat {
        RawFormat {
            itag,
            mime_type: mime.into(),
            url: url.map(Into::into),
            bitrate: Some(bitrate),
            height,
            ..Default::default()
        }
    }

    fn null_bridge() -> CipherBridge {
        CipherBridge::new(Arc::new(NullDecoder::new()), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_build_catalog_keeps_order_and_drops_unusable() {
        let description = PlaybackDescription {
            streaming_data: Some(StreamingData {
                formats: vec![format(18, "video/mp4", Some("https://a/18"), 500, Some(360))],
                adaptive_formats: vec![
                    format(137, "video/mp4", Some("https://a/137"), 4000, Some(1080)),
                    format(999, "video/mp4", None, 1, None),
                    format(140, "audio/mp4", Some("https://a/140"), 128, None),
                    format(251, "audio/webm", Some("https://a/251?n=x"), 160, None),
                    format(600, "text/plain", Some("https://a/600"), 1, None),
                ],
                expires_in_seconds: None,
            }),
            ..Default::default()
        };

        let catalog = build_catalog(&description, &null_bridge(), 2).await.unwrap();
        let itags: Vec<u32> = catalog.formats.iter().map(|f| f.itag).collect();
        assert_eq!(itags, vec![18, 137, 140, 251, 600]);

        assert_eq!(catalog.audio().count(), 2);
        assert_eq!(catalog.video().count(), 2);
        assert_eq!(catalog.best_audio().unwrap().itag, 251);
        assert_eq!(catalog.best_muxed().unwrap().itag, 18);
        assert_eq!(catalog.by_itag(251).unwrap().n_param, NParamStatus::Unresolved);
        assert_eq!(catalog.by_itag(600).unwrap().kind, MediaKind::Unclassified);
        assert!(catalog.by_itag(999).is_none());
    }

    #[tokio::test]
    async fn test_by_itag_prefers_adaptive() {
        let description = PlaybackDescription {
            streaming_data: Some(StreamingData {
                formats: vec![format(22, "video/mp4", Some("https://a/muxed"), 1, Some(720))],
                adaptive_formats: vec![format(
                    22,
                    "video/mp4",
                    Some("https://a/adaptive"),
                    1,
                    Some(720),
                )],
                expires_in_seconds: None,
            }),
            ..Default::default()
        };
        let catalog = build_catalog(&description, &null_bridge(), 4).await.unwrap();
        assert_eq!(catalog.by_itag(22).unwrap().url, "https://a/adaptive");
        assert_eq!(catalog.require_itag(22).unwrap().source, FormatSource::Adaptive);
        assert!(matches!(
            catalog.require_itag(18),
            Err(YtResolveError::FormatNotFound(18))
        ));
    }

    #[tokio::test]
    async fn test_missing_streaming_data() {
        let err = build_catalog(&PlaybackDescription::default(), &null_bridge(), 4)
            .await
            .unwrap_err();
        assert!(matches!(err, YtResolveError::NoStreamingData));
    }
}
