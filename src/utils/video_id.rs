//! Video id extraction from the URL shapes people paste

use regex::Regex;
use reqwest::Url;
use std::sync::LazyLock;

static BARE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("valid regex"));

const YOUTUBE_DOMAINS: &[&str] = &["youtube.com", "youtube-nocookie.com", "youtu.be"];

/// Path prefixes that carry the id as the next segment
const ID_SEGMENT_PREFIXES: &[&str] = &["shorts", "embed", "live", "v", "e"];

/// Extract the video id from a watch URL, short link or bare id
pub fn extract_video_id(input: &str) -> Option<String> {
    let input = input.trim();
    if BARE_ID.is_match(input) {
        return Some(input.to_string());
    }

    if !is_youtube_url(input) {
        return None;
    }
    let parsed = Url::parse(input).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|s| s.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    let id = if host == "youtu.be" || host.ends_with(".youtu.be") {
        segments.first().map(|s| s.to_string())
    } else {
        let from_query = parsed
            .query_pairs()
            .find(|(k, _)| k == "v")
            .map(|(_, v)| v.to_string());
        from_query.or_else(|| match segments.as_slice() {
            [prefix, id, ..] if ID_SEGMENT_PREFIXES.contains(prefix) => Some(id.to_string()),
            _ => None,
        })
    };

    id.filter(|id| BARE_ID.is_match(id))
}

/// True when the URL's host is a YouTube domain or a subdomain of one
pub fn is_youtube_url(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return false;
    };
    let Some(host) = parsed.host_str().map(str::to_lowercase) else {
        return false;
    };
    YOUTUBE_DOMAINS
        .iter()
        .any(|domain| host == *domain || host.ends_with(&format!(".{}", domain)))
}

/// Canonical watch page for `video_id` on `origin`
pub fn build_watch_url(origin: &str, video_id: &str) -> String {
    format!("{}/watch?v={}", origin.trim_end_matches('/'), video_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_video_id_forms() {
        let expected = Some("dQw4w9WgXcQ".to_string());
        assert_eq!(extract_video_id("dQw4w9WgXcQ"), expected);
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42s"),
            expected
        );
        assert_eq!(extract_video_id("https://youtu.be/dQw4w9WgXcQ?si=x"), expected);
        assert_eq!(
            extract_video_id("https://www.youtube.com/shorts/dQw4w9WgXcQ"),
            expected
        );
        assert_eq!(
            extract_video_id("https://m.youtube.com/embed/dQw4w9WgXcQ"),
            expected
        );
    }

    #[test]
    fn test_extract_video_id_rejects_garbage() {
        assert_eq!(extract_video_id("https://vimeo.com/123456"), None);
        assert_eq!(extract_video_id("https://vimeo.com/watch?v=dQw4w9WgXcQ"), None);
        assert_eq!(
            extract_video_id("https://notyoutube.com/watch?v=dQw4w9WgXcQ"),
            None
        );
        assert_eq!(extract_video_id("https://www.youtube.com/watch?v=short"), None);
        assert_eq!(extract_video_id("not a url"), None);
    }

    #[test]
    fn test_is_youtube_url() {
        assert!(is_youtube_url("https://www.YouTube.com/watch?v=test"));
        assert!(is_youtube_url("https://youtu.be/dQw4w9WgXcQ"));
        assert!(is_youtube_url("https://www.youtube-nocookie.com/embed/dQw4w9WgXcQ"));
        assert!(!is_youtube_url("https://vimeo.com/123456"));
        assert!(!is_youtube_url("https://evil.example/?u=youtube.com"));
        assert!(!is_youtube_url("youtube.com/watch?v=dQw4w9WgXcQ"));
    }

    #[test]
    fn test_build_watch_url() {
        assert_eq!(
            build_watch_url("https://www.youtube.com/", "dQw4w9WgXcQ"),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
    }
}
