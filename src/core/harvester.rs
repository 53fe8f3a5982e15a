//! Config harvesting from watch-page markup
//!
//! Three layers, each more heuristic than the last:
//! 1. every `ytcfg.set({...})` object, parsed strictly and then leniently
//! 2. single-capture patterns for keys the objects did not provide
//! 3. an ordered chain of player-script URL extractors
//!
//! The page's own `ytInitialPlayerResponse` is picked up too, as a stand-in
//! for the player API.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{Result, YtResolveError};
use crate::types::{Configuration, PlaybackDescription};

static YTCFG_SET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ytcfg\.set\s*\(").expect("Invalid regex"));

static INITIAL_PLAYER_RESPONSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ytInitialPlayerResponse\s*=\s*").expect("Invalid regex"));

static UNICODE_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\u([0-9a-fA-F]{4})").expect("Invalid regex"));

/// Textual fallbacks per configuration key, tried in order
static KEY_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("INNERTUBE_API_KEY", r#""INNERTUBE_API_KEY"\s*:\s*"([^"]+)""#),
        ("INNERTUBE_API_KEY", r#""innertubeApiKey"\s*:\s*"([^"]+)""#),
        ("INNERTUBE_CLIENT_NAME", r#""INNERTUBE_CLIENT_NAME"\s*:\s*"([^"]+)""#),
        ("INNERTUBE_CLIENT_VERSION", r#""INNERTUBE_CLIENT_VERSION"\s*:\s*"([^"]+)""#),
        ("INNERTUBE_CLIENT_VERSION", r#""clientVersion"\s*:\s*"([^"]+)""#),
        ("VISITOR_DATA", r#""VISITOR_DATA"\s*:\s*"([^"]+)""#),
        ("VISITOR_DATA", r#""visitorData"\s*:\s*"([^"]+)""#),
        ("PLAYER_JS_URL", r#""PLAYER_JS_URL"\s*:\s*"([^"]+)""#),
        ("STS", r#""STS"\s*:\s*(\d+)"#),
        ("HL", r#""HL"\s*:\s*"([^"]+)""#),
    ]
    .into_iter()
    .map(|(key, pattern)| (key, Regex::new(pattern).expect("Invalid regex")))
    .collect()
});

static JS_URL_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""jsUrl"\s*:\s*"([^"]+)""#).expect("Invalid regex"));

static PLAYER_JS_URL_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""PLAYER_JS_URL"\s*:\s*"([^"]+)""#).expect("Invalid regex"));

static PLAYER_BASE_SCRIPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<script[^>]*\ssrc="([^"]+)"[^>]*name="player/base""#).expect("Invalid regex")
});

static BASE_JS_SRC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<script[^>]*\ssrc="([^"]*/player/[^"]*/base\.js)""#).expect("Invalid regex")
});

static BARE_PLAYER_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/s/player/([A-Za-z0-9_-]{6,})/").expect("Invalid regex"));

/// Result of harvesting one page
#[derive(Debug, Clone)]
pub struct Harvest {
    pub config: Configuration,
    /// Absolute player script URL
    pub player_script_url: String,
    /// Playback description embedded in the page, if any
    pub embedded_playback: Option<PlaybackDescription>,
}

/// Harvest configuration and the player script URL from `html`.
///
/// Root-relative URLs are expanded against `origin`. Fails only when no
/// player script URL can be found by any method.
pub fn harvest(html: &str, origin: &str) -> Result<Harvest> {
    let mut config = harvest_ytcfg(html);
    let strict_keys = config.len();
    apply_key_patterns(html, &mut config);
    debug!(
        "Harvested {} config keys ({} from ytcfg.set)",
        config.len(),
        strict_keys
    );

    let player_script_url =
        resolve_player_url(&config, html, origin).ok_or(YtResolveError::PlayerScriptNotFound)?;

    let embedded_playback = extract_initial_player_response(html);
    if embedded_playback.is_some() {
        debug!("Page embeds a player response");
    }

    Ok(Harvest {
        config,
        player_script_url,
        embedded_playback,
    })
}

/// First `ytInitialPlayerResponse = {...}` assignment that parses
pub fn extract_initial_player_response(html: &str) -> Option<PlaybackDescription> {
    INITIAL_PLAYER_RESPONSE.find_iter(html).find_map(|m| {
        let rest = &html[m.end()..];
        if !rest.starts_with('{') {
            return None;
        }
        let raw = extract_balanced_object(rest).ok()?;
        match serde_json::from_str::<PlaybackDescription>(raw) {
            Ok(description) => Some(description),
            Err(e) => {
                debug!("Skipping embedded player response: {}", e);
                None
            }
        }
    })
}

/// Merge every parseable `ytcfg.set({...})` object; later calls win
pub fn harvest_ytcfg(html: &str) -> Configuration {
    let mut config = Configuration::default();

    for m in YTCFG_SET.find_iter(html) {
        let rest = &html[m.end()..];
        if !rest.trim_start().starts_with('{') {
            continue;
        }

        let parsed = extract_balanced_object(rest).and_then(parse_config_object);
        match parsed {
            Ok(values) => config.merge(values),
            Err(e) => debug!("Skipping ytcfg.set at byte {}: {}", m.start(), e),
        }
    }

    config
}

/// Fill keys the `ytcfg.set` objects did not provide. Never overwrites.
pub fn apply_key_patterns(html: &str, config: &mut Configuration) {
    for (key, pattern) in KEY_PATTERNS.iter() {
        if config.contains_key(key) {
            continue;
        }
        if let Some(value) = pattern.captures(html).and_then(|c| c.get(1)) {
            config.insert(key, Value::String(unescape_js(value.as_str())));
        }
    }
}

/// Slice out the first balanced `{...}` in `text`.
///
/// Braces inside string literals do not count.
pub fn extract_balanced_object(text: &str) -> Result<&str> {
    let start = text
        .find('{')
        .ok_or_else(|| YtResolveError::parse("embedded object", "no opening brace"))?;

    let mut depth = 0usize;
    let mut in_string: Option<char> = None;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if let Some(quote) = in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == quote {
                in_string = None;
            }
            continue;
        }

        match c {
            '"' | '\'' => in_string = Some(c),
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    Err(YtResolveError::parse(
        "embedded object",
        "unterminated object literal",
    ))
}

/// Strict JSON first, then the lenient rewrite
fn parse_config_object(raw: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Map<String, Value>>(raw) {
        Ok(values) => Ok(values),
        Err(strict) => {
            let recovered = recover_js_object(raw);
            serde_json::from_str::<Map<String, Value>>(&recovered).map_err(|e| {
                YtResolveError::parse("ytcfg object", format!("{} (strict: {})", e, strict))
            })
        }
    }
}

/// Rewrite a JavaScript object literal towards JSON: single-quoted strings,
/// unquoted keys and trailing commas.
///
/// String contents are copied as they are, so quotes, commas and colons
/// inside values never trigger a rewrite.
pub fn recover_js_object(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len() + 16);
    let mut key_position = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' | '\'' => {
                i = copy_string_literal(&chars, i, &mut out);
                key_position = false;
            }
            ',' if matches!(next_significant(&chars, i + 1), Some('}' | ']')) => {
                i += 1;
            }
            '{' | ',' => {
                out.push(c);
                key_position = true;
                i += 1;
            }
            c if key_position && is_ident_start(c) => {
                let start = i;
                while i < chars.len() && is_ident_char(chars[i]) {
                    i += 1;
                }
                let quote = next_significant(&chars, i) == Some(':');
                if quote {
                    out.push('"');
                }
                out.extend(&chars[start..i]);
                if quote {
                    out.push('"');
                }
                key_position = false;
            }
            c if c.is_whitespace() => {
                out.push(c);
                i += 1;
            }
            _ => {
                out.push(c);
                key_position = false;
                i += 1;
            }
        }
    }

    out
}

/// Copy the string literal opening at `start` as a JSON string; returns the
/// index just past its closing quote
fn copy_string_literal(chars: &[char], start: usize, out: &mut String) -> usize {
    let quote = chars[start];
    let mut i = start + 1;
    out.push('"');

    while i < chars.len() {
        let c = chars[i];
        if c == '\\' {
            match chars.get(i + 1) {
                // JSON has no \' escape
                Some('\'') => out.push('\''),
                Some(&next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            }
            i += 2;
            continue;
        }
        if c == quote {
            out.push('"');
            return i + 1;
        }
        if c == '"' {
            out.push_str("\\\"");
        } else {
            out.push(c);
        }
        i += 1;
    }

    i
}

fn next_significant(chars: &[char], from: usize) -> Option<char> {
    chars.iter().skip(from).copied().find(|c| !c.is_whitespace())
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

type PlayerUrlPattern = fn(&str) -> Option<String>;

/// Page-level player URL extractors, most reliable first
const PLAYER_URL_PATTERNS: &[PlayerUrlPattern] = &[
    js_url_field,
    player_js_url_field,
    player_base_script,
    base_js_script_src,
];

fn first_capture(re: &Regex, html: &str) -> Option<String> {
    re.captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn js_url_field(html: &str) -> Option<String> {
    first_capture(&JS_URL_FIELD, html)
}

fn player_js_url_field(html: &str) -> Option<String> {
    first_capture(&PLAYER_JS_URL_FIELD, html)
}

fn player_base_script(html: &str) -> Option<String> {
    first_capture(&PLAYER_BASE_SCRIPT, html)
}

fn base_js_script_src(html: &str) -> Option<String> {
    first_capture(&BASE_JS_SRC, html)
}

/// Configuration field, then page patterns, then a URL built from a bare player id
pub fn resolve_player_url(config: &Configuration, html: &str, origin: &str) -> Option<String> {
    if let Some(url) = config.player_js_url() {
        return Some(normalize_player_url(url, origin));
    }

    if let Some(url) = PLAYER_URL_PATTERNS.iter().find_map(|pattern| pattern(html)) {
        return Some(normalize_player_url(&url, origin));
    }

    let id = first_capture(&BARE_PLAYER_ID, html)?;
    warn!("Player URL not found directly, building one from player id {}", id);
    Some(format!(
        "{}/s/player/{}/player_ias.vflset/en_US/base.js",
        origin.trim_end_matches('/'),
        id
    ))
}

/// Undo script escaping and HTML entities, then make the URL absolute
pub fn normalize_player_url(raw: &str, origin: &str) -> String {
    let unescaped = unescape_js(raw);
    let decoded = html_escape::decode_html_entities(&unescaped).to_string();

    if decoded.starts_with("http://") || decoded.starts_with("https://") {
        decoded
    } else if let Some(rest) = decoded.strip_prefix("//") {
        format!("https://{}", rest)
    } else if decoded.starts_with('/') {
        format!("{}{}", origin.trim_end_matches('/'), decoded)
    } else {
        format!("{}/{}", origin.trim_end_matches('/'), decoded)
    }
}

/// `\/` and `\uXXXX` as they appear inside script string literals
pub fn unescape_js(s: &str) -> String {
    let slashes = s.replace("\\/", "/");
    UNICODE_ESCAPE
        .replace_all(&slashes, |caps: &Captures| {
            u32::from_str_radix(&caps[1], 16)
                .ok()
                .and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
