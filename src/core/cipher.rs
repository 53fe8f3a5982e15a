//! Cipher resolution: turns a raw format into a playable URL.
//!
//! Signature failures drop the format; `n` failures keep it with the
//! original value, since such URLs still play (usually throttled).

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::decoder::Decoder;
use crate::error::{Result, YtResolveError};
use crate::types::{DecodeKind, DecodeRequest, NParamStatus, RawFormat};

/// Query parameter the signature goes into when the cipher does not say
pub const DEFAULT_SIGNATURE_PARAM: &str = "signature";

/// Decoder handle with a per-call time limit
#[derive(Clone)]
pub struct CipherBridge {
    decoder: Arc<dyn Decoder>,
    timeout: Duration,
}

impl CipherBridge {
    pub fn new(decoder: Arc<dyn Decoder>, timeout: Duration) -> Self {
        Self { decoder, timeout }
    }

    pub fn decoder_name(&self) -> &'static str {
        self.decoder.name()
    }

    /// Decode one token; errors, timeouts and empty answers are all `None`
    pub async fn decode(&self, kind: DecodeKind, token: &str) -> Option<String> {
        let request = DecodeRequest {
            kind,
            token: token.to_string(),
        };

        match tokio::time::timeout(self.timeout, self.decoder.decode(&request)).await {
            Ok(Ok(response)) => response.token.filter(|t| !t.is_empty()),
            Ok(Err(e)) => {
                warn!("{} decoder failed: {}", self.decoder.name(), e);
                None
            }
            Err(_) => {
                warn!(
                    "{} decoder timed out after {:?} on {} token",
                    self.decoder.name(),
                    self.timeout,
                    kind
                );
                None
            }
        }
    }
}

/// Fields of a `signatureCipher` value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureCipher {
    pub url: String,
    /// The obfuscated signature
    pub s: String,
    /// Query parameter name for the decoded signature
    pub sp: String,
}

/// Parse a `signatureCipher` query string
pub fn parse_signature_cipher(cipher: &str) -> Result<SignatureCipher> {
    let mut url = None;
    let mut s = None;
    let mut sp = None;

    for pair in cipher.split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let value = decode_component(value);
        match key {
            "url" => url = Some(value),
            "s" => s = Some(value),
            "sp" if !value.is_empty() => sp = Some(value),
            _ => {}
        }
    }

    Ok(SignatureCipher {
        url: url.ok_or_else(|| YtResolveError::parse("signatureCipher", "missing url"))?,
        s: s.ok_or_else(|| YtResolveError::parse("signatureCipher", "missing s"))?,
        sp: sp.unwrap_or_else(|| DEFAULT_SIGNATURE_PARAM.to_string()),
    })
}

fn decode_component(value: &str) -> String {
    let value = value.replace('+', " ");
    urlencoding::decode(&value)
        .map(|v| v.into_owned())
        .unwrap_or(value)
}

/// Split `url` into (before query, query, fragment-with-hash)
fn split_query(url: &str) -> (&str, Option<&str>, &str) {
    let (rest, fragment) = match url.find('#') {
        Some(i) => url.split_at(i),
        None => (url, ""),
    };
    match rest.split_once('?') {
        Some((base, query)) => (base, Some(query), fragment),
        None => (rest, None, fragment),
    }
}

/// Decoded value of the first `name` parameter in `url`
pub fn query_param(url: &str, name: &str) -> Option<String> {
    let (_, query, _) = split_query(url);
    query?.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        (key == name).then(|| decode_component(value))
    })
}

/// Set `name` to `value` in place, or append it.
///
/// Works on the raw text so every other parameter keeps its exact encoding.
pub fn set_query_param(url: &str, name: &str, value: &str) -> String {
    let (base, query, fragment) = split_query(url);
    let encoded = format!("{}={}", name, urlencoding::encode(value));

    let query = match query {
        Some(query) if !query.is_empty() => {
            let mut replaced = false;
            let pairs: Vec<String> = query
                .split('&')
                .map(|pair| {
                    let key = pair.split_once('=').map_or(pair, |(k, _)| k);
                    if key == name && !replaced {
                        replaced = true;
                        encoded.clone()
                    } else {
                        pair.to_string()
                    }
                })
                .collect();
            let mut query = pairs.join("&");
            if !replaced {
                query.push('&');
                query.push_str(&encoded);
            }
            query
        }
        _ => encoded,
    };

    format!("{}?{}{}", base, query, fragment)
}

/// Produce a playable URL for `format`, or `None` to drop it.
///
/// A URL without cipher and without `n` comes back unchanged.
pub async fn resolve_format_url(
    format: &RawFormat,
    bridge: &CipherBridge,
) -> Option<(String, NParamStatus)> {
    let mut url = match (&format.url, &format.signature_cipher) {
        (Some(url), _) => url.clone(),
        (None, Some(cipher)) => {
            let cipher = match parse_signature_cipher(cipher) {
                Ok(cipher) => cipher,
                Err(e) => {
                    debug!("Dropping itag {}: {}", format.itag, e);
                    return None;
                }
            };
            match bridge.decode(DecodeKind::Signature, &cipher.s).await {
                Some(signature) => set_query_param(&cipher.url, &cipher.sp, &signature),
                None => {
                    debug!("Dropping itag {}: signature not decoded", format.itag);
                    return None;
                }
            }
        }
        (None, None) => return None,
    };

    let n_status = match query_param(&url, "n") {
        None => NParamStatus::Absent,
        Some(n) => match bridge.decode(DecodeKind::NParam, &n).await {
            Some(decoded) => {
                url = set_query_param(&url, "n", &decoded);
                NParamStatus::Resolved
            }
            None => {
                debug!("Keeping original n for itag {} (may be throttled)", format.itag);
                NParamStatus::Unresolved
            }
        },
    };

    Some((url, n_status))
}
