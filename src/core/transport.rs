//! HTTP transport: browser-like default headers, transparent gzip/deflate and
//! redirect following with a bounded hop count.

use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, HeaderMap, HeaderValue, LOCATION, USER_AGENT,
};
use reqwest::{Method, StatusCode, Url};
use serde::Serialize;
use tracing::debug;

use crate::error::{Result, YtResolveError};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const DEFAULT_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// A fully read response
#[derive(Debug)]
pub struct HttpResponse {
    pub status: StatusCode,
    /// Location the body was finally served from
    pub url: Url,
    pub headers: HeaderMap,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct Transport {
    client: reqwest::Client,
    max_redirects: usize,
}

impl Transport {
    pub fn new(max_redirects: usize) -> Result<Self> {
        // Redirects are followed by hand so the hop count and the download
        // engine's discard-and-retry policy stay under our control.
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .gzip(true)
            .deflate(true)
            .build()?;

        Ok(Self {
            client,
            max_redirects,
        })
    }

    pub fn max_redirects(&self) -> usize {
        self.max_redirects
    }

    /// Issue exactly one request, without following redirects
    pub async fn send(
        &self,
        method: Method,
        url: &Url,
        headers: &HeaderMap,
        body: Option<&[u8]>,
    ) -> Result<reqwest::Response> {
        let mut request = self
            .client
            .request(method, url.clone())
            .headers(with_defaults(headers.clone()));

        if let Some(body) = body {
            request = request.body(body.to_vec());
        }

        request
            .send()
            .await
            .map_err(|e| YtResolveError::Network(format!("{}: {}", url, e)))
    }

    /// Request `url`, following redirects, and read the body as text.
    ///
    /// Non-2xx final responses become [`YtResolveError::HttpStatus`].
    pub async fn fetch(
        &self,
        method: Method,
        url: &str,
        headers: HeaderMap,
        body: Option<Vec<u8>>,
    ) -> Result<HttpResponse> {
        let mut current = parse_url(url)?;
        let mut method = method;
        let mut body = body;

        for hop in 0..=self.max_redirects {
            let response = self
                .send(method.clone(), &current, &headers, body.as_deref())
                .await?;
            let status = response.status();

            if is_redirect(status) {
                let next = redirect_target(&current, status, response.headers())?;
                debug!("Redirect {} ({}): {} -> {}", hop + 1, status, current, next);
                if status == StatusCode::SEE_OTHER {
                    method = Method::GET;
                    body = None;
                }
                current = next;
                continue;
            }

            if !status.is_success() {
                return Err(YtResolveError::HttpStatus {
                    status: status.as_u16(),
                    url: current.to_string(),
                });
            }

            let headers = response.headers().clone();
            let text = response.text().await?;
            return Ok(HttpResponse {
                status,
                url: current,
                headers,
                body: text,
            });
        }

        Err(YtResolveError::RedirectLimit {
            url: url.to_string(),
            limit: self.max_redirects,
        })
    }

    /// GET `url` and return its body
    pub async fn get_text(&self, url: &str, headers: HeaderMap) -> Result<String> {
        Ok(self.fetch(Method::GET, url, headers, None).await?.body)
    }

    /// POST `body` as JSON
    pub async fn post_json<B: Serialize>(
        &self,
        url: &str,
        body: &B,
        mut headers: HeaderMap,
    ) -> Result<HttpResponse> {
        let payload = serde_json::to_vec(body)?;
        headers
            .entry(CONTENT_TYPE)
            .or_insert(HeaderValue::from_static("application/json"));
        self.fetch(Method::POST, url, headers, Some(payload)).await
    }
}

pub fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|e| YtResolveError::InvalidUrl(format!("{}: {}", url, e)))
}

pub fn is_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

/// Resolve a `Location` value against the URL that produced it.
///
/// Handles absolute, protocol-relative and root-relative forms.
pub fn resolve_location(base: &Url, location: &str) -> Result<Url> {
    base.join(location.trim())
        .map_err(|e| YtResolveError::InvalidUrl(format!("{}: {}", location, e)))
}

pub(crate) fn redirect_target(
    current: &Url,
    status: StatusCode,
    headers: &HeaderMap,
) -> Result<Url> {
    let location = headers
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| YtResolveError::HttpStatus {
            status: status.as_u16(),
            url: current.to_string(),
        })?;
    resolve_location(current, location)
}

/// Fill in browser-like headers the caller did not set
fn with_defaults(mut headers: HeaderMap) -> HeaderMap {
    headers
        .entry(USER_AGENT)
        .or_insert(HeaderValue::from_static(DEFAULT_USER_AGENT));
    headers
        .entry(ACCEPT)
        .or_insert(HeaderValue::from_static(DEFAULT_ACCEPT));
    headers
        .entry(ACCEPT_LANGUAGE)
        .or_insert(HeaderValue::from_static(DEFAULT_ACCEPT_LANGUAGE));
    headers
}
