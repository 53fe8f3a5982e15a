//! Remote decode service client

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Serialize;

use super::Decoder;
use crate::core::transport::Transport;
use crate::error::{Result, YtResolveError};
use crate::types::{DecodeKind, DecodeRequest, DecodeResponse, PlayerScript};

#[derive(Debug, Serialize)]
struct RemoteRequest<'a> {
    kind: DecodeKind,
    token: &'a str,
    player_url: &'a str,
}

/// POSTs `{kind, token, player_url}` to `<base>/decode`
pub struct RemoteDecoder {
    transport: Transport,
    endpoint: String,
    auth_token: Option<String>,
    player_url: String,
}

impl RemoteDecoder {
    pub fn new(
        transport: Transport,
        base_url: String,
        auth_token: Option<String>,
        player: &PlayerScript,
    ) -> Self {
        Self {
            transport,
            endpoint: format!("{}/decode", base_url.trim_end_matches('/')),
            auth_token,
            player_url: player.url.clone(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Decoder for RemoteDecoder {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn decode(&self, request: &DecodeRequest) -> Result<DecodeResponse> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.auth_token {
            let value = HeaderValue::from_str(token).map_err(|e| {
                YtResolveError::InvalidConfig(format!("Invalid decoder token: {}", e))
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let body = RemoteRequest {
            kind: request.kind,
            token: &request.token,
            player_url: &self.player_url,
        };

        let response = self
            .transport
            .post_json(&self.endpoint, &body, headers)
            .await
            .map_err(|e| YtResolveError::Decode {
                kind: request.kind,
                reason: e.to_string(),
            })?;

        serde_json::from_str(&response.body).map_err(|e| YtResolveError::Decode {
            kind: request.kind,
            reason: format!("Invalid decoder response: {}", e),
        })
    }
}
