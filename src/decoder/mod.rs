//! Decoder seam for obfuscated signature and `n` tokens.
//!
//! The decoding algorithm lives outside this crate; backends only move a
//! `{kind, token}` request to something that can run the player script.

pub mod command;
pub mod remote;

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

use crate::core::transport::Transport;
use crate::error::Result;
use crate::types::{DecodeRequest, DecodeResponse, DecoderConfig, PlayerScript};

pub use command::CommandDecoder;
pub use remote::RemoteDecoder;

/// Turns an obfuscated token into its decoded form.
///
/// `Ok(DecodeResponse { token: None })` means "cannot decode this one";
/// callers treat errors the same way.
#[async_trait]
pub trait Decoder: Send + Sync {
    fn name(&self) -> &'static str;

    async fn decode(&self, request: &DecodeRequest) -> Result<DecodeResponse>;
}

/// Used when no backend is configured; never decodes anything
#[derive(Debug, Default)]
pub struct NullDecoder {
    warned: AtomicBool,
}

impl NullDecoder {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Decoder for NullDecoder {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn decode(&self, request: &DecodeRequest) -> Result<DecodeResponse> {
        if !self.warned.swap(true, Ordering::Relaxed) {
            warn!(
                "No decoder configured; {} tokens cannot be decoded (set --decoder-cmd or --decoder-url)",
                request.kind
            );
        }
        Ok(DecodeResponse::default())
    }
}

/// Pick a backend for `config`, bound to the current player script.
///
/// A command wins over a remote URL when both are set.
pub fn build_decoder(
    config: &DecoderConfig,
    player: &PlayerScript,
    transport: &Transport,
) -> Result<Arc<dyn Decoder>> {
    if let Some(program) = &config.command {
        debug!("Using command decoder: {}", program);
        return Ok(Arc::new(CommandDecoder::new(
            program.clone(),
            config.args.clone(),
            player,
        )?));
    }

    if let Some(url) = &config.url {
        debug!("Using remote decoder: {}", url);
        return Ok(Arc::new(RemoteDecoder::new(
            transport.clone(),
            url.clone(),
            config.token.clone(),
            player,
        )));
    }

    Ok(Arc::new(NullDecoder::new()))
}
