//! Resolution pipeline: page → config → player script → metadata → catalog.
//!
//! Stages run strictly in order; the first fatal error stops the run and is
//! returned unchanged, with the state recording which stage failed.

use reqwest::header::{COOKIE, HeaderMap, HeaderValue};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::core::catalog::{FormatCatalog, build_catalog};
use crate::core::cipher::CipherBridge;
use crate::core::downloader::{self, DownloadProgress, DownloadReport};
use crate::core::harvester::{self, Harvest};
use crate::core::innertube::{self, Locale};
use crate::core::player_script::fetch_player_script;
use crate::core::transport::Transport;
use crate::decoder::{Decoder, build_decoder};
use crate::error::{Result, YtResolveError};
use crate::storage::cache::PlayerCache;
use crate::storage::snapshots::{self, Snapshot};
use crate::types::{
    Config, Configuration, PipelineState, PlaybackDescription, PlayerScript, ResolvedFormat,
    Stage,
};
use crate::utils::paths::get_player_cache_dir;
use crate::utils::video_id::{build_watch_url, extract_video_id};

/// Pre-accepted consent so EU-routed requests get the watch page
const CONSENT_COOKIE: &str = "CONSENT=YES+cb; SOCS=CAI";

/// Everything a successful run produced
#[derive(Debug, Clone)]
pub struct Resolution {
    pub video_id: String,
    pub config: Configuration,
    pub player: PlayerScript,
    pub description: PlaybackDescription,
    pub catalog: FormatCatalog,
}

impl Resolution {
    /// Video title when the API returned one
    pub fn title(&self) -> Option<&str> {
        self.catalog
            .details
            .as_ref()
            .map(|d| d.title.as_str())
            .filter(|t| !t.is_empty())
    }
}

pub struct Resolver {
    config: Config,
    transport: Transport,
    decoder: Option<Arc<dyn Decoder>>,
    cache: Option<PlayerCache>,
    state: PipelineState,
}

impl Resolver {
    pub fn new(config: Config) -> Result<Self> {
        if config.site_origin.trim().is_empty() {
            return Err(YtResolveError::InvalidConfig("site_origin is empty".into()));
        }

        let transport = Transport::new(config.max_redirects)?;
        let cache = config.cache_player_scripts.then(|| {
            let dir = config
                .cache_dir
                .as_ref()
                .map(PathBuf::from)
                .unwrap_or_else(get_player_cache_dir);
            PlayerCache::new(dir, config.player_cache_ttl_secs)
        });

        Ok(Self {
            config,
            transport,
            decoder: None,
            cache,
            state: PipelineState::Start,
        })
    }

    /// Use `decoder` instead of the one described by the config
    pub fn with_decoder(mut self, decoder: Arc<dyn Decoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    fn advance(&mut self, next: PipelineState) {
        debug!("Pipeline: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Record a failure at `stage` and pass the result through untouched
    fn check<T>(&mut self, stage: Stage, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            warn!("Pipeline failed at {}: {}", stage, e);
            self.state = PipelineState::Failed {
                stage,
                reason: e.to_string(),
            };
        }
        result
    }

    /// Resolve a watch URL (or bare video id) into a format catalog
    pub async fn resolve(&mut self, input: &str) -> Result<Resolution> {
        self.state = PipelineState::Start;

        let video_id = extract_video_id(input)
            .ok_or_else(|| YtResolveError::InvalidUrl(format!("No video id in {}", input)));
        let video_id = self.check(Stage::PageFetch, video_id)?;
        info!("Resolving {}", video_id);

        let snapshot = self
            .config
            .snapshot_dir
            .as_ref()
            .map(|dir| Snapshot::new(dir, &video_id));

        // Page
        let watch_url = build_watch_url(&self.config.site_origin, &video_id);
        let page = self.fetch_page(&watch_url).await;
        let page = self.check(Stage::PageFetch, page)?;
        if let Some(snapshot) = &snapshot {
            snapshot.write_text(snapshots::PAGE_FILE, &page).await;
        }
        self.advance(PipelineState::PageFetched);

        // Config
        let harvest = harvester::harvest(&page, &self.config.site_origin);
        let Harvest {
            config,
            player_script_url,
            embedded_playback,
        } = self.check(Stage::ConfigHarvest, harvest)?;
        if let Some(snapshot) = &snapshot {
            snapshot.write_json(snapshots::CONFIG_FILE, &config).await;
        }
        self.advance(PipelineState::ConfigHarvested);

        // Player script
        let player =
            fetch_player_script(&self.transport, &player_script_url, self.cache.as_ref()).await;
        let player = self.check(Stage::PlayerScript, player)?;
        if let Some(snapshot) = &snapshot {
            let summary = serde_json::json!({
                "url": player.url,
                "id": player.id,
                "signature_timestamp": player.signature_timestamp,
            });
            snapshot.write_json(snapshots::PLAYER_FILE, &summary).await;
        }
        self.advance(PipelineState::PlayerScriptResolved);

        // Metadata
        let locale = Locale {
            language: self.config.language.clone(),
            region: self.config.region.clone(),
            time_zone: self.config.time_zone.clone(),
        };
        let description = innertube::fetch_playback(
            &self.transport,
            &self.config.site_origin,
            &video_id,
            &config,
            player.signature_timestamp,
            &locale,
        )
        .await;
        // The page's own copy stands in when the API call itself broke
        let description = match (description, embedded_playback) {
            (Err(e), Some(embedded)) if e.is_transport_or_parse() => {
                warn!("Player API failed ({}), using the embedded player response", e);
                Ok(embedded)
            }
            (result, _) => result,
        };
        let description = self.check(Stage::Metadata, description)?;
        if let Some(snapshot) = &snapshot {
            snapshot
                .write_json(snapshots::METADATA_FILE, &description)
                .await;
        }
        let playable = description.ensure_playable();
        self.check(Stage::Metadata, playable)?;
        self.advance(PipelineState::MetadataFetched);

        // Catalog
        let decoder = match &self.decoder {
            Some(decoder) => Ok(decoder.clone()),
            None => build_decoder(&self.config.decoder, &player, &self.transport),
        };
        let decoder = self.check(Stage::Catalog, decoder)?;
        let bridge = CipherBridge::new(
            decoder,
            Duration::from_secs(self.config.decoder.timeout_secs),
        );
        let catalog = build_catalog(&description, &bridge, self.config.decode_concurrency).await;
        let catalog = self.check(Stage::Catalog, catalog)?;
        if let Some(snapshot) = &snapshot {
            snapshot
                .write_json(snapshots::FORMATS_FILE, &catalog.formats)
                .await;
        }
        self.advance(PipelineState::CatalogBuilt);

        Ok(Resolution {
            video_id,
            config,
            player,
            description,
            catalog,
        })
    }

    /// Download one catalog entry to `dest`
    pub async fn download<F>(
        &mut self,
        format: &ResolvedFormat,
        dest: &Path,
        cancel: Option<&AtomicBool>,
        on_progress: F,
    ) -> Result<DownloadReport>
    where
        F: FnMut(DownloadProgress),
    {
        let report =
            downloader::download(&self.transport, &format.url, dest, cancel, on_progress).await;
        let report = self.check(Stage::Download, report)?;
        info!("Saved {} ({} bytes)", report.path.display(), report.bytes);
        self.advance(PipelineState::Downloaded);
        Ok(report)
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        let mut headers = HeaderMap::new();
        if self.config.consent_cookie {
            headers.insert(COOKIE, HeaderValue::from_static(CONSENT_COOKIE));
        }
        let page = self.transport.get_text(url, headers).await?;
        debug!("Fetched watch page ({} bytes)", page.len());
        Ok(page)
    }
}

/// `<video_id>-<itag>.<ext>`
pub fn default_file_name(video_id: &str, format: &ResolvedFormat) -> String {
    format!("{}-{}.{}", video_id, format.itag, format.extension())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FormatSource, MediaKind, NParamStatus};

    #[test]
    fn test_default_file_name() {
        let format = ResolvedFormat {
            itag: 140,
            mime_type: "audio/mp4; codecs=\"mp4a.40.2\"".into(),
            quality: None,
            quality_label: None,
            width: None,
            height: None,
            fps: None,
            bitrate: None,
            content_length: None,
            audio_quality: None,
            url: "https://a/140".into(),
            filesize_str: "Unknown".into(),
            kind: MediaKind::Audio,
            source: FormatSource::Adaptive,
            n_param: NParamStatus::Absent,
        };
        assert_eq!(default_file_name("dQw4w9WgXcQ", &format), "dQw4w9WgXcQ-140.m4a");
    }

    #[tokio::test]
    async fn test_invalid_input_fails_at_page_fetch() {
        let config = Config {
            cache_player_scripts: false,
            ..Config::default()
        };
        let mut resolver = Resolver::new(config).unwrap();
        let err = resolver.resolve("https://vimeo.com/123").await.unwrap_err();
        assert!(matches!(err, YtResolveError::InvalidUrl(_)));
        assert!(matches!(
            resolver.state(),
            PipelineState::Failed {
                stage: Stage::PageFetch,
                ..
            }
        ));
    }

    #[test]
    fn test_empty_origin_is_rejected() {
        let config = Config {
            site_origin: " ".into(),
            ..Config::default()
        };
        assert!(matches!(
            Resolver::new(config),
            Err(YtResolveError::InvalidConfig(_))
        ));
    }
}
