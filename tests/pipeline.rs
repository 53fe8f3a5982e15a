mod common;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

use common::{PLAYER_JS, PLAYER_PATH, spawn_server, watch_page};
use yt_resolve::decoder::Decoder;
use yt_resolve::error::{ErrorCode, Result as YtResult, YtResolveError};
use yt_resolve::storage::snapshots;
use yt_resolve::types::{
    Config, DecodeKind, DecodeRequest, DecodeResponse, MediaKind, NParamStatus, PipelineState,
    Stage,
};
use yt_resolve::Resolver;

const VIDEO_ID: &str = "dQw4w9WgXcQ";
const DIRECT_URL: &str = "https://rr1.example.com/videoplayback?itag=140&mime=audio%2Fmp4&clen=1048576";

#[derive(Clone)]
struct Site {
    player_response: Value,
    /// Last body POSTed to the player endpoint
    last_request: Arc<Mutex<Option<Value>>>,
}

async fn watch(headers: HeaderMap) -> impl IntoResponse {
    let cookie = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !cookie.contains("CONSENT=YES") {
        return (StatusCode::FORBIDDEN, String::new());
    }
    (StatusCode::OK, watch_page(PLAYER_PATH))
}

async fn player_api(State(site): State<Site>, Json(body): Json<Value>) -> Json<Value> {
    *site.last_request.lock().unwrap() = Some(body);
    Json(site.player_response.clone())
}

async fn spawn_site(player_response: Value) -> (String, Site) {
    let site = Site {
        player_response,
        last_request: Arc::new(Mutex::new(None)),
    };
    let app = Router::new()
        .route("/watch", get(watch))
        .route(PLAYER_PATH, get(|| async { PLAYER_JS }))
        .route("/youtubei/v1/player", post(player_api))
        .with_state(site.clone());
    (spawn_server(app).await, site)
}

fn config_for(origin: &str) -> Config {
    Config {
        site_origin: origin.to_string(),
        cache_player_scripts: false,
        ..Config::default()
    }
}

fn ok_response(adaptive: Value) -> Value {
    json!({
        "playabilityStatus": { "status": "OK" },
        "streamingData": {
            "expiresInSeconds": "21540",
            "formats": [],
            "adaptiveFormats": adaptive
        },
        "videoDetails": {
            "videoId": VIDEO_ID,
            "title": "Test Video",
            "author": "Tester",
            "lengthSeconds": "212"
        }
    })
}

/// Decoder answering from a fixed table
struct TableDecoder(Vec<(DecodeKind, &'static str, &'static str)>);

#[async_trait]
impl Decoder for TableDecoder {
    fn name(&self) -> &'static str {
        "table"
    }

    async fn decode(&self, request: &DecodeRequest) -> YtResult<DecodeResponse> {
        Ok(DecodeResponse {
            token: self
                .0
                .iter()
                .find(|(kind, from, _)| *kind == request.kind && *from == request.token)
                .map(|(_, _, to)| to.to_string()),
        })
    }
}

#[tokio::test]
async fn direct_audio_format_resolves_unchanged() {
    let (origin, site) = spawn_site(ok_response(json!([{
        "itag": 140,
        "mimeType": "audio/mp4; codecs=\"mp4a.40.2\"",
        "bitrate": 130000,
        "contentLength": "1048576",
        "audioQuality": "AUDIO_QUALITY_MEDIUM",
        "url": DIRECT_URL
    }])))
    .await;

    let mut resolver = Resolver::new(config_for(&origin)).unwrap();
    let resolution = resolver
        .resolve(&format!("https://www.youtube.com/watch?v={}", VIDEO_ID))
        .await
        .unwrap();

    let catalog = &resolution.catalog;
    assert_eq!(catalog.len(), 1);
    let audio: Vec<_> = catalog.audio().collect();
    assert_eq!(audio.len(), 1);
    assert_eq!(audio[0].kind, MediaKind::Audio);
    assert_eq!(audio[0].filesize_str, "1.00 MB");
    assert_eq!(audio[0].url, DIRECT_URL);
    assert_eq!(audio[0].n_param, NParamStatus::Absent);

    assert_eq!(resolution.player.id, "abc12345");
    assert_eq!(resolution.player.signature_timestamp, Some(20123));
    assert_eq!(resolution.config.api_key(), Some("AIzaTestKey"));
    assert_eq!(resolution.config.get_str("GL"), Some("US"));
    assert_eq!(resolution.title(), Some("Test Video"));
    assert_eq!(resolver.state(), &PipelineState::CatalogBuilt);

    let request = site.last_request.lock().unwrap().clone().unwrap();
    assert_eq!(request["videoId"], VIDEO_ID);
    assert_eq!(request["context"]["client"]["clientName"], "ANDROID");
    assert_eq!(
        request["playbackContext"]["contentPlaybackContext"]["signatureTimestamp"],
        20123
    );
}

#[tokio::test]
async fn unplayable_video_fails_at_metadata() {
    let (origin, _site) = spawn_site(json!({
        "playabilityStatus": { "status": "ERROR", "reason": "Video unavailable" }
    }))
    .await;

    let mut resolver = Resolver::new(config_for(&origin)).unwrap();
    let err = resolver.resolve(VIDEO_ID).await.unwrap_err();

    match &err {
        YtResolveError::StatusNotOk { status, reason } => {
            assert_eq!(status, "ERROR");
            assert_eq!(reason, "Video unavailable");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(err.code(), ErrorCode::StatusNotOk);
    assert!(matches!(
        resolver.state(),
        PipelineState::Failed {
            stage: Stage::Metadata,
            ..
        }
    ));
}

#[tokio::test]
async fn ciphered_formats_go_through_the_decoder() {
    let (origin, _site) = spawn_site(ok_response(json!([
        {
            "itag": 251,
            "mimeType": "audio/webm; codecs=\"opus\"",
            "bitrate": 160000,
            "signatureCipher": "s=SCRAMBLED&sp=sig&url=https%3A%2F%2Frr1.example.com%2Fvideoplayback%3Fitag%3D251%26n%3Dslow"
        },
        {
            "itag": 250,
            "mimeType": "audio/webm; codecs=\"opus\"",
            "bitrate": 70000,
            "signatureCipher": "s=UNKNOWN&url=https%3A%2F%2Frr1.example.com%2Fvideoplayback%3Fitag%3D250"
        },
        {
            "itag": 249,
            "mimeType": "audio/webm; codecs=\"opus\"",
            "bitrate": 50000,
            "url": "https://rr1.example.com/videoplayback?itag=249&n=stuck"
        }
    ])))
    .await;

    let decoder = TableDecoder(vec![
        (DecodeKind::Signature, "SCRAMBLED", "plain"),
        (DecodeKind::NParam, "slow", "fast"),
    ]);
    let mut resolver = Resolver::new(config_for(&origin))
        .unwrap()
        .with_decoder(Arc::new(decoder));
    let resolution = resolver.resolve(VIDEO_ID).await.unwrap();
    let catalog = &resolution.catalog;

    let itags: Vec<u32> = catalog.formats.iter().map(|f| f.itag).collect();
    assert_eq!(itags, vec![251, 249]);

    let opus = catalog.by_itag(251).unwrap();
    assert_eq!(
        opus.url,
        "https://rr1.example.com/videoplayback?itag=251&n=fast&sig=plain"
    );
    assert_eq!(opus.n_param, NParamStatus::Resolved);

    let stuck = catalog.by_itag(249).unwrap();
    assert_eq!(stuck.url, "https://rr1.example.com/videoplayback?itag=249&n=stuck");
    assert_eq!(stuck.n_param, NParamStatus::Unresolved);
    assert_eq!(stuck.filesize_str, "Unknown");
}

#[tokio::test]
async fn missing_streaming_data_fails_at_catalog() {
    let (origin, _site) = spawn_site(json!({ "playabilityStatus": { "status": "OK" } })).await;

    let mut resolver = Resolver::new(config_for(&origin)).unwrap();
    let err = resolver.resolve(VIDEO_ID).await.unwrap_err();
    assert!(matches!(err, YtResolveError::NoStreamingData));
    assert!(matches!(
        resolver.state(),
        PipelineState::Failed {
            stage: Stage::Catalog,
            ..
        }
    ));
}

#[tokio::test]
async fn snapshots_and_cache_are_written() {
    let (origin, _site) = spawn_site(ok_response(json!([{
        "itag": 140,
        "mimeType": "audio/mp4",
        "contentLength": "1048576",
        "url": DIRECT_URL
    }])))
    .await;

    let snapshot_dir = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();
    let config = Config {
        snapshot_dir: Some(snapshot_dir.path().to_string_lossy().to_string()),
        cache_player_scripts: true,
        cache_dir: Some(cache_dir.path().to_string_lossy().to_string()),
        decoder: yt_resolve::types::DecoderConfig {
            timeout_secs: 1,
            ..Default::default()
        },
        ..config_for(&origin)
    };

    let mut resolver = Resolver::new(config).unwrap();
    let resolution = resolver.resolve(VIDEO_ID).await.unwrap();
    assert_eq!(
        resolution.player.path.as_deref(),
        Some(cache_dir.path().join("abc12345.js").as_path())
    );

    let runs: Vec<_> = std::fs::read_dir(snapshot_dir.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(runs.len(), 1);
    for name in [
        snapshots::PAGE_FILE,
        snapshots::CONFIG_FILE,
        snapshots::PLAYER_FILE,
        snapshots::METADATA_FILE,
        snapshots::FORMATS_FILE,
    ] {
        assert!(runs[0].join(name).is_file(), "missing {}", name);
    }

    // Second run is served from the cache
    let mut again = Resolver::new(Config {
        cache_player_scripts: true,
        cache_dir: Some(cache_dir.path().to_string_lossy().to_string()),
        ..config_for(&origin)
    })
    .unwrap();
    let second = again.resolve(VIDEO_ID).await.unwrap();
    assert_eq!(second.player.content, resolution.player.content);
}

/// Watch page that also embeds `embedded` as `ytInitialPlayerResponse`
async fn spawn_embedding_site(embedded: Value, api_status: StatusCode, api_body: Value) -> String {
    let page = format!(
        "{}<script>var ytInitialPlayerResponse = {};var meta = {{}};</script>",
        watch_page(PLAYER_PATH),
        embedded
    );
    let app = Router::new()
        .route("/watch", get(move || async move { page }))
        .route(PLAYER_PATH, get(|| async { PLAYER_JS }))
        .route(
            "/youtubei/v1/player",
            post(move || async move { (api_status, Json(api_body)) }),
        );
    spawn_server(app).await
}

#[tokio::test]
async fn embedded_response_covers_a_failed_api_call() {
    let embedded = ok_response(json!([{
        "itag": 140,
        "mimeType": "audio/mp4",
        "contentLength": "1048576",
        "url": DIRECT_URL
    }]));
    let origin =
        spawn_embedding_site(embedded, StatusCode::INTERNAL_SERVER_ERROR, json!({})).await;

    let mut resolver = Resolver::new(config_for(&origin)).unwrap();
    let resolution = resolver.resolve(VIDEO_ID).await.unwrap();

    assert_eq!(resolution.catalog.len(), 1);
    assert_eq!(resolution.catalog.by_itag(140).unwrap().url, DIRECT_URL);
    assert_eq!(resolution.title(), Some("Test Video"));
    assert_eq!(resolver.state(), &PipelineState::CatalogBuilt);
}

#[tokio::test]
async fn unplayable_api_answer_ignores_embedded_response() {
    let embedded = ok_response(json!([{
        "itag": 140,
        "mimeType": "audio/mp4",
        "url": DIRECT_URL
    }]));
    let unplayable = json!({
        "playabilityStatus": { "status": "LOGIN_REQUIRED", "reason": "Sign in to confirm your age" }
    });
    let origin = spawn_embedding_site(embedded, StatusCode::OK, unplayable).await;

    let mut resolver = Resolver::new(config_for(&origin)).unwrap();
    let err = resolver.resolve(VIDEO_ID).await.unwrap_err();

    assert!(matches!(
        err,
        YtResolveError::StatusNotOk { ref status, .. } if status == "LOGIN_REQUIRED"
    ));
    assert!(matches!(
        resolver.state(),
        PipelineState::Failed {
            stage: Stage::Metadata,
            ..
        }
    ));
}
