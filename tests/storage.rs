use yt_resolve::storage::cache::{DEFAULT_TTL, PlayerCache, get_cache_key};
use yt_resolve::storage::config::{load_config_from, save_config_to};
use yt_resolve::types::{Config, UNKNOWN_PLAYER_ID};

const URL: &str = "https://www.youtube.com/yts/jsbin/player-en_US/base.js";

#[test]
fn unknown_player_id_is_cached_by_url_hash() {
    let dir = tempfile::tempdir().unwrap();
    let cache = PlayerCache::new(dir.path(), DEFAULT_TTL);

    let path = tokio_test::block_on(cache.store(URL, UNKNOWN_PLAYER_ID, "var p;")).unwrap();
    let key = get_cache_key(URL, UNKNOWN_PLAYER_ID);
    assert_eq!(path, dir.path().join(format!("{}.js", key)));

    let (script, _) = tokio_test::block_on(cache.get(URL, UNKNOWN_PLAYER_ID)).unwrap();
    assert_eq!(script, "var p;");

    tokio_test::block_on(cache.clear()).unwrap();
    assert!(tokio_test::block_on(cache.get(URL, UNKNOWN_PLAYER_ID)).is_none());
}

#[test]
fn config_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");

    let config = Config {
        max_redirects: 4,
        snapshot_dir: Some("/tmp/snaps".into()),
        ..Config::default()
    };
    tokio_test::block_on(save_config_to(&path, &config)).unwrap();

    let loaded = tokio_test::block_on(load_config_from(&path)).unwrap();
    assert_eq!(loaded.max_redirects, 4);
    assert_eq!(loaded.snapshot_dir.as_deref(), Some("/tmp/snaps"));
    assert!(loaded.cache_player_scripts);
}
