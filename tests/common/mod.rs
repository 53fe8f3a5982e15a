//! Shared helpers for integration tests

#![allow(dead_code)]

use axum::Router;
use tokio::net::TcpListener;

/// Serve `app` on an ephemeral local port and return its base URL
pub async fn spawn_server(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

pub const PLAYER_PATH: &str = "/s/player/abc12345/player_ias.vflset/en_US/base.js";

/// A watch page carrying a ytcfg blob the way the real site does
pub fn watch_page(player_path: &str) -> String {
    format!(
        r#"<!DOCTYPE html><html><head>
<script nonce="x">(function() {{window.ytplayer={{}};
ytcfg.set({{"INNERTUBE_API_KEY":"AIzaTestKey","INNERTUBE_CLIENT_VERSION":"2.20240101.00.00","VISITOR_DATA":"CgtWaXNpdG9y","PLAYER_JS_URL":"{}"}}); window.ytcfg.obfuscatedData_ = [];}})();</script>
<script>ytcfg.set({{'HL': 'en', GL: 'US',}});</script>
</head><body></body></html>"#,
        player_path.replace('/', "\\/")
    )
}

pub const PLAYER_JS: &str = "var _yt_player={};(function(g){var c={signatureTimestamp:20123,x:1};})(_yt_player);";
