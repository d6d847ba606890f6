#![allow(dead_code)]

use std::net::TcpListener;
use std::path::Path;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use belet_api::{ApiConfig, BeletClient, ClientConfig, FfmpegConfig, FfmpegDownloader, Session};
use belet_api::credentials::Token;
use httpmock::MockServer;
use serde_json::json;

pub fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

/// A three-part token whose payload carries `exp`.
pub fn jwt(exp: i64, tag: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(json!({ "exp": exp, "sub": tag }).to_string());
    format!("{header}.{payload}.sig-{tag}")
}

pub fn config(server: &MockServer, data_file: &Path) -> ClientConfig {
    ClientConfig {
        data_file: data_file.to_path_buf(),
        api: ApiConfig::single_host(server.base_url()),
        request_timeout_secs: 10,
        ..ClientConfig::default()
    }
}

pub fn session_with_token(config: &ClientConfig, token: Option<&str>) -> Arc<Session> {
    let session = Session::new(config).unwrap();
    session.set_token(token.map(|t| Token::new(t).unwrap()));
    Arc::new(session)
}

pub fn client(session: Arc<Session>, ffmpeg: FfmpegConfig) -> BeletClient {
    let downloader = Box::new(FfmpegDownloader::new(Arc::clone(&session), ffmpeg));
    BeletClient::with_downloader(session, downloader)
}

pub fn film(id: u64, seasons: serde_json::Value) -> serde_json::Value {
    json!({
        "status": "ok",
        "film": {
            "id": id,
            "name": format!("Film {id}"),
            "year": 2020,
            "category_id": 1,
            "seasons": seasons,
        }
    })
}
