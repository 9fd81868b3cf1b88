#![allow(dead_code)]

pub mod fixtures;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use picture_backend::api::routes;
use picture_backend::utils::config::Config;
use picture_backend::{init_state, AppState};
use rusqlite::Connection;
use tempfile::TempDir;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, Duration};

pub const TOKEN: &str = "test-token";

/// Config rooted in a fresh temp directory.
pub fn test_config(token: Option<&str>) -> (TempDir, Config) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    let static_dir = root.join("static");
    std::fs::create_dir_all(&static_dir).unwrap();
    std::fs::write(static_dir.join("index.html"), "<html><body>gallery</body></html>").unwrap();
    std::fs::write(static_dir.join("photo.html"), "<html><body>photo</body></html>").unwrap();
    std::fs::write(static_dir.join("app.js"), "console.log('ok');").unwrap();
    let cfg = Config {
        token: token.map(str::to_string),
        bind: "127.0.0.1".parse().unwrap(),
        port: 0,
        media: root.join("media"),
        trash: root.join("trash"),
        data: root.join("data"),
        static_dir,
        max_upload_bytes: 4 * 1024 * 1024,
    };
    (tmp, cfg)
}

/// Create a temporary SQLite database with the schema applied.
pub fn setup_test_db() -> (TempDir, PathBuf, Connection) {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("picture.db");
    let conn = picture_backend::db::open_or_create(&db_path).unwrap();
    (tmp, db_path, conn)
}

async fn wait_for_port(port: u16) {
    for _ in 0..30 {
        if TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
            return;
        }
        sleep(Duration::from_millis(50)).await;
    }
    panic!("Server never started");
}

/// A running server on an ephemeral port, plus the temp dir it lives in.
pub struct TestServer {
    pub tmp: TempDir,
    pub cfg: Config,
    pub state: Arc<AppState>,
    pub client: TestClient,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with_token(Some(TOKEN)).await
    }

    pub async fn start_with_token(token: Option<&str>) -> Self {
        let (tmp, cfg) = test_config(token);
        let state = init_state(&cfg).unwrap();
        let app = routes::router(state.clone());
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        wait_for_port(port).await;
        Self { tmp, cfg, state, client: TestClient::new(port) }
    }

    /// Files currently under `dir`, relative to it.
    pub fn files_in(&self, dir: &std::path::Path) -> Vec<PathBuf> {
        let mut out = Vec::new();
        let mut stack = vec![dir.to_path_buf()];
        while let Some(d) = stack.pop() {
            let Ok(entries) = std::fs::read_dir(&d) else { continue };
            for entry in entries.flatten() {
                let p = entry.path();
                if p.is_dir() {
                    stack.push(p);
                } else {
                    out.push(p.strip_prefix(dir).unwrap().to_path_buf());
                }
            }
        }
        out.sort();
        out
    }

    pub fn media_files(&self) -> Vec<PathBuf> {
        self.files_in(&self.cfg.media)
    }

    pub fn trash_files(&self) -> Vec<PathBuf> {
        self.files_in(&self.cfg.trash)
    }
}

/// Helper to make HTTP requests to the test server
pub struct TestClient {
    pub base_url: String,
    pub client: reqwest::Client,
}

impl TestClient {
    pub fn new(port: u16) -> Self {
        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client.get(self.url(path)).send().await.unwrap()
    }

    pub async fn get_json(&self, path: &str) -> serde_json::Value {
        let resp = self.get(path).await;
        assert_eq!(resp.status(), 200, "GET {}", path);
        resp.json().await.unwrap()
    }

    pub async fn get_authed(&self, path: &str, token: &str) -> reqwest::Response {
        self.client.get(self.url(path)).bearer_auth(token).send().await.unwrap()
    }

    pub async fn upload(&self, token: Option<&str>, form: reqwest::multipart::Form) -> reqwest::Response {
        let mut req = self.client.post(self.url("/api/photos")).multipart(form);
        if let Some(t) = token {
            req = req.bearer_auth(t);
        }
        req.send().await.unwrap()
    }

    pub async fn patch(&self, token: Option<&str>, id: &str, json: &serde_json::Value) -> reqwest::Response {
        let mut req = self.client.patch(self.url(&format!("/api/photos/{}", id))).json(json);
        if let Some(t) = token {
            req = req.bearer_auth(t);
        }
        req.send().await.unwrap()
    }

    pub async fn delete(&self, token: Option<&str>, id: &str) -> reqwest::Response {
        let mut req = self.client.delete(self.url(&format!("/api/photos/{}", id)));
        if let Some(t) = token {
            req = req.bearer_auth(t);
        }
        req.send().await.unwrap()
    }

    /// Upload `bytes` as `filename` with extra text fields and return the
    /// created detail.
    pub async fn upload_ok(&self, filename: &str, bytes: Vec<u8>, fields: &[(&str, &str)]) -> serde_json::Value {
        let resp = self.upload(Some(TOKEN), fixtures::form(filename, bytes, fields)).await;
        let status = resp.status();
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(status, 201, "upload failed: {}", body);
        body
    }
}
