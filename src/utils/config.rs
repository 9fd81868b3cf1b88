use std::env;
use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct Config {
    pub token: Option<String>,
    pub bind: IpAddr,
    pub port: u16,
    pub media: PathBuf,
    pub trash: PathBuf,
    pub data: PathBuf,
    pub static_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Self {
        // An empty token counts as unset so a blank variable never authorizes anything.
        let token = env::var("PICTURE_TOKEN").ok().filter(|t| !t.is_empty());
        let bind = env::var("PICTURE_BIND").ok().and_then(|v| v.parse().ok()).unwrap_or(IpAddr::from([0, 0, 0, 0]));
        let port = env::var("PICTURE_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(8080);
        let root = PathBuf::from(env::var("PICTURE_ROOT").unwrap_or_else(|_| "/srv/picture".to_string()));
        let media = env::var("PICTURE_MEDIA").map(PathBuf::from).unwrap_or_else(|_| root.join("media"));
        let trash = env::var("PICTURE_TRASH").map(PathBuf::from).unwrap_or_else(|_| root.join("trash"));
        let data = env::var("PICTURE_DATA").map(PathBuf::from).unwrap_or_else(|_| root.join("data"));
        let static_dir = env::var("PICTURE_STATIC").unwrap_or_else(|_| "static".to_string());
        let max_upload_mb: usize = env::var("PICTURE_MAX_UPLOAD_MB").ok().and_then(|v| v.parse().ok()).unwrap_or(64);
        Self {
            token,
            bind,
            port,
            media,
            trash,
            data,
            static_dir: PathBuf::from(static_dir),
            max_upload_bytes: max_upload_mb * 1024 * 1024,
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.data.join("picture.db")
    }
}
