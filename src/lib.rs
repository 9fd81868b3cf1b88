pub mod utils;
pub mod models;
pub mod db;
pub mod storage;
pub mod pipeline;
pub mod api;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::db::DbPool;
use crate::storage::MediaStore;
use crate::utils::config::Config;

#[derive(Clone, Debug)]
pub struct AppPaths {
    pub media: PathBuf,
    pub trash: PathBuf,
    pub data: PathBuf,
    pub db_path: PathBuf,
    pub static_dir: PathBuf,
}

#[derive(Clone)]
pub struct AppState {
    pub started_at: std::time::Instant,
    pub paths: AppPaths,
    pub pool: DbPool,
    pub store: MediaStore,
    pub token: Option<Arc<str>>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(cfg: &Config, pool: DbPool) -> Self {
        Self {
            started_at: std::time::Instant::now(),
            paths: AppPaths {
                media: cfg.media.clone(),
                trash: cfg.trash.clone(),
                data: cfg.data.clone(),
                db_path: cfg.db_path(),
                static_dir: cfg.static_dir.clone(),
            },
            pool,
            store: MediaStore::new(cfg.media.clone(), cfg.trash.clone()),
            token: cfg.token.as_deref().map(Arc::from),
            max_upload_bytes: cfg.max_upload_bytes,
        }
    }
}

/// Create the directories and database named by `cfg` and build the shared
/// state the router runs on.
pub fn init_state(cfg: &Config) -> Result<Arc<AppState>> {
    std::fs::create_dir_all(&cfg.data).with_context(|| format!("creating {}", cfg.data.display()))?;
    let store = MediaStore::new(cfg.media.clone(), cfg.trash.clone());
    store.ensure_dirs()?;

    let db_path = cfg.db_path();
    let conn = db::open_or_create(&db_path)?;
    let active = db::query::count_active(&conn)?;
    drop(conn);
    let pool = db::create_pool(&db_path, 8)?;

    if cfg.token.is_none() {
        warn!("PICTURE_TOKEN is not set; uploads, edits and deletes will be refused");
    }
    info!(db = %db_path.display(), media = %cfg.media.display(), trash = %cfg.trash.display(), active, "store ready");
    Ok(Arc::new(AppState::new(cfg, pool)))
}
