use std::path::Path as StdPath;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use chrono::{DateTime, SubsecRound, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::auth::Authorized;
use crate::api::error::ApiError;
use crate::db::query::{self, ListFilter};
use crate::db::writer;
use crate::models::photo::{
    normalize_text, parse_taken_at, ArchiveBucket, Photo, PhotoDetail, PhotoMetadata, PhotoPatch, PhotoStatus,
    PhotoSummary, MAX_FIELD_CHARS,
};
use crate::pipeline::{self, ingest::IngestError};
use crate::storage::MediaStore;
use crate::utils::path::media_path_for;
use crate::AppState;

type ApiResult<T> = Result<T, ApiError>;

/// Run pool-backed work off the async runtime.
async fn blocking<T, F>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

/// Current time at the millisecond precision the store keeps, so a
/// response never differs from what a later read returns.
fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

async fn serve_page(state: &AppState, name: &str) -> Response {
    let path = state.paths.static_dir.join(name);
    match tokio::fs::read_to_string(&path).await {
        Ok(body) => Html(body).into_response(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "static page missing");
            (StatusCode::NOT_FOUND, "Not Found").into_response()
        }
    }
}

pub async fn serve_index(State(state): State<Arc<AppState>>) -> Response {
    serve_page(&state, "index.html").await
}

pub async fn serve_photo_page(State(state): State<Arc<AppState>>, Path(_id): Path<String>) -> Response {
    serve_page(&state, "photo.html").await
}

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "uploads_enabled": state.token.is_some(),
    });
    (StatusCode::OK, Json(body))
}

/// 204 when the bearer token is accepted.
pub async fn auth_check(_auth: Authorized) -> StatusCode {
    StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

impl ListQuery {
    fn into_filter(self) -> ApiResult<ListFilter> {
        if let Some(y) = self.year {
            check_year(y)?;
        }
        match (self.year, self.month) {
            (None, Some(_)) => Err(ApiError::InvalidInput("month requires year".to_string())),
            (_, Some(m)) if !(1..=12).contains(&m) => Err(ApiError::InvalidInput(format!("invalid month {}", m))),
            (year, month) => Ok(ListFilter { year, month }),
        }
    }
}

fn check_year(y: i32) -> ApiResult<()> {
    if (1970..=9999).contains(&y) {
        Ok(())
    } else {
        Err(ApiError::InvalidInput(format!("invalid year {}", y)))
    }
}

pub async fn list_photos(State(state): State<Arc<AppState>>, Query(q): Query<ListQuery>) -> ApiResult<Json<Vec<PhotoSummary>>> {
    let filter = q.into_filter()?;
    let pool = state.pool.clone();
    let photos = blocking(move || {
        let conn = pool.get()?;
        Ok(query::list_active(&conn, filter)?)
    })
    .await?;
    Ok(Json(photos.iter().map(PhotoSummary::from).collect()))
}

fn load_active(conn: &rusqlite::Connection, id: &str) -> ApiResult<Photo> {
    match query::get_photo(conn, id)? {
        Some(photo) if photo.is_active() => Ok(photo),
        _ => Err(ApiError::NotFound(format!("photo {}", id))),
    }
}

pub async fn get_photo(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<Json<PhotoDetail>> {
    let pool = state.pool.clone();
    let photo = blocking(move || {
        let conn = pool.get()?;
        load_active(&conn, &id)
    })
    .await?;
    Ok(Json(PhotoDetail::from(photo)))
}

/// The file part and text fields of an upload form.
#[derive(Debug, Default)]
struct UploadForm {
    filename: Option<String>,
    bytes: Option<Bytes>,
    metadata: PhotoMetadata,
}

async fn read_upload_form(mut multipart: Multipart) -> ApiResult<UploadForm> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" | "file" => {
                let filename = field.file_name().map(client_filename).unwrap_or_default();
                form.filename = Some(filename);
                form.bytes = Some(field.bytes().await?);
            }
            "caption" | "location" | "device" | "settings" | "taken_at" | "latitude" | "longitude" => {
                let value = normalize_text(Some(field.text().await?));
                set_form_field(&mut form.metadata, &name, value)?;
            }
            other => debug!(field = other, "ignoring unknown upload field"),
        }
    }
    Ok(form)
}

fn set_form_field(m: &mut PhotoMetadata, name: &str, value: Option<String>) -> ApiResult<()> {
    let parse_coord = |v: Option<String>| -> ApiResult<Option<f64>> {
        match v {
            Some(s) => s
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Some)
                .ok_or_else(|| ApiError::InvalidInput(format!("{} must be a number", name))),
            None => Ok(None),
        }
    };
    match name {
        "caption" => m.caption = value,
        "location" => m.location = value,
        "device" => m.device = value,
        "settings" => m.settings = value,
        "taken_at" => {
            m.taken_at = match value {
                Some(s) => Some(parse_taken_at(&s).map_err(ApiError::InvalidInput)?),
                None => None,
            }
        }
        "latitude" => m.latitude = parse_coord(value)?,
        "longitude" => m.longitude = parse_coord(value)?,
        _ => {}
    }
    Ok(())
}

/// Last path component of a client-supplied filename, capped in length.
fn client_filename(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw).trim();
    base.chars().take(MAX_FIELD_CHARS).collect()
}

pub async fn upload_photo(
    State(state): State<Arc<AppState>>,
    _auth: Authorized,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<PhotoDetail>)> {
    let form = read_upload_form(multipart).await?;
    let bytes = form.bytes.ok_or(IngestError::MissingFile)?;
    let filename = form.filename.unwrap_or_default();
    let supplied = form.metadata;

    let pool = state.pool.clone();
    let store = state.store.clone();
    let photo = blocking(move || {
        let prepared = pipeline::prepare_upload(&filename, &bytes, supplied)?;
        let id = Uuid::new_v4();
        let now = now_millis();
        let rel = media_path_for(&id, &prepared.image.ext, now);
        let photo = Photo {
            id: id.to_string(),
            filename,
            path: rel.clone(),
            trash_path: None,
            status: PhotoStatus::Active,
            mime: prepared.image.mime,
            size_bytes: bytes.len() as i64,
            width: Some(prepared.image.width as i64),
            height: Some(prepared.image.height as i64),
            metadata: prepared.metadata,
            uploaded_at: now,
            updated_at: now,
            deleted_at: None,
        };

        store.write_new(&rel, &bytes)?;
        let inserted = pool
            .get()
            .map_err(ApiError::from)
            .and_then(|conn| writer::insert_photo(&conn, &photo).map_err(ApiError::from));
        if let Err(e) = inserted {
            if let Err(cleanup) = store.remove(&rel) {
                warn!(path = %rel, error = %cleanup, "could not remove file after failed insert");
            }
            return Err(e);
        }
        Ok(photo)
    })
    .await?;

    info!(id = %photo.id, filename = %photo.filename, path = %photo.path, bytes = photo.size_bytes, "photo uploaded");
    Ok((StatusCode::CREATED, Json(PhotoDetail::from(photo))))
}

pub async fn update_photo(
    State(state): State<Arc<AppState>>,
    _auth: Authorized,
    Path(id): Path<String>,
    patch: Result<Json<PhotoPatch>, JsonRejection>,
) -> ApiResult<Json<PhotoDetail>> {
    let Json(patch) = patch.map_err(|e| ApiError::InvalidInput(e.body_text()))?;
    let pool = state.pool.clone();
    let photo = blocking(move || {
        let conn = pool.get()?;
        let current = load_active(&conn, &id)?;
        if patch.is_empty() {
            return Ok(current);
        }
        let next = patch.apply(&current.metadata).map_err(ApiError::InvalidInput)?;
        if !writer::update_metadata(&conn, &id, &next, now_millis())? {
            return Err(ApiError::NotFound(format!("photo {}", id)));
        }
        load_active(&conn, &id)
    })
    .await?;
    info!(id = %photo.id, "photo metadata updated");
    Ok(Json(PhotoDetail::from(photo)))
}

pub async fn delete_photo(
    State(state): State<Arc<AppState>>,
    _auth: Authorized,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let pool = state.pool.clone();
    let store = state.store.clone();
    let (id, trash_path) = blocking(move || {
        let conn = pool.get()?;
        let trash_name = trash_photo(&conn, &store, &id)?;
        Ok((id, trash_name))
    })
    .await?;
    info!(id = %id, trash = ?trash_path, "photo moved to trash");
    Ok(Json(serde_json::json!({"success": true, "id": id, "trash_path": trash_path})))
}

/// Move an active photo's file to the trash and flip its record. Returns
/// the trash name, or `None` when the media file was already gone.
fn trash_photo(conn: &rusqlite::Connection, store: &MediaStore, id: &str) -> ApiResult<Option<String>> {
    let photo = load_active(conn, id)?;
    let trash_name = match store.resolve_media(&photo.path) {
        Some(ref p) if p.exists() => Some(store.move_to_trash(&photo.path)?),
        _ => {
            warn!(id = %id, path = %photo.path, "media file already missing, marking deleted without moving");
            None
        }
    };
    match writer::mark_deleted(conn, id, trash_name.as_deref(), now_millis()) {
        Ok(true) => Ok(trash_name),
        other => {
            if let Some(ref name) = trash_name {
                undo_trash_move(conn, store, &photo, name);
            }
            match other {
                Ok(_) => Err(ApiError::NotFound(format!("photo {}", id))),
                Err(e) => Err(e.into()),
            }
        }
    }
}

/// Settle a file moved to the trash whose status update did not land.
/// While the record is still active the file goes back to `media`; if
/// another request deleted it in the meantime the file stays in the trash
/// and the record points at it.
fn undo_trash_move(conn: &rusqlite::Connection, store: &MediaStore, photo: &Photo, trash_name: &str) {
    let current = match query::get_photo(conn, &photo.id) {
        Ok(current) => current,
        Err(e) => {
            warn!(id = %photo.id, error = %e, "could not re-read photo after failed delete");
            Some(photo.clone())
        }
    };
    match current {
        Some(p) if p.is_active() => {
            if let Err(e) = store.restore_from_trash(trash_name, &photo.path) {
                warn!(id = %photo.id, error = %e, "could not restore file after failed delete");
            }
        }
        Some(_) => {
            if let Err(e) = writer::attach_trash_path(conn, &photo.id, trash_name) {
                warn!(id = %photo.id, error = %e, "could not record trash location");
            }
        }
        None => warn!(id = %photo.id, trash = %trash_name, "photo record vanished, file left in trash"),
    }
}

pub async fn list_trash(State(state): State<Arc<AppState>>, _auth: Authorized) -> ApiResult<Json<Vec<PhotoSummary>>> {
    let pool = state.pool.clone();
    let photos = blocking(move || {
        let conn = pool.get()?;
        Ok(query::list_deleted(&conn)?)
    })
    .await?;
    Ok(Json(photos.iter().map(PhotoSummary::from).collect()))
}

pub async fn archive(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<ArchiveBucket>>> {
    let pool = state.pool.clone();
    let years = blocking(move || {
        let conn = pool.get()?;
        Ok(query::archive_years(&conn)?)
    })
    .await?;
    Ok(Json(years))
}

pub async fn archive_year(State(state): State<Arc<AppState>>, Path(year): Path<i32>) -> ApiResult<Json<Vec<ArchiveBucket>>> {
    check_year(year)?;
    let pool = state.pool.clone();
    let months = blocking(move || {
        let conn = pool.get()?;
        Ok(query::archive_months(&conn, year)?)
    })
    .await?;
    Ok(Json(months))
}

pub async fn serve_media(State(state): State<Arc<AppState>>, Path(rel): Path<String>) -> ApiResult<Response> {
    let not_found = || ApiError::NotFound(format!("media {}", rel));
    let file_path = state.store.resolve_media(&rel).ok_or_else(not_found)?;
    let bytes = match tokio::fs::read(&file_path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
        Err(e) if file_path.is_dir() => {
            debug!(path = %file_path.display(), error = %e, "media path is a directory");
            return Err(not_found());
        }
        Err(e) => return Err(ApiError::Storage(anyhow::Error::new(e).context(format!("reading {}", file_path.display())))),
    };
    let mime = mime_guess::from_path(StdPath::new(&rel)).first_or_octet_stream();
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime.as_ref().to_string()),
            (header::CACHE_CONTROL, "public, max-age=86400".to_string()),
        ],
        bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use tempfile::TempDir;

    fn store_and_db() -> (TempDir, MediaStore, rusqlite::Connection) {
        let tmp = TempDir::new().unwrap();
        let store = MediaStore::new(tmp.path().join("media"), tmp.path().join("trash"));
        store.ensure_dirs().unwrap();
        let conn = crate::db::open_or_create(tmp.path().join("picture.db")).unwrap();
        (tmp, store, conn)
    }

    fn stored_photo(conn: &rusqlite::Connection, store: &MediaStore, id: &str) -> Photo {
        let now = now_millis();
        let photo = Photo {
            id: id.to_string(),
            filename: "a.png".to_string(),
            path: format!("2024/01/{}.png", id),
            trash_path: None,
            status: PhotoStatus::Active,
            mime: "image/png".to_string(),
            size_bytes: 3,
            width: Some(1),
            height: Some(1),
            metadata: PhotoMetadata::default(),
            uploaded_at: now,
            updated_at: now,
            deleted_at: None,
        };
        store.write_new(&photo.path, b"png").unwrap();
        writer::insert_photo(conn, &photo).unwrap();
        photo
    }

    #[test]
    fn test_now_millis_matches_stored_precision() {
        let now = now_millis();
        assert_eq!(now.nanosecond() % 1_000_000, 0);
        assert_eq!(crate::db::query::millis_to_utc(now.timestamp_millis()).unwrap(), now);
    }

    #[test]
    fn test_trash_photo_moves_file_and_flips_record() {
        let (_tmp, store, conn) = store_and_db();
        let photo = stored_photo(&conn, &store, "p1");
        let name = trash_photo(&conn, &store, "p1").unwrap().unwrap();
        assert!(store.resolve_trash(&name).unwrap().is_file());
        assert!(!store.resolve_media(&photo.path).unwrap().exists());
        assert!(matches!(trash_photo(&conn, &store, "p1"), Err(ApiError::NotFound(_))));
    }

    #[test]
    fn test_undo_restores_while_record_is_active() {
        let (_tmp, store, conn) = store_and_db();
        let photo = stored_photo(&conn, &store, "p2");
        let name = store.move_to_trash(&photo.path).unwrap();
        undo_trash_move(&conn, &store, &photo, &name);
        assert!(store.resolve_media(&photo.path).unwrap().is_file());
        assert!(!store.resolve_trash(&name).unwrap().exists());
    }

    #[test]
    fn test_undo_keeps_file_in_trash_after_concurrent_delete() {
        let (_tmp, store, conn) = store_and_db();
        let photo = stored_photo(&conn, &store, "p3");
        let name = store.move_to_trash(&photo.path).unwrap();
        // A second delete saw the file missing and won the status update.
        assert!(writer::mark_deleted(&conn, "p3", None, now_millis()).unwrap());

        undo_trash_move(&conn, &store, &photo, &name);
        assert!(!store.resolve_media(&photo.path).unwrap().exists());
        assert!(store.resolve_trash(&name).unwrap().is_file());
        let record = query::get_photo(&conn, "p3").unwrap().unwrap();
        assert_eq!(record.status, PhotoStatus::Deleted);
        assert_eq!(record.trash_path.as_deref(), Some(name.as_str()));
    }

    #[test]
    fn test_client_filename_strips_directories() {
        assert_eq!(client_filename("C:\\Users\\me\\IMG_1.JPG"), "IMG_1.JPG");
        assert_eq!(client_filename("../../etc/passwd.png"), "passwd.png");
        assert_eq!(client_filename(" plain.gif "), "plain.gif");
    }

    #[test]
    fn test_list_query_validation() {
        let q = |year, month| ListQuery { year, month }.into_filter();
        assert!(q(None, None).is_ok());
        assert!(q(Some(2024), Some(5)).is_ok());
        assert!(matches!(q(None, Some(5)), Err(ApiError::InvalidInput(_))));
        assert!(matches!(q(Some(2024), Some(13)), Err(ApiError::InvalidInput(_))));
        assert!(matches!(q(Some(1800), None), Err(ApiError::InvalidInput(_))));
    }

    #[test]
    fn test_set_form_field_parses_numbers_and_dates() {
        let mut m = PhotoMetadata::default();
        set_form_field(&mut m, "latitude", Some("48.8584".into())).unwrap();
        set_form_field(&mut m, "taken_at", Some("2020-02-02T10:00".into())).unwrap();
        assert_eq!(m.latitude, Some(48.8584));
        assert!(m.taken_at.is_some());
        assert!(set_form_field(&mut m, "longitude", Some("east".into())).is_err());
        assert!(set_form_field(&mut m, "longitude", Some("NaN".into())).is_err());
        assert!(set_form_field(&mut m, "taken_at", Some("soon".into())).is_err());
    }
}
