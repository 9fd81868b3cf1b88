use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use crate::models::photo::{Photo, PhotoMetadata, PhotoStatus};

/// Insert a freshly uploaded photo.
pub fn insert_photo(conn: &Connection, photo: &Photo) -> Result<()> {
    let m = &photo.metadata;
    conn.execute(
        "INSERT INTO photos (id, filename, path, trash_path, status, mime, size_bytes, width, height,
                             caption, location, latitude, longitude, taken_at, device, settings,
                             uploaded_at, updated_at, deleted_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
        params![
            photo.id,
            photo.filename,
            photo.path,
            photo.trash_path,
            photo.status.as_str(),
            photo.mime,
            photo.size_bytes,
            photo.width,
            photo.height,
            m.caption,
            m.location,
            m.latitude,
            m.longitude,
            m.taken_at,
            m.device,
            m.settings,
            photo.uploaded_at.timestamp_millis(),
            photo.updated_at.timestamp_millis(),
            photo.deleted_at.map(|d| d.timestamp_millis()),
        ],
    )?;
    Ok(())
}

/// Replace the descriptive fields of an active photo. Returns false when no
/// active photo has that id.
pub fn update_metadata(conn: &Connection, id: &str, m: &PhotoMetadata, now: DateTime<Utc>) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE photos SET caption = ?1, location = ?2, latitude = ?3, longitude = ?4, taken_at = ?5,
                           device = ?6, settings = ?7, updated_at = ?8
         WHERE id = ?9 AND status = ?10",
        params![
            m.caption,
            m.location,
            m.latitude,
            m.longitude,
            m.taken_at,
            m.device,
            m.settings,
            now.timestamp_millis(),
            id,
            PhotoStatus::Active.as_str(),
        ],
    )?;
    Ok(updated > 0)
}

/// Flip an active photo to deleted and record where its file went, if it
/// still had one.
pub fn mark_deleted(conn: &Connection, id: &str, trash_path: Option<&str>, now: DateTime<Utc>) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE photos SET status = ?1, trash_path = ?2, deleted_at = ?3, updated_at = ?3
         WHERE id = ?4 AND status = ?5",
        params![
            PhotoStatus::Deleted.as_str(),
            trash_path,
            now.timestamp_millis(),
            id,
            PhotoStatus::Active.as_str(),
        ],
    )?;
    Ok(updated > 0)
}

/// Record the trash location of an already deleted photo that has none.
pub fn attach_trash_path(conn: &Connection, id: &str, trash_path: &str) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE photos SET trash_path = ?1 WHERE id = ?2 AND status = ?3 AND trash_path IS NULL",
        params![trash_path, id, PhotoStatus::Deleted.as_str()],
    )?;
    Ok(updated > 0)
}
