use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params, Row, OptionalExtension};
use crate::models::photo::{ArchiveBucket, Photo, PhotoMetadata, PhotoStatus};
use crate::utils::path::human_size;

/// Optional upload-month filter for the gallery list.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListFilter {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

pub(crate) fn millis_to_utc(ms: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(ms).ok_or(rusqlite::Error::IntegralValueOutOfRange(0, ms))
}

fn row_to_photo(row: &Row<'_>) -> rusqlite::Result<Photo> {
    let status: String = row.get("status")?;
    let status = PhotoStatus::parse(&status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, format!("unknown status {:?}", status).into())
    })?;
    let deleted_at: Option<i64> = row.get("deleted_at")?;
    Ok(Photo {
        id: row.get("id")?,
        filename: row.get("filename")?,
        path: row.get("path")?,
        trash_path: row.get("trash_path")?,
        status,
        mime: row.get("mime")?,
        size_bytes: row.get("size_bytes")?,
        width: row.get("width")?,
        height: row.get("height")?,
        metadata: PhotoMetadata {
            caption: row.get("caption")?,
            location: row.get("location")?,
            latitude: row.get("latitude")?,
            longitude: row.get("longitude")?,
            taken_at: row.get("taken_at")?,
            device: row.get("device")?,
            settings: row.get("settings")?,
        },
        uploaded_at: millis_to_utc(row.get("uploaded_at")?)?,
        updated_at: millis_to_utc(row.get("updated_at")?)?,
        deleted_at: deleted_at.map(millis_to_utc).transpose()?,
    })
}

/// Get a single photo by identifier, whatever its status.
pub fn get_photo(conn: &Connection, id: &str) -> Result<Option<Photo>> {
    let photo = conn
        .query_row("SELECT * FROM photos WHERE id = ?1", params![id], row_to_photo)
        .optional()?;
    Ok(photo)
}

pub fn count_active(conn: &Connection) -> Result<i64> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM photos WHERE status = 'active'", [], |r| r.get(0))?;
    Ok(n)
}

/// Active photos, newest upload first. `month` only applies together with `year`.
pub fn list_active(conn: &Connection, filter: ListFilter) -> Result<Vec<Photo>> {
    const BASE: &str = "SELECT * FROM photos WHERE status = 'active'";
    const BY_YEAR: &str = " AND CAST(strftime('%Y', uploaded_at / 1000, 'unixepoch') AS INTEGER) = ?1";
    const BY_MONTH: &str = " AND CAST(strftime('%m', uploaded_at / 1000, 'unixepoch') AS INTEGER) = ?2";
    const ORDER: &str = " ORDER BY uploaded_at DESC, seq DESC";
    let items = match (filter.year, filter.month) {
        (Some(y), Some(m)) => {
            let mut stmt = conn.prepare(&format!("{}{}{}{}", BASE, BY_YEAR, BY_MONTH, ORDER))?;
            let rows = stmt.query_map(params![y, m], row_to_photo)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        }
        (Some(y), None) => {
            let mut stmt = conn.prepare(&format!("{}{}{}", BASE, BY_YEAR, ORDER))?;
            let rows = stmt.query_map(params![y], row_to_photo)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        }
        (None, _) => {
            let mut stmt = conn.prepare(&format!("{}{}", BASE, ORDER))?;
            let rows = stmt.query_map([], row_to_photo)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        }
    };
    Ok(items)
}

/// Deleted photos, most recently deleted first.
pub fn list_deleted(conn: &Connection) -> Result<Vec<Photo>> {
    let mut stmt = conn.prepare("SELECT * FROM photos WHERE status = 'deleted' ORDER BY deleted_at DESC, seq DESC")?;
    let items = stmt.query_map([], row_to_photo)?.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(items)
}

fn buckets(conn: &Connection, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<ArchiveBucket>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| {
        let size_bytes: i64 = row.get(2)?;
        Ok(ArchiveBucket {
            period: row.get(0)?,
            count: row.get(1)?,
            size_bytes,
            size_human: human_size(size_bytes),
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Active photo count and size per upload year, ascending.
pub fn archive_years(conn: &Connection) -> Result<Vec<ArchiveBucket>> {
    buckets(
        conn,
        "SELECT CAST(strftime('%Y', uploaded_at / 1000, 'unixepoch') AS INTEGER) AS y, COUNT(*), COALESCE(SUM(size_bytes), 0)
         FROM photos WHERE status = 'active' GROUP BY y ORDER BY y",
        &[],
    )
}

/// Active photo count and size per upload month of `year`, ascending.
pub fn archive_months(conn: &Connection, year: i32) -> Result<Vec<ArchiveBucket>> {
    buckets(
        conn,
        "SELECT CAST(strftime('%m', uploaded_at / 1000, 'unixepoch') AS INTEGER) AS m, COUNT(*), COALESCE(SUM(size_bytes), 0)
         FROM photos WHERE status = 'active' AND CAST(strftime('%Y', uploaded_at / 1000, 'unixepoch') AS INTEGER) = ?1
         GROUP BY m ORDER BY m",
        &[&year],
    )
}
