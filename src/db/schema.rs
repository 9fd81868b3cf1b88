use anyhow::Result;
use rusqlite::Connection;

pub fn apply_pragmas(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    apply_connection_pragmas(conn)?;
    Ok(())
}

/// Settings that do not persist in the database file and must be set on
/// every connection. `synchronous = FULL` makes a committed write durable
/// before the caller is told it succeeded.
pub fn apply_connection_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "synchronous", "FULL")?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    Ok(())
}

pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS photos (
  seq INTEGER PRIMARY KEY,
  id TEXT NOT NULL UNIQUE,
  filename TEXT NOT NULL,
  path TEXT NOT NULL UNIQUE,
  trash_path TEXT,
  status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'deleted')),
  mime TEXT NOT NULL,
  size_bytes INTEGER NOT NULL,
  width INTEGER,
  height INTEGER,
  caption TEXT,
  location TEXT,
  latitude REAL,
  longitude REAL,
  taken_at TEXT,
  device TEXT,
  settings TEXT,
  uploaded_at INTEGER NOT NULL,
  updated_at INTEGER NOT NULL,
  deleted_at INTEGER
);

CREATE INDEX IF NOT EXISTS idx_photos_status_uploaded ON photos(status, uploaded_at);
    "#,
    )?;
    Ok(())
}
