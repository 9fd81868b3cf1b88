use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Datelike, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Join a stored relative path onto a base directory.
///
/// Only plain path segments are accepted: absolute paths, `..`, drive
/// prefixes and empty input all yield `None`, so the result always stays
/// under `base`. Hidden segments (leading `.`) are rejected as well; the
/// store uses them for in-flight temp files.
pub fn resolve_under(base: &Path, relative: &str) -> Option<PathBuf> {
    let rel = Path::new(relative);
    let mut out = base.to_path_buf();
    let mut pushed = false;
    for component in rel.components() {
        match component {
            Component::Normal(part) => {
                if part.to_string_lossy().starts_with('.') {
                    return None;
                }
                out.push(part);
                pushed = true;
            }
            Component::CurDir => {}
            _ => return None,
        }
    }
    if pushed { Some(out) } else { None }
}

/// Relative media path for a new upload: `YYYY/MM/<hash>.<ext>`.
///
/// The file name is the first 32 hex chars of SHA-256 over the UUID bytes,
/// which keeps names unguessable from the public id alone while staying
/// stable for a given photo.
pub fn media_path_for(id: &Uuid, ext: &str, uploaded_at: DateTime<Utc>) -> String {
    let digest = Sha256::digest(id.as_bytes());
    let name = hex::encode(&digest[..16]);
    format!("{:04}/{:02}/{}.{}", uploaded_at.year(), uploaded_at.month(), name, ext)
}

/// Lower-cased extension of an uploaded filename, if it has one.
pub fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| e.to_ascii_lowercase())
}

/// Human readable byte count with SI prefixes, one decimal (`1.5 MB`).
pub fn human_size(bytes: i64) -> String {
    const UNITS: [&str; 5] = ["B", "kB", "MB", "GB", "TB"];
    if bytes < 1000 {
        return format!("{} B", bytes.max(0));
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}
