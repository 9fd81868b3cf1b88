//! Filesystem side of the photo store: the public `media` tree and the
//! flat `trash` directory.
//!
//! All methods are blocking; async callers run them on
//! `tokio::task::spawn_blocking`.

use anyhow::{anyhow, Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::utils::path::resolve_under;

#[derive(Clone, Debug)]
pub struct MediaStore {
    media: PathBuf,
    trash: PathBuf,
}

impl MediaStore {
    pub fn new(media: impl Into<PathBuf>, trash: impl Into<PathBuf>) -> Self {
        Self { media: media.into(), trash: trash.into() }
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.media).with_context(|| format!("creating {}", self.media.display()))?;
        fs::create_dir_all(&self.trash).with_context(|| format!("creating {}", self.trash.display()))?;
        Ok(())
    }

    pub fn media_dir(&self) -> &Path {
        &self.media
    }

    pub fn trash_dir(&self) -> &Path {
        &self.trash
    }

    pub fn resolve_media(&self, rel: &str) -> Option<PathBuf> {
        resolve_under(&self.media, rel)
    }

    pub fn resolve_trash(&self, name: &str) -> Option<PathBuf> {
        resolve_under(&self.trash, name)
    }

    /// Write a new file at `media/<rel>`. The bytes go to a temporary file
    /// that is fsynced and renamed into place, so a reader never sees a
    /// partial photo and a returned `Ok` means the data is on disk.
    /// Refuses to overwrite an existing file.
    pub fn write_new(&self, rel: &str, bytes: &[u8]) -> Result<PathBuf> {
        let dest = self.resolve_media(rel).ok_or_else(|| anyhow!("invalid media path {:?}", rel))?;
        if dest.exists() {
            return Err(anyhow!("media file already exists: {}", dest.display()));
        }
        let dir = dest.parent().ok_or_else(|| anyhow!("media path has no parent: {}", dest.display()))?;
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

        let file_name = dest.file_name().and_then(|n| n.to_str()).unwrap_or("upload");
        let tmp = dir.join(format!(".{}.part", file_name));
        let written = (|| -> io::Result<()> {
            let mut f = OpenOptions::new().write(true).create_new(true).open(&tmp)?;
            f.write_all(bytes)?;
            f.sync_all()?;
            fs::rename(&tmp, &dest)?;
            sync_dir(dir)
        })();
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(anyhow::Error::new(e).context(format!("writing {}", dest.display())));
        }
        debug!(path = %dest.display(), bytes = bytes.len(), "stored media file");
        Ok(dest)
    }

    /// Move `media/<rel>` into the trash directory and return its name there.
    /// The base name is kept; a numeric suffix is added if it is taken.
    pub fn move_to_trash(&self, rel: &str) -> Result<String> {
        let src = self.resolve_media(rel).ok_or_else(|| anyhow!("invalid media path {:?}", rel))?;
        let base = src
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("media path has no file name: {}", src.display()))?
            .to_string();
        let name = self.free_trash_name(&base);
        let dest = self.trash.join(&name);
        move_file(&src, &dest)?;
        if let Some(dir) = src.parent() {
            let _ = sync_dir(dir);
        }
        let _ = sync_dir(&self.trash);
        Ok(name)
    }

    /// Undo `move_to_trash`.
    pub fn restore_from_trash(&self, trash_name: &str, rel: &str) -> Result<()> {
        let src = self.resolve_trash(trash_name).ok_or_else(|| anyhow!("invalid trash name {:?}", trash_name))?;
        let dest = self.resolve_media(rel).ok_or_else(|| anyhow!("invalid media path {:?}", rel))?;
        if let Some(dir) = dest.parent() {
            fs::create_dir_all(dir)?;
        }
        move_file(&src, &dest)
    }

    /// Remove `media/<rel>`; a file that is already gone is not an error.
    pub fn remove(&self, rel: &str) -> Result<()> {
        let path = self.resolve_media(rel).ok_or_else(|| anyhow!("invalid media path {:?}", rel))?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(anyhow::Error::new(e).context(format!("removing {}", path.display()))),
        }
    }

    fn free_trash_name(&self, base: &str) -> String {
        if !self.trash.join(base).exists() {
            return base.to_string();
        }
        let (stem, ext) = match base.rsplit_once('.') {
            Some((s, e)) => (s, Some(e)),
            None => (base, None),
        };
        let mut n = 1u32;
        loop {
            let candidate = match ext {
                Some(e) => format!("{}-{}.{}", stem, n, e),
                None => format!("{}-{}", stem, n),
            };
            if !self.trash.join(&candidate).exists() {
                return candidate;
            }
            n += 1;
        }
    }
}

/// Rename, or copy and delete when the two paths live on different
/// filesystems (separate volume mounts for media and trash).
fn move_file(src: &Path, dest: &Path) -> Result<()> {
    match fs::rename(src, dest) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(anyhow::Error::new(e).context(format!("moving {}", src.display())))
        }
        Err(e) => {
            warn!(src = %src.display(), dest = %dest.display(), error = %e, "rename failed, falling back to copy");
            fs::copy(src, dest).with_context(|| format!("copying {} to {}", src.display(), dest.display()))?;
            File::open(dest).and_then(|f| f.sync_all())?;
            if let Err(e) = fs::remove_file(src) {
                let _ = fs::remove_file(dest);
                return Err(anyhow::Error::new(e).context(format!("removing {}", src.display())));
            }
            Ok(())
        }
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
