use crate::error::PublishError;
use chrono::{DateTime, FixedOffset};
use log::info;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Remembers whether the FINAL announcement has gone out.
/// Presence of the marker means done; nothing ever clears it automatically.
pub trait PublishGuard: Send + Sync {
    fn already_finalized(&self) -> Result<bool, PublishError>;
    fn mark_finalized(&self, at: DateTime<FixedOffset>) -> Result<(), PublishError>;
}

pub struct FileMarker {
    path: PathBuf,
}

impl FileMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PublishGuard for FileMarker {
    fn already_finalized(&self) -> Result<bool, PublishError> {
        self.path
            .try_exists()
            .map_err(|e| PublishError::io(&self.path, e))
    }

    fn mark_finalized(&self, at: DateTime<FixedOffset>) -> Result<(), PublishError> {
        let contents = format!("done\n{}\n", at.to_rfc3339());
        write_durably(&self.path, contents.as_bytes())?;
        info!("Marked final announcement done at {}", self.path.display());
        Ok(())
    }
}

// Write to a sibling temp file, fsync, rename into place, fsync the directory
fn write_durably(path: &Path, contents: &[u8]) -> Result<(), PublishError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(|e| PublishError::io(&dir, e))?;

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = dir.join(tmp_name);

    let mut file = File::create(&tmp).map_err(|e| PublishError::io(&tmp, e))?;
    file.write_all(contents).map_err(|e| PublishError::io(&tmp, e))?;
    file.sync_all().map_err(|e| PublishError::io(&tmp, e))?;
    drop(file);

    fs::rename(&tmp, path).map_err(|e| PublishError::io(path, e))?;
    sync_dir(&dir).map_err(|e| PublishError::io(&dir, e))
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    OpenOptions::new().read(true).open(dir)?.sync_all()
}

// Directories cannot be opened for syncing on Windows
#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}
