use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::InventoryError;

/// Snapshot of one local archive path at probe time
#[derive(Debug, Clone)]
pub struct LocalFileRecord {
    pub path: PathBuf,
    /// Filesystem modification time, normalized to UTC
    pub modified_time: Option<DateTime<Utc>>,
    pub size_bytes: u64,
    pub exists: bool,
}

/// Probe one local path.
///
/// Always re-queries the filesystem: files are deleted and recreated
/// while a run is in flight, so records must never be cached across
/// entries.
pub fn probe(path: &Path) -> Result<LocalFileRecord, InventoryError> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(LocalFileRecord {
            path: path.to_path_buf(),
            modified_time: meta.modified().ok().map(DateTime::<Utc>::from),
            size_bytes: meta.len(),
            exists: true,
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(LocalFileRecord {
            path: path.to_path_buf(),
            modified_time: None,
            size_bytes: 0,
            exists: false,
        }),
        Err(e) => Err(InventoryError::StatFailed {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Create the `<root>/<year>/` directory if it is not already there
pub fn ensure_year_dir(root: &Path, year: i32) -> Result<PathBuf, InventoryError> {
    let dir = root.join(year.to_string());
    std::fs::create_dir_all(&dir).map_err(|e| InventoryError::CreateDirectoryFailed {
        path: dir.clone(),
        source: e,
    })?;
    Ok(dir)
}

/// Remove an out-of-date local file ahead of its redownload.
///
/// The stale file must be gone before the transfer starts, so an
/// interrupted run can never leave a half-written file that a later run
/// would mistake for a current one.
pub fn remove_stale(path: &Path) -> Result<(), InventoryError> {
    std::fs::remove_file(path).map_err(|e| InventoryError::RemoveFailed {
        path: path.to_path_buf(),
        source: e,
    })
}
