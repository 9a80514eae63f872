use std::path::Path;

use crate::error::DownloadError;
use crate::http::ArchiveSession;

/// Transfer one granule to `dest` and verify its size.
///
/// The body is retrieved in full before anything is written, so an
/// interrupted request never leaves a half-written file behind. The
/// caller has already removed any stale file at `dest`.
///
/// The advertised size is for the packed HDF5 form while the served
/// artifact is the larger unpacked nc4, so the check is a floor, not an
/// equality: strictly smaller means a truncated transfer.
///
/// No retry happens here; retry policy belongs to the caller.
pub async fn fetch_file<S: ArchiveSession + ?Sized>(
    session: &S,
    url: &str,
    dest: &Path,
    expected_size: u64,
) -> Result<u64, DownloadError> {
    let response = session
        .get(url)
        .await
        .map_err(|e| DownloadError::HttpFailed {
            url: url.to_string(),
            source: e,
        })?;

    if response.status >= 400 {
        return Err(DownloadError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }

    let written = response.body.len() as u64;
    tokio::fs::write(dest, &response.body)
        .await
        .map_err(|e| DownloadError::FileWriteFailed {
            path: dest.to_path_buf(),
            source: e,
        })?;

    if written < expected_size {
        return Err(DownloadError::SizeMismatch {
            path: dest.to_path_buf(),
            expected: expected_size,
            actual: written,
        });
    }

    Ok(written)
}
