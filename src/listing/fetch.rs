// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::error::ListingError;
use crate::http::ArchiveSession;

use super::parse::{RemoteEntry, SubdirLink, parse_file_entries, parse_subdirectories};

async fn fetch_page<S: ArchiveSession + ?Sized>(
    session: &S,
    url: &str,
) -> Result<String, ListingError> {
    let response = session
        .get(url)
        .await
        .map_err(|e| ListingError::FetchFailed {
            url: url.to_string(),
            source: e,
        })?;

    if response.status >= 400 {
        return Err(ListingError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }

    Ok(String::from_utf8_lossy(&response.body).into_owned())
}

/// Fetch a year contents page and return its day-of-year subdirectory links.
///
/// An empty result is legitimate here: a freshly published year may not
/// have any day directories yet.
pub async fn list_subdirectories<S: ArchiveSession + ?Sized>(
    session: &S,
    year_url: &str,
) -> Result<Vec<SubdirLink>, ListingError> {
    let html = fetch_page(session, year_url).await?;
    Ok(parse_subdirectories(&html))
}

/// Fetch a day listing page and return its granule rows, in page order.
///
/// A day directory always carries granules, so a page that parses to zero
/// rows is reported as unparseable rather than silently empty.
pub async fn list_files<S: ArchiveSession + ?Sized>(
    session: &S,
    subdir_url: &str,
    subdir: &str,
) -> Result<Vec<RemoteEntry>, ListingError> {
    let html = fetch_page(session, subdir_url).await?;
    let entries = parse_file_entries(&html, subdir);
    if entries.is_empty() {
        return Err(ListingError::NoEntries {
            url: subdir_url.to_string(),
        });
    }
    Ok(entries)
}
